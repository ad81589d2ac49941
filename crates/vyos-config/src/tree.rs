//! In-memory VyOS configuration tree with change tracking.
//!
//! Nodes live in an arena owned by [`ConfigTree`] and refer to each other by
//! [`NodeId`]. Each node keeps its children twice: an ordered list (insertion
//! order, used for enumeration) and a name index (used for lookups). The
//! parent link is a plain id, used to rebuild a node's path and to unlink it
//! on delete.
//!
//! A `key value` statement is stored as two levels: a *key node* with exactly
//! one child, and that child is a leaf whose name is the value.
//!
//! ```text
//! root
//! └── nat
//!     └── source
//!         └── rule
//!             └── 1
//!                 └── source
//!                     └── address          <- key node
//!                         └── 10.0.0.0/24  <- value (leaf)
//! ```
//!
//! Every mutation that changes observable state is recorded as a
//! [`ChangeCommand`] in an append-only change log, which is later rendered
//! into a device session script by [`crate::script`].

use std::collections::HashMap;
use std::fmt;

use crate::error::{ConfigError, ConfigResult};

/// Handle to a node inside a [`ConfigTree`].
///
/// Ids of deleted nodes are never reused; looking one up yields `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

#[derive(Debug)]
struct ConfigNode {
    name: String,
    children: Vec<NodeId>,
    index: HashMap<String, NodeId>,
    parent: Option<NodeId>,
}

impl ConfigNode {
    fn new(name: String, parent: Option<NodeId>) -> Self {
        Self {
            name,
            children: Vec::new(),
            index: HashMap::new(),
            parent,
        }
    }
}

/// A primitive command against the live device configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeCommand {
    /// Create or overwrite the statement at the path.
    Set(String),
    /// Remove the subtree at the path.
    Delete(String),
}

impl ChangeCommand {
    /// The configuration path this command operates on.
    pub fn path(&self) -> &str {
        match self {
            ChangeCommand::Set(path) | ChangeCommand::Delete(path) => path,
        }
    }

    /// The session script alias that executes this command.
    pub fn alias(&self) -> &'static str {
        match self {
            ChangeCommand::Set(_) => "$SET",
            ChangeCommand::Delete(_) => "$DELETE",
        }
    }
}

impl fmt::Display for ChangeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.alias(), self.path())
    }
}

/// Outcome of [`ConfigTree::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The key already held this value; nothing was recorded.
    Unchanged,
    /// The tree was modified and the change log extended.
    Changed,
}

impl SetOutcome {
    /// Returns true if the tree was modified.
    pub fn is_changed(&self) -> bool {
        matches!(self, SetOutcome::Changed)
    }
}

/// Outcome of [`ConfigTree::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The path did not resolve; nothing was recorded.
    Absent,
    /// The subtree was removed and a DELETE recorded.
    Deleted,
}

impl DeleteOutcome {
    /// Returns true if a subtree was removed.
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted)
    }
}

/// Configuration tree built from one snapshot of the device configuration.
///
/// Nodes live in an arena indexed by [`NodeId`]. Freed slots are left empty
/// and never handed out again, so a stale id can only miss, never alias a
/// newer node. The arena grows for the life of the tree, which is one
/// request.
#[derive(Debug)]
pub struct ConfigTree {
    nodes: Vec<Option<ConfigNode>>,
    changes: Vec<ChangeCommand>,
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split_whitespace().collect()
}

impl ConfigTree {
    /// Creates an empty tree holding only the unnamed root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(ConfigNode::new(String::new(), None))],
            changes: Vec::new(),
        }
    }

    fn node(&self, id: NodeId) -> Option<&ConfigNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut ConfigNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)?.index.get(name).copied()
    }

    /// Returns the existing child with this name, or appends a new one.
    pub(crate) fn add_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        if let Some(existing) = self.child(parent, name) {
            return existing;
        }

        let id = NodeId(self.nodes.len());
        self.nodes
            .push(Some(ConfigNode::new(name.to_string(), Some(parent))));
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
            p.index.insert(name.to_string(), id);
        }
        id
    }

    /// Detaches a node from its parent and frees the whole subtree.
    fn unlink(&mut self, id: NodeId) {
        let (parent, name) = match self.node(id) {
            Some(n) => (n.parent, n.name.clone()),
            None => return,
        };

        if let Some(p) = parent.and_then(|p| self.node_mut(p)) {
            p.index.remove(&name);
            p.children.retain(|c| *c != id);
        }

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(freed) = self.nodes.get_mut(next.0).and_then(Option::take) {
                pending.extend(freed.children);
            }
        }
    }

    fn resolve(&self, from: NodeId, segments: &[&str]) -> Option<NodeId> {
        segments
            .iter()
            .try_fold(from, |current, segment| self.child(current, segment))
    }

    pub(crate) fn root_id(&self) -> NodeId {
        ROOT
    }

    /// The synthetic root node.
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id: ROOT,
        }
    }

    /// Looks up a node by id; `None` if it has been deleted.
    pub fn node_ref(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.node(id).map(|_| NodeRef { tree: self, id })
    }

    /// Returns true if every segment of the space-separated path resolves.
    pub fn has(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Walks the space-separated path from the root.
    pub fn get(&self, path: &str) -> Option<NodeRef<'_>> {
        let segments = split_path(path);
        if segments.is_empty() {
            return None;
        }
        self.resolve(ROOT, &segments)
            .map(|id| NodeRef { tree: self, id })
    }

    /// Sets `key... value`, where the last token of `config` is the value.
    ///
    /// Writing the value a key already holds records nothing. Overwriting a
    /// different value records a DELETE of the key followed by a SET. A key
    /// that does not exist yet is created along with any missing parents and
    /// recorded as a single SET.
    pub fn set(&mut self, config: &str) -> ConfigResult<SetOutcome> {
        let segments = split_path(config);
        if segments.len() < 2 {
            return Err(ConfigError::invalid_path(
                config,
                "set requires a key path and a value",
            ));
        }

        let full = segments.join(" ");
        let (key_segments, value) = segments.split_at(segments.len() - 1);
        let value = value[0];
        let key = key_segments.join(" ");

        let Some(key_id) = self.resolve(ROOT, key_segments) else {
            let mut current = ROOT;
            for segment in &segments {
                current = self.add_child(current, segment);
            }
            tracing::debug!(config = %full, "New configuration entry");
            self.changes.push(ChangeCommand::Set(full));
            return Ok(SetOutcome::Changed);
        };

        let current = NodeRef {
            tree: self,
            id: key_id,
        };
        let old = current.value()?;
        if old == value {
            return Ok(SetOutcome::Unchanged);
        }

        if let Some(old_id) = self.child(key_id, old) {
            self.unlink(old_id);
        }
        self.add_child(key_id, value);

        tracing::debug!(key = %key, value = %value, "Configuration value replaced");
        self.changes.push(ChangeCommand::Delete(key));
        self.changes.push(ChangeCommand::Set(full));
        Ok(SetOutcome::Changed)
    }

    /// Removes the subtree at the path.
    pub fn delete(&mut self, path: &str) -> DeleteOutcome {
        let Some(id) = self.get(path).map(|n| n.id()) else {
            return DeleteOutcome::Absent;
        };
        self.unlink(id);
        self.changes
            .push(ChangeCommand::Delete(split_path(path).join(" ")));
        DeleteOutcome::Deleted
    }

    /// Removes a node previously found through navigation.
    ///
    /// The recorded DELETE carries the node's full path.
    pub fn delete_node(&mut self, id: NodeId) -> ConfigResult<DeleteOutcome> {
        if id == ROOT {
            return Err(ConfigError::invalid_path("", "the root cannot be deleted"));
        }
        let Some(path) = self.node_ref(id).map(|n| n.path()) else {
            return Ok(DeleteOutcome::Absent);
        };
        self.unlink(id);
        self.changes.push(ChangeCommand::Delete(path));
        Ok(DeleteOutcome::Deleted)
    }

    /// The change log, in the order mutations happened.
    pub fn changes(&self) -> &[ChangeCommand] {
        &self.changes
    }

    /// Returns true if any mutation has been recorded.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Consumes the tree, keeping only its change log.
    pub fn into_changes(self) -> Vec<ChangeCommand> {
        self.changes
    }

    /// The change log rendered one script line per entry.
    pub fn commands_as_string(&self) -> String {
        self.changes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Flattens the tree into one root-to-leaf path per line.
    ///
    /// Diagnostic output only: the result is not in the brace grammar and
    /// cannot be fed back to [`crate::parse`].
    pub fn serialize(&self) -> String {
        let mut lines = Vec::new();
        let mut path: Vec<&str> = Vec::new();
        for child in self.root().children() {
            self.collect_leaf_paths(child, &mut path, &mut lines);
        }
        lines.join("\n")
    }

    fn collect_leaf_paths<'a>(
        &'a self,
        node: NodeRef<'a>,
        path: &mut Vec<&'a str>,
        lines: &mut Vec<String>,
    ) {
        path.push(node.name());
        if node.is_leaf() {
            lines.push(path.join(" "));
        } else {
            for child in node.children() {
                self.collect_leaf_paths(child, path, lines);
            }
        }
        path.pop();
    }
}

impl fmt::Display for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Borrowed view of one node in a [`ConfigTree`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a ConfigTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn inner(&self) -> &'a ConfigNode {
        // A NodeRef is only handed out for live ids and borrows the tree
        // immutably, so the slot cannot be freed underneath it.
        match self.tree.node(self.id) {
            Some(node) => node,
            None => unreachable!("NodeRef to a freed node"),
        }
    }

    /// The node's id, usable with [`ConfigTree::delete_node`].
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's own token; empty for the root.
    pub fn name(&self) -> &'a str {
        &self.inner().name
    }

    /// The parent node, `None` for the root.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.inner()
            .parent
            .map(|id| NodeRef { tree: self.tree, id })
    }

    /// Space-joined names from the root down to this node.
    pub fn path(&self) -> String {
        let mut names = Vec::new();
        let mut current = Some(*self);
        while let Some(node) = current {
            if node.id != ROOT {
                names.push(node.name());
            }
            current = node.parent();
        }
        names.reverse();
        names.join(" ")
    }

    /// Children in insertion order.
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.inner()
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    /// Child names in insertion order.
    pub fn child_names(&self) -> Vec<&'a str> {
        self.children().map(|c| c.name()).collect()
    }

    /// Walks a space-separated path relative to this node.
    pub fn get(&self, path: &str) -> Option<NodeRef<'a>> {
        let segments = split_path(path);
        if segments.is_empty() {
            return None;
        }
        self.tree
            .resolve(self.id, &segments)
            .map(|id| NodeRef { tree: self.tree, id })
    }

    /// True for a node without children.
    pub fn is_leaf(&self) -> bool {
        self.inner().children.is_empty()
    }

    /// True for a node with exactly one child which is itself a leaf.
    pub fn is_key_node(&self) -> bool {
        let mut children = self.children();
        match (children.next(), children.next()) {
            (Some(only), None) => only.is_leaf(),
            _ => false,
        }
    }

    /// The value of a key node.
    pub fn value(&self) -> ConfigResult<&'a str> {
        if !self.is_key_node() {
            return Err(ConfigError::not_key_node(self.path()));
        }
        Ok(self.children().next().map(|c| c.name()).unwrap_or_default())
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("path", &self.path())
            .finish()
    }
}
