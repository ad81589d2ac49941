//! Parser for the VyOS brace configuration grammar.
//!
//! The grammar is line oriented. Each line is split on whitespace and
//! classified by its token count and last token:
//!
//! | Shape                         | Meaning                                   |
//! |-------------------------------|-------------------------------------------|
//! | `name {`                      | open a block                              |
//! | `a b c {`                     | open a nested path, one level per token   |
//! | `key value [more...]`         | key/value; the value is the rest, joined  |
//! | `}`                           | close the innermost block                 |
//! | (empty)                       | ignored                                   |
//!
//! Anything else aborts the parse; no partial tree is returned.

use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};
use crate::tree::{ConfigTree, NodeId};

const OPEN: &str = "{";
const CLOSE: &str = "}";

#[derive(Debug, PartialEq, Eq)]
enum Statement<'a> {
    OpenBlock(&'a str),
    OpenPath(&'a [&'a str]),
    KeyValue { key: &'a str, value: String },
    Close,
    Blank,
}

fn classify<'a>(tokens: &'a [&'a str]) -> Option<Statement<'a>> {
    match tokens {
        [] => Some(Statement::Blank),
        [only] if *only == CLOSE => Some(Statement::Close),
        [name, last] if *last == OPEN => Some(Statement::OpenBlock(*name)),
        [path @ .., last] if *last == OPEN && path.len() > 1 => Some(Statement::OpenPath(path)),
        [key, rest @ ..] if matches!(rest.last(), Some(last) if *last != OPEN && *last != CLOSE) => {
            Some(Statement::KeyValue {
                key: *key,
                value: rest.join(" "),
            })
        }
        _ => None,
    }
}

/// Parses configuration text, as printed by `cli-shell-api showCfg`, into a
/// fresh tree with an empty change log.
pub fn parse(text: &str) -> ConfigResult<ConfigTree> {
    let mut tree = ConfigTree::new();
    let mut ancestors: Vec<NodeId> = Vec::new();
    let mut current = tree.root_id();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let statement = classify(&tokens).ok_or_else(|| ConfigError::Parse {
            line: line_number,
            tokens: tokens.iter().map(ToString::to_string).collect(),
        })?;

        match statement {
            Statement::OpenBlock(name) => {
                ancestors.push(current);
                current = tree.add_child(current, name);
            }
            Statement::OpenPath(path) => {
                ancestors.push(current);
                for name in path {
                    current = tree.add_child(current, name);
                }
            }
            Statement::KeyValue { key, value } => {
                let key_node = tree.add_child(current, key);
                tree.add_child(key_node, &value);
            }
            Statement::Close => {
                current = ancestors
                    .pop()
                    .ok_or(ConfigError::UnbalancedClose { line: line_number })?;
            }
            Statement::Blank => {}
        }
    }

    if !ancestors.is_empty() {
        return Err(ConfigError::UnclosedBlock {
            depth: ancestors.len(),
        });
    }

    tracing::debug!(lines = text.lines().count(), "Parsed configuration text");
    Ok(tree)
}

impl FromStr for ConfigTree {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_shapes() {
        assert_eq!(classify(&[]), Some(Statement::Blank));
        assert_eq!(classify(&["}"]), Some(Statement::Close));
        assert_eq!(classify(&["nat", "{"]), Some(Statement::OpenBlock("nat")));
        assert_eq!(
            classify(&["rule", "1", "{"]),
            Some(Statement::OpenPath(&["rule", "1"]))
        );
        assert_eq!(
            classify(&["description", "\"uplink", "port\""]),
            Some(Statement::KeyValue {
                key: "description",
                value: "\"uplink port\"".to_string()
            })
        );
        assert_eq!(classify(&["disable"]), None);
        assert_eq!(classify(&["{"]), None);
        assert_eq!(classify(&["a", "b", "}"]), None);
    }

    #[test]
    fn test_parse_nested_rule() {
        let text = r#"
nat {
    source {
        rule 1 {
            source address 10.0.0.0/24
        }
    }
}
"#;
        let tree = parse(text).unwrap();

        let address = tree.get("nat source rule 1 source address").unwrap();
        assert_eq!(address.value().unwrap(), "10.0.0.0/24");
        assert!(!tree.has_changes());
    }

    #[test]
    fn test_parse_siblings_and_blank_lines() {
        let text = r#"
interfaces {
    ethernet eth0 {
        address 172.20.0.10/16
        hw-id 00:0c:29:aa:bb:cc
    }

    ethernet eth1 {
        address 10.0.0.1/24
        description "private network"
    }
    loopback lo {
    }
}
system {
    host-name vyos
}
"#;
        let tree = parse(text).unwrap();

        assert_eq!(
            tree.get("interfaces ethernet").unwrap().child_names(),
            vec!["eth0", "eth1"]
        );
        assert_eq!(
            tree.get("interfaces ethernet eth1 description")
                .unwrap()
                .value()
                .unwrap(),
            "\"private network\""
        );
        assert!(tree.has("interfaces loopback lo"));
        assert_eq!(
            tree.get("system host-name").unwrap().value().unwrap(),
            "vyos"
        );
    }

    #[test]
    fn test_parse_reuses_existing_path() {
        let text = "firewall {\n name a {\n  default-action drop\n }\n}\n\
                    firewall {\n name b {\n  default-action accept\n }\n}\n";
        let tree = parse(text).unwrap();
        assert_eq!(tree.root().child_names(), vec!["firewall"]);
        assert_eq!(
            tree.get("firewall name").unwrap().child_names(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_parse_rejects_unknown_shape() {
        let err = parse("service {\n    ssh\n}\n").unwrap_err();
        match err {
            ConfigError::Parse { line, tokens } => {
                assert_eq!(line, 2);
                assert_eq!(tokens, vec!["ssh".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unbalanced() {
        assert!(matches!(
            parse("}\n"),
            Err(ConfigError::UnbalancedClose { line: 1 })
        ));
        assert!(matches!(
            parse("a {\n b {\n"),
            Err(ConfigError::UnclosedBlock { depth: 2 })
        ));
    }

    #[test]
    fn test_from_str() {
        let tree: ConfigTree = "system {\n host-name r1\n}\n".parse().unwrap();
        assert!(tree.has("system host-name r1"));
    }
}
