//! Command handlers and the context they run with.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zvr_vyos_config::Device;

use crate::error::AgentResult;

/// What a handler produces: a JSON reply, or nothing for an empty body.
pub type CommandOutput = Option<Value>;

/// Standard reply fields shared by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyHeader {
    /// Whether the command succeeded.
    pub success: bool,
    /// Failure message; empty on success.
    pub error: String,
}

impl ReplyHeader {
    /// A successful reply.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: String::new(),
        }
    }

    /// A failed reply carrying `error`.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }

    /// The reply as a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "success": self.success, "error": self.error })
    }
}

/// Everything a handler gets to see about one command invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    path: String,
    headers: HeaderMap,
    body: Bytes,
    device: Device,
}

impl CommandContext {
    /// Bundles one request for a handler.
    pub fn new(path: impl Into<String>, headers: HeaderMap, body: Bytes, device: Device) -> Self {
        Self {
            path: path.into(),
            headers,
            body,
            device,
        }
    }

    /// The request path the command was registered under.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// A request header as text, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw request body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decodes the JSON command payload.
    pub fn command<T: DeserializeOwned>(&self) -> AgentResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The device this agent manages.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Mutable access to headers, for interceptors that rewrite requests.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

/// A named command's implementation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Runs the command. Errors become a `success: false` reply.
    async fn handle(&self, ctx: CommandContext) -> AgentResult<CommandOutput>;
}

/// Adapter turning an async closure into a [`CommandHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = AgentResult<CommandOutput>> + Send,
{
    async fn handle(&self, ctx: CommandContext) -> AgentResult<CommandOutput> {
        (self.0)(ctx).await
    }
}

/// Wraps an async closure as a shareable handler.
///
/// ```ignore
/// let echo = handler_fn(|_ctx| async { Ok(None) });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CommandHandler>
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AgentResult<CommandOutput>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;

    #[derive(Debug, Deserialize)]
    struct SetHostName {
        #[serde(rename = "hostName")]
        host_name: String,
    }

    fn context(body: &str) -> CommandContext {
        let mut headers = HeaderMap::new();
        headers.insert("taskuuid", "abc".parse().unwrap());
        CommandContext::new(
            "/sethostname",
            headers,
            Bytes::from(body.to_string()),
            test_support::static_device(""),
        )
    }

    #[test]
    fn test_command_decodes_body() {
        let ctx = context(r#"{"hostName":"router1"}"#);
        let cmd: SetHostName = ctx.command().unwrap();
        assert_eq!(cmd.host_name, "router1");
        assert_eq!(ctx.header("taskuuid"), Some("abc"));
        assert_eq!(ctx.header("callbackurl"), None);
        assert_eq!(ctx.path(), "/sethostname");
    }

    #[test]
    fn test_command_rejects_bad_json() {
        let ctx = context("not json");
        let result: AgentResult<SetHostName> = ctx.command();
        assert!(matches!(result, Err(AgentError::InvalidCommand(_))));
    }

    #[test]
    fn test_reply_header_values() {
        assert_eq!(
            ReplyHeader::failure("boom").to_value(),
            serde_json::json!({"success": false, "error": "boom"})
        );
        assert!(ReplyHeader::ok().success);
    }

    #[tokio::test]
    async fn test_handler_fn() {
        let handler = handler_fn(|ctx: CommandContext| async move {
            Ok(Some(serde_json::json!({ "path": ctx.path() })))
        });
        let output = handler.handle(context("{}")).await.unwrap();
        assert_eq!(output, Some(serde_json::json!({"path": "/sethostname"})));
    }
}
