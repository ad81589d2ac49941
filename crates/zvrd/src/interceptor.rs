//! Cross-cutting wrappers applied around every command handler.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::AgentResult;
use crate::handler::{CommandContext, CommandHandler, CommandOutput};

/// Wraps a handler with extra behaviour.
///
/// Interceptors run in registration order: the first one registered is the
/// outermost and sees the request first.
pub trait Interceptor: Send + Sync {
    /// Returns a handler that runs `next` for the command at `path`.
    fn wrap(&self, path: &str, next: Arc<dyn CommandHandler>) -> Arc<dyn CommandHandler>;
}

/// Logs every command with its outcome and duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInterceptor;

impl Interceptor for TracingInterceptor {
    fn wrap(&self, path: &str, next: Arc<dyn CommandHandler>) -> Arc<dyn CommandHandler> {
        Arc::new(Traced {
            path: path.to_string(),
            next,
        })
    }
}

struct Traced {
    path: String,
    next: Arc<dyn CommandHandler>,
}

#[async_trait]
impl CommandHandler for Traced {
    async fn handle(&self, ctx: CommandContext) -> AgentResult<CommandOutput> {
        debug!(path = %self.path, body_len = ctx.body().len(), "Command received");
        let started = Instant::now();
        let result = self.next.handle(ctx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => info!(path = %self.path, elapsed_ms, "Command completed"),
            Err(e) => warn!(path = %self.path, elapsed_ms, error = %e, "Command failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, test_support::static_device};
    use axum::body::Bytes;
    use axum::http::HeaderMap;

    #[tokio::test]
    async fn test_tracing_interceptor_passes_result_through() {
        let inner = handler_fn(|_ctx: CommandContext| async {
            Ok(Some(serde_json::json!({"success": true})))
        });
        let wrapped = TracingInterceptor.wrap("/echo", inner);

        let ctx = CommandContext::new("/echo", HeaderMap::new(), Bytes::new(), static_device(""));
        let output = wrapped.handle(ctx).await.unwrap();
        assert_eq!(output, Some(serde_json::json!({"success": true})));
    }

    struct DefaultTaskUuid;

    struct WithTaskUuid {
        next: Arc<dyn CommandHandler>,
    }

    impl Interceptor for DefaultTaskUuid {
        fn wrap(&self, _path: &str, next: Arc<dyn CommandHandler>) -> Arc<dyn CommandHandler> {
            Arc::new(WithTaskUuid { next })
        }
    }

    #[async_trait]
    impl CommandHandler for WithTaskUuid {
        async fn handle(&self, mut ctx: CommandContext) -> AgentResult<CommandOutput> {
            if ctx.header("taskuuid").is_none() {
                ctx.headers_mut()
                    .insert("taskuuid", axum::http::HeaderValue::from_static("generated"));
            }
            self.next.handle(ctx).await
        }
    }

    #[tokio::test]
    async fn test_interceptor_rewrites_request_headers() {
        let inner = handler_fn(|ctx: CommandContext| async move {
            Ok(Some(serde_json::json!({ "taskuuid": ctx.header("taskuuid") })))
        });
        let wrapped = DefaultTaskUuid.wrap("/sync", inner);

        let ctx = CommandContext::new("/sync", HeaderMap::new(), Bytes::new(), static_device(""));
        let output = wrapped.handle(ctx).await.unwrap();
        assert_eq!(output, Some(serde_json::json!({"taskuuid": "generated"})));

        let mut headers = HeaderMap::new();
        headers.insert("taskuuid", "from-caller".parse().unwrap());
        let ctx = CommandContext::new("/sync", headers, Bytes::new(), static_device(""));
        let output = wrapped.handle(ctx).await.unwrap();
        assert_eq!(output, Some(serde_json::json!({"taskuuid": "from-caller"})));
    }
}
