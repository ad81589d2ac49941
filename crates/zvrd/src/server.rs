//! HTTP front end: every request goes to the dispatcher.

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::error::AgentResult;

/// Builds the router. All paths fall through to the dispatcher, which does
/// its own lookup so unknown paths get the agent's 404 body.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new().fallback(dispatch).with_state(dispatcher)
}

async fn dispatch(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    dispatcher.dispatch(request).await
}

/// Serves requests on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, dispatcher: Arc<Dispatcher>, shutdown: F) -> AgentResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(addr = %addr, "zvrd: HTTP server listening");

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("zvrd: HTTP server stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("zvrd: Received SIGINT"),
        _ = terminate => info!("zvrd: Received SIGTERM"),
    }
}
