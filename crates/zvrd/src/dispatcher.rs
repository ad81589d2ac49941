//! Path-based command dispatch.
//!
//! Every registered command is either synchronous (the reply is the HTTP
//! response) or asynchronous (an empty `200` first, the reply later via the
//! callback URL). Each invocation runs inside one failure boundary: errors
//! and panics from the handler chain become a `success: false` reply and
//! never take the process down.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::FutureExt;
use tracing::{debug, error, warn};
use zvr_vyos_config::Device;

use crate::callback::{CallbackClient, CALLBACK_URL, TASK_UUID};
use crate::error::{AgentError, AgentResult};
use crate::handler::{CommandContext, CommandHandler, CommandOutput, ReplyHeader};
use crate::interceptor::Interceptor;
use crate::lock::DeviceLock;

/// How a command's result reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    /// The reply is the HTTP response body.
    Sync,
    /// The HTTP response is empty; the reply is POSTed to `callbackurl`.
    Async,
}

struct Route {
    mode: CommandMode,
    handler: Arc<dyn CommandHandler>,
}

/// Collects command registrations and interceptors before serving.
pub struct DispatcherBuilder {
    routes: HashMap<String, Route>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    lock: DeviceLock,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            interceptors: Vec::new(),
            lock: DeviceLock::new(),
        }
    }

    /// Adds an interceptor around every command.
    ///
    /// The first interceptor added is the outermost one.
    pub fn interceptor(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.interceptors.push(interceptor);
        self
    }

    /// The lock mutating commands must hold across read, mutate and apply.
    pub fn device_lock(&self) -> DeviceLock {
        self.lock.clone()
    }

    /// Registers a synchronous command.
    pub fn register_sync(
        &mut self,
        path: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> AgentResult<&mut Self> {
        self.register(path, CommandMode::Sync, handler)
    }

    /// Registers an asynchronous command.
    pub fn register_async(
        &mut self,
        path: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> AgentResult<&mut Self> {
        self.register(path, CommandMode::Async, handler)
    }

    fn register(
        &mut self,
        path: &str,
        mode: CommandMode,
        handler: Arc<dyn CommandHandler>,
    ) -> AgentResult<&mut Self> {
        if path.is_empty() {
            return Err(AgentError::EmptyPath);
        }
        if self.routes.contains_key(path) {
            return Err(AgentError::DuplicatePath(path.to_string()));
        }

        debug!(path = %path, mode = ?mode, "Command path registered");
        self.routes.insert(path.to_string(), Route { mode, handler });
        Ok(self)
    }

    /// Freezes the registrations into a dispatcher.
    pub fn build(
        self,
        device: Device,
        callbacks: CallbackClient,
        read_timeout: Duration,
        max_body_bytes: usize,
    ) -> Dispatcher {
        let interceptors = self.interceptors;
        let routes = self
            .routes
            .into_iter()
            .map(|(path, route)| {
                let handler = interceptors
                    .iter()
                    .rev()
                    .fold(route.handler, |next, ic| ic.wrap(&path, next));
                (
                    path,
                    Route {
                        mode: route.mode,
                        handler,
                    },
                )
            })
            .collect();

        Dispatcher {
            routes,
            device,
            callbacks,
            read_timeout,
            max_body_bytes,
        }
    }
}

/// Routes requests to registered commands.
pub struct Dispatcher {
    routes: HashMap<String, Route>,
    device: Device,
    callbacks: CallbackClient,
    read_timeout: Duration,
    max_body_bytes: usize,
}

impl Dispatcher {
    /// Starts registering commands.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// The mode a path is registered with, if any.
    pub fn mode(&self, path: &str) -> Option<CommandMode> {
        self.routes.get(path).map(|route| route.mode)
    }

    /// Handles one HTTP request.
    pub async fn dispatch(&self, request: Request) -> Response {
        let path = request.uri().path().to_string();

        let Some(route) = self.routes.get(&path) else {
            warn!(path = %path, "No plugin registered the path, dropping it");
            return (
                StatusCode::NOT_FOUND,
                format!("no plugin registered the path[{}]", path),
            )
                .into_response();
        };

        let (parts, body) = request.into_parts();

        let correlation = match route.mode {
            CommandMode::Sync => None,
            CommandMode::Async => {
                let callback_url = match required_header(&parts.headers, CALLBACK_URL, &path) {
                    Ok(value) => value,
                    Err(response) => return response,
                };
                let task_uuid = match required_header(&parts.headers, TASK_UUID, &path) {
                    Ok(value) => value,
                    Err(response) => return response,
                };
                Some((callback_url, task_uuid))
            }
        };

        let body = match self.read_body(body).await {
            Ok(body) => body,
            Err(response) => return response,
        };

        let ctx = CommandContext::new(path.clone(), parts.headers, body, self.device.clone());
        let handler = route.handler.clone();

        match correlation {
            None => {
                // Detached from the connection: a client that hangs up only
                // loses the reply, the command still runs to completion.
                let task_path = path.clone();
                let task = tokio::spawn(async move { run_guarded(&task_path, handler, ctx).await });
                match task.await {
                    Ok(Some(value)) => (StatusCode::OK, Json(value)).into_response(),
                    Ok(None) => StatusCode::OK.into_response(),
                    Err(e) => {
                        error!(path = %path, error = %e, "Command task aborted");
                        let reply = ReplyHeader::failure(format!("command aborted: {}", e));
                        (StatusCode::OK, Json(reply.to_value())).into_response()
                    }
                }
            }
            Some((callback_url, task_uuid)) => {
                let callbacks = self.callbacks.clone();
                tokio::spawn(async move {
                    let output = run_guarded(&path, handler, ctx).await;
                    if let Err(e) = callbacks.deliver(&callback_url, &task_uuid, output).await {
                        error!(path = %path, task_uuid = %task_uuid, error = %e, "Async command result lost");
                    }
                });
                StatusCode::OK.into_response()
            }
        }
    }

    async fn read_body(&self, body: Body) -> Result<axum::body::Bytes, Response> {
        match tokio::time::timeout(self.read_timeout, to_bytes(body, self.max_body_bytes)).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read request body");
                Err((StatusCode::BAD_REQUEST, format!("failed to read body: {}", e)).into_response())
            }
            Err(_) => {
                warn!(timeout_ms = self.read_timeout.as_millis() as u64, "Request body read timed out");
                Err((StatusCode::REQUEST_TIMEOUT, "request body read timed out").into_response())
            }
        }
    }
}

fn required_header(
    headers: &axum::http::HeaderMap,
    header: &'static str,
    path: &str,
) -> Result<String, Response> {
    match headers.get(header).and_then(|v| v.to_str().ok()) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => {
            let err = AgentError::MissingHeader {
                header,
                path: path.to_string(),
            };
            warn!("{}", err);
            Err((StatusCode::BAD_REQUEST, err.to_string()).into_response())
        }
    }
}

/// Runs a handler chain inside the failure boundary.
async fn run_guarded(
    path: &str,
    handler: Arc<dyn CommandHandler>,
    ctx: CommandContext,
) -> CommandOutput {
    let result = match AssertUnwindSafe(handler.handle(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(AgentError::Panicked(panic_message(payload.as_ref()))),
    };

    match result {
        Ok(output) => output,
        Err(e) => {
            warn!(path = %path, error = %e, "Command of the path fails");
            Some(ReplyHeader::failure(e.to_string()).to_value())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
