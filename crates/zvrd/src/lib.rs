//! zvrd - configuration agent for VyOS virtual routers
//!
//! Receives change requests from the orchestrator over HTTP and reconciles
//! them against the device through [`zvr_vyos_config`].
//!
//! # Request flow
//!
//! ```text
//! POST /path ──▶ Dispatcher ──▶ interceptors ──▶ [DeviceLock] ──▶ handler
//!                   │                                              │
//!                   ├─ sync:  reply body = handler result ◀────────┘
//!                   └─ async: empty 200 now, result POSTed to callbackurl
//! ```
//!
//! A mutating handler runs the whole lock → read → parse → mutate → apply
//! sequence while holding the single [`DeviceLock`]. Errors and panics in a
//! handler are turned into `{"success": false, "error": ...}` replies; only
//! unknown paths (404) and async requests missing `callbackurl`/`taskuuid`
//! (400) use non-200 statuses.

pub mod callback;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod interceptor;
pub mod lock;
pub mod server;

pub use callback::{CallbackClient, CALLBACK_URL, TASK_UUID};
pub use commands::register_builtin_commands;
pub use config::AgentConfig;
pub use dispatcher::{CommandMode, Dispatcher, DispatcherBuilder};
pub use error::{AgentError, AgentResult};
pub use handler::{handler_fn, CommandContext, CommandHandler, CommandOutput, ReplyHeader};
pub use interceptor::{Interceptor, TracingInterceptor};
pub use lock::DeviceLock;
pub use server::{router, serve, shutdown_signal};
