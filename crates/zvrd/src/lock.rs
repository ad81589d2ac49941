//! Process-wide serialization of device configuration changes.
//!
//! The device accepts one configuration session at a time, so a mutating
//! command holds this lock across its whole read → mutate → apply sequence,
//! not just the apply. Waiters are served in arrival order, so applies
//! happen in lock-acquisition order.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::AgentResult;
use crate::handler::{CommandContext, CommandHandler, CommandOutput};

/// The single lock guarding device configuration.
#[derive(Debug, Clone, Default)]
pub struct DeviceLock {
    inner: Arc<Mutex<()>>,
}

impl DeviceLock {
    /// Creates a new, unheld lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the lock.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().await
    }

    /// Wraps a handler so every invocation runs while holding the lock.
    pub fn guard(&self, handler: Arc<dyn CommandHandler>) -> Arc<dyn CommandHandler> {
        Arc::new(Locked {
            lock: self.clone(),
            inner: handler,
        })
    }
}

struct Locked {
    lock: DeviceLock,
    inner: Arc<dyn CommandHandler>,
}

#[async_trait]
impl CommandHandler for Locked {
    async fn handle(&self, ctx: CommandContext) -> AgentResult<CommandOutput> {
        let path = ctx.path().to_string();
        let _guard = self.lock.acquire().await;
        debug!(path = %path, "Device lock acquired");
        let result = self.inner.handle(ctx).await;
        debug!(path = %path, "Device lock released");
        result
    }
}
