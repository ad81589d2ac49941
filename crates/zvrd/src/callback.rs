//! Out-of-band result delivery for async commands.
//!
//! The requesting caller has already received its `200`, so delivery failures
//! are only logged. Each POST is retried at a fixed interval up to a bounded
//! number of attempts.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use crate::config::CallbackConfig;
use crate::error::{AgentError, AgentResult};
use crate::handler::CommandOutput;

/// Header carrying the callback URL on async requests.
pub const CALLBACK_URL: &str = "callbackurl";

/// Header (and reply field) carrying the task identifier.
pub const TASK_UUID: &str = "taskuuid";

/// Merges the task identifier into a handler result.
///
/// Object results gain a `taskuuid` field; a missing result becomes
/// `{"taskuuid": ...}`; any other JSON value is nested under `result`.
pub fn with_task_uuid(task_uuid: &str, output: CommandOutput) -> Value {
    match output {
        Some(Value::Object(mut map)) => {
            map.insert(TASK_UUID.to_string(), Value::String(task_uuid.to_string()));
            Value::Object(map)
        }
        None => {
            let mut map = Map::new();
            map.insert(TASK_UUID.to_string(), Value::String(task_uuid.to_string()));
            Value::Object(map)
        }
        Some(other) => json!({ TASK_UUID: task_uuid, "result": other }),
    }
}

/// Posts async command results back to the orchestrator.
#[derive(Debug, Clone)]
pub struct CallbackClient {
    client: Client,
    max_attempts: u32,
    retry_interval: Duration,
}

impl CallbackClient {
    /// Builds a client from the callback settings.
    pub fn new(config: &CallbackConfig) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_attempts: config.max_attempts,
            retry_interval: Duration::from_millis(config.retry_interval_ms),
        })
    }

    /// Delivers a result, retrying until it is accepted or attempts run out.
    pub async fn deliver(
        &self,
        url: &str,
        task_uuid: &str,
        output: CommandOutput,
    ) -> AgentResult<()> {
        let body = with_task_uuid(task_uuid, output);
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match self.post(url, task_uuid, &body).await {
                Ok(()) => {
                    debug!(url = %url, task_uuid = %task_uuid, attempt, "Callback delivered");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        url = %url,
                        task_uuid = %task_uuid,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Callback attempt failed"
                    );
                    last_error = e;
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_interval).await;
            }
        }

        error!(
            url = %url,
            task_uuid = %task_uuid,
            attempts = self.max_attempts,
            "Giving up on callback delivery"
        );
        Err(AgentError::Callback {
            url: url.to_string(),
            message: format!("gave up after {} attempts: {}", self.max_attempts, last_error),
        })
    }

    async fn post(&self, url: &str, task_uuid: &str, body: &Value) -> Result<(), String> {
        let response = self
            .client
            .post(url)
            .header(TASK_UUID, task_uuid)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(format!("status {}: {}", status, text))
        }
    }
}
