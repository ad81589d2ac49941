//! Shared harness: a real agent listener plus a callback receiver.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use zvr_vyos_config::{ChangeCommand, ConfigResult, Device, ScriptRunner, StaticConfigSource};
use zvrd::config::CallbackConfig;
use zvrd::{CallbackClient, Dispatcher, DispatcherBuilder};

pub const RUNNING_CONFIG: &str = r#"interfaces {
    ethernet eth0 {
        address 172.20.0.10/16
        hw-id fa:16:3e:00:00:01
    }
}
system {
    host-name vyos
}
"#;

/// Records every change log instead of running it.
#[derive(Default)]
pub struct RecordingRunner {
    runs: Mutex<Vec<Vec<String>>>,
}

impl RecordingRunner {
    pub fn runs(&self) -> Vec<Vec<String>> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptRunner for RecordingRunner {
    async fn run(&self, changes: &[ChangeCommand]) -> ConfigResult<()> {
        self.runs
            .lock()
            .unwrap()
            .push(changes.iter().map(ToString::to_string).collect());
        Ok(())
    }
}

pub fn device(runner: Arc<RecordingRunner>) -> Device {
    Device::new(Arc::new(StaticConfigSource::new(RUNNING_CONFIG)), runner)
}

pub fn fast_callbacks() -> CallbackConfig {
    CallbackConfig {
        max_attempts: 5,
        retry_interval_ms: 20,
        timeout_secs: 2,
    }
}

/// Serves `builder` on an ephemeral port and returns its base URL.
pub async fn spawn_agent(builder: DispatcherBuilder, device: Device) -> String {
    spawn_agent_with(builder, device, fast_callbacks()).await
}

pub async fn spawn_agent_with(
    builder: DispatcherBuilder,
    device: Device,
    callbacks: CallbackConfig,
) -> String {
    let dispatcher = Arc::new(builder.build(
        device,
        CallbackClient::new(&callbacks).unwrap(),
        Duration::from_secs(5),
        1024 * 1024,
    ));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(zvrd::serve(listener, dispatcher, std::future::pending::<()>()));
    format!("http://{}", addr)
}

/// A callback received by [`spawn_receiver`].
#[derive(Debug)]
pub struct Delivery {
    pub headers: HeaderMap,
    pub body: Value,
}

/// Starts a callback endpoint at `/callback`.
///
/// The first `failures` POSTs are answered with 500.
pub async fn spawn_receiver(failures: usize) -> (SocketAddr, mpsc::UnboundedReceiver<Delivery>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let remaining = Arc::new(Mutex::new(failures));

    let app = Router::new().route(
        "/callback",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let tx = tx.clone();
            let remaining = remaining.clone();
            async move {
                {
                    let mut remaining = remaining.lock().unwrap();
                    if *remaining > 0 {
                        *remaining -= 1;
                        return StatusCode::INTERNAL_SERVER_ERROR;
                    }
                }
                let _ = tx.send(Delivery { headers, body });
                StatusCode::OK
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    (addr, rx)
}

pub fn builder() -> DispatcherBuilder {
    Dispatcher::builder()
}
