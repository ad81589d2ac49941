//! zvrd - VyOS configuration agent daemon
//!
//! Serves orchestrator commands over HTTP and applies them to the local
//! VyOS configuration.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use zvr_vyos_config::Device;
use zvrd::{
    register_builtin_commands, serve, shutdown_signal, AgentConfig, CallbackClient, Dispatcher,
    TracingInterceptor,
};

/// VyOS virtual router configuration agent
#[derive(Parser, Debug)]
#[command(name = "zvrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// The IP address the server listens on
    #[arg(long)]
    ip: Option<String>,

    /// The port the server listens on
    #[arg(long)]
    port: Option<u16>,

    /// Seconds allowed for a request body to arrive
    #[arg(long = "readtimeout")]
    read_timeout: Option<u64>,

    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => AgentConfig::default(),
        };

        if let Some(ip) = &self.ip {
            config.server.ip = ip.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(secs) = self.read_timeout {
            config.server.read_timeout_secs = secs;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("zvrd: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging.level);
    info!("--- Starting zvrd ---");

    match run(config).await {
        Ok(()) => {
            info!("zvrd: exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "zvrd: exiting with error");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();
}

async fn run(config: AgentConfig) -> anyhow::Result<()> {
    let device = Device::vyos(config.script_config());
    let callbacks = CallbackClient::new(&config.callback)?;

    let mut builder = Dispatcher::builder();
    builder.interceptor(Arc::new(TracingInterceptor));
    register_builtin_commands(&mut builder).context("registering built-in commands")?;

    let dispatcher = Arc::new(builder.build(
        device,
        callbacks,
        config.read_timeout(),
        config.server.max_body_bytes,
    ));

    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    serve(listener, dispatcher, shutdown_signal()).await?;
    Ok(())
}
