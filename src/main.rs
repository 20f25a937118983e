//! Binary entry point: load `.env` + environment configuration, wire the
//! engine, start the loops and the control surface, and shut down cleanly
//! on ctrl-c.
//!
//! Exit codes: 0 clean shutdown, 1 fatal configuration error (the error
//! return), 2 missing required secret.

use std::sync::Arc;

use eyre::WrapErr;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use gswap_agent::config::Config;
use gswap_agent::engine::Engine;
use gswap_agent::errors::ConfigError;
use gswap_agent::server;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("reqwest=warn".parse().unwrap())
        .add_directive("tungstenite=warn".parse().unwrap());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e @ ConfigError::MissingSecret(_)) => {
            error!(target: "main", error = %e, "Startup aborted");
            std::process::exit(2);
        }
        Err(e) => {
            error!(target: "main", error = %e, "Startup aborted");
            return Err(eyre::Report::new(e).wrap_err("invalid configuration"));
        }
    };

    info!(
        target: "main",
        preferred = %config.preferred_token_name,
        dry_run = !config.enable_trading,
        port = config.port,
        "gswap-agent starting"
    );

    let engine: Arc<Engine> =
        Engine::from_config(config).wrap_err("engine construction failed")?;

    let port = engine.config().port;
    engine.start().await;
    let server_task = server::spawn(engine.clone(), port);

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(target: "main", "SIGINT received, shutting down"),
        Err(e) => error!(target: "main", error = %e, "Signal handler failed, shutting down"),
    }

    engine.stop().await;
    server_task.abort();
    info!(target: "main", "Shutdown complete");
    Ok(())
}
