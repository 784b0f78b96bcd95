use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tpo_loadgen::{config::Config, runner, telemetry};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tpo-loadgen")]
#[command(about = "Headless load generator for the third-party ordering gateway")]
struct Cli {
    /// Operator config file layered over config/default.toml
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Disable the status API for a console-only run
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let mut cfg = Config::load(cli.config.as_deref())?;
    if cli.headless {
        cfg.server.enabled = false;
    }

    let state = runner::AppState::new(cfg.clone());

    #[cfg(feature = "web")]
    if cfg.server.enabled {
        serve_status_api(&state, &cfg).await?;
    }
    #[cfg(not(feature = "web"))]
    if cfg.server.enabled {
        warn!("built without the web feature; status API stays off");
    }

    // ctrl-c / SIGTERM cancels the run; the runner then winds down and still
    // prints its final stats table.
    let shutdown_state = state.clone();
    tokio::spawn(async move {
        telemetry::shutdown_signal().await;
        shutdown_state.cancel.cancel();
    });

    let runner_handle = runner::spawn_runner_tasks(state.clone());
    runner_handle.await??;

    // Stop the reporter and status API after a natural finish too.
    state.cancel.cancel();
    info!("load test finished");
    Ok(())
}

#[cfg(feature = "web")]
async fn serve_status_api(state: &runner::AppState, cfg: &Config) -> Result<()> {
    use tpo_loadgen::api;

    let addr = cfg.server.socket_addr()?;
    if cfg.server.host == "0.0.0.0" {
        warn!(
            "status API binding to 0.0.0.0 - it will be reachable from the network. \
            Bind to 127.0.0.1 unless behind a firewall/reverse proxy."
        );
    }

    let app = api::router(state.clone(), cfg);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "status API listening");

    let cancel = state.cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
        {
            warn!(error = %e, "status API stopped");
        }
    });
    Ok(())
}
