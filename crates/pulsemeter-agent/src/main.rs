//! pulsemeter agent binary.
//!
//! - Config: `$PULSEMETER_CONFIG` or `pulsemeter.yaml`, defaults when absent
//! - Samplers start before the listener binds
//! - Ctrl-C drains the server and cancels running scenarios

use std::net::SocketAddr;
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use pulsemeter_agent::{app_state, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = match config::load_from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "config load failed");
            return ExitCode::FAILURE;
        }
    };
    let listen: SocketAddr = match cfg.scrape.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(listen = %cfg.scrape.listen, error = %e, "scrape.listen must be a valid SocketAddr");
            return ExitCode::FAILURE;
        }
    };

    let (state, background) = match app_state::AgentState::new(cfg, None) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "agent startup failed");
            return ExitCode::FAILURE;
        }
    };
    let tasks = background.spawn();
    let simulator = state.simulator();
    let app = router::build_router(state);

    let listener = match tokio::net::TcpListener::bind(listen).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%listen, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%listen, "pulsemeter-agent starting");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "ctrl_c listener failed; shutting down");
            }
            tracing::info!("shutdown requested");
        })
        .await;

    simulator.stop_all();
    for task in tasks {
        task.abort();
    }

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}
