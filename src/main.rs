use chrono::Utc;
use deploy_hook::dispatcher::DeploymentDispatcher;
use deploy_hook::git::GitCli;
use deploy_hook::logging::setup_logging;
use deploy_hook::runner::{DeploymentRunner, DiagnosticOptions};
use deploy_hook::{AppState, DeployConfig, api, load_config};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8888";
const DEFAULT_CONFIG_PATH: &str = "deploy_config.json";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let config_path =
        std::env::var("DEPLOY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config: DeployConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let deploy_log = setup_logging(&config.logging);
    if let Some(log) = &deploy_log {
        info!("Writing deployment log to {}", log.path().display());
    }

    // Checked once; every deploy reuses the answer
    let git = GitCli::new(&config.git_path).with_timeout(config.command_timeout());
    let execution_enabled = git.is_available().await;
    if !execution_enabled {
        warn!(
            "git could not be executed at '{}'; deployments will fail until this is fixed",
            config.git_path
        );
    }

    let runner = DeploymentRunner::new(Arc::new(git), execution_enabled).with_diagnostics(
        DiagnosticOptions {
            log_payload_data: config.logging.log_payload_data,
            log_server_request: config.logging.log_server_request,
        },
    );
    let dispatcher =
        DeploymentDispatcher::new(config.registry(), runner, config.webhook_source.clone());

    let state = Arc::new(AppState {
        dispatcher,
        start_time: Instant::now(),
        started_at: Utc::now(),
    });
    let app = api::router(state);

    info!("Listening on {}", bind_address);
    info!("Using config at {:?} ({} site(s))", config_path, config.sites.len());
    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
