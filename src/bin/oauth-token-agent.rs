use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use oauth_token_agent::manager::token_manager::TokenManager;
use oauth_token_agent::observability::metrics::Metrics;
use oauth_token_agent::scheduler::renewal::RenewalSettings;
use oauth_token_agent::server::server::{self, AppState};
use oauth_token_agent::sources::OAuth2ExchangeClient;
use oauth_token_agent::store::FileCredentialStore;
use oauth_token_agent::utils::config_loader;
use oauth_token_agent::utils::logging::{self, LogLevel};
use tokio::signal::unix::{signal, SignalKind};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "oauth-token-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    /// one-time consent code used when no token record exists yet
    #[arg(long, env = "AUTHORIZATION_CODE")]
    authorization_code: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Build store, token endpoint client, metrics
    // -------------------------------

    let store = FileCredentialStore::from_config(&service_config.store);
    let mirror = store.mirror().cloned();
    let request_timeout = Duration::from_millis(service_config.settings.renewal.request_timeout_ms);
    let exchange = OAuth2ExchangeClient::new(service_config.provider.clone(), request_timeout)?;
    let metrics = Metrics::new()?;

    // -------------------------------
    // 3. Start token manager (startup renewal + scheduler)
    // -------------------------------

    let manager = TokenManager::start(
        RenewalSettings::from_settings(&service_config.settings),
        Arc::new(store),
        Arc::new(exchange),
        metrics.clone(),
    )
    .await;

    // -------------------------------
    // 4. Bootstrap from an authorization code if needed
    // -------------------------------

    let status = manager.get_status().await;
    match (&args.authorization_code, status.has_token) {
        (Some(code), false) => {
            if let Err(err) = manager.authorize(code).await {
                manager.shutdown().await;
                bail!("authorization code exchange failed: {}", err);
            }
        }
        (Some(_), true) => warn!("token record already present, authorization code ignored"),
        (None, false) => warn!(
            "no token record yet; POST a consent code to /authorize or restart with --authorization-code"
        ),
        (None, true) => {}
    }

    // -------------------------------
    // 5. Start http server
    // -------------------------------

    let listener = match server::bind(&service_config.settings).await {
        Ok(listener) => listener,
        Err(err) => {
            manager.shutdown().await;
            return Err(err);
        }
    };

    let shutdown = CancellationToken::new();
    let http_server = listener.map(|listener| {
        let settings = service_config.settings.clone();
        let state = AppState::new(manager.clone(), metrics.clone());
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let result = server::serve(listener, &settings, state, shutdown).await;
            if let Err(err) = &result {
                error!("http server failed: {:#}", err);
            }
            result
        })
    });

    info!("Service starting...");

    // -------------------------------
    // 6. Wait for termination, shut down in order
    // -------------------------------

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    select! {
        _ = sigint.recv() => info!("Received SIGINT (Ctrl+C). Initiating graceful shutdown..."),
        _ = sigterm.recv() => info!("Received SIGTERM. Initiating graceful shutdown..."),
    }

    shutdown.cancel();
    if let Some(http_server) = http_server {
        if let Err(err) = http_server.await {
            error!("http server task failed: {}", err);
        }
    }
    manager.shutdown().await;

    if let Some(mirror) = mirror {
        if let Err(err) = mirror.cleanup().await {
            warn!("token mirror cleanup failed: {}", err);
        }
    }

    info!("Exiting application.");
    Ok(())
}
