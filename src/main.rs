use rust_lms_api::auth::OperatorCredentials;
use rust_lms_api::config::Config;
use rust_lms_api::handlers::{self, AppState};
use rust_lms_api::kyc_client::SoapKycClient;
use rust_lms_api::lending::LoanService;
use rust_lms_api::scoring_client::{HttpScoringClient, RetryPolicy};
use rust_lms_api::services::{build_http_client, ServiceCredentials};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes logging, loads configuration, wires the KYC and scoring
/// clients into the loan service, and serves the API until Ctrl-C / SIGTERM.
/// In-flight loan workflows get a bounded grace period to finish.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_lms_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let http = build_http_client(config.http_timeout())?;
    let credentials = ServiceCredentials {
        username: config.service_user.clone(),
        password: config.service_pass.clone(),
    };

    let kyc = SoapKycClient::new(
        http.clone(),
        config.kyc_base_url.clone(),
        credentials.clone(),
    );
    tracing::info!("✓ KYC client initialized: {}", config.kyc_base_url);

    let scoring = HttpScoringClient::new(
        http,
        config.scoring_base_url.clone(),
        credentials,
        RetryPolicy {
            max_retries: config.scoring_max_retries,
            retry_delay: config.scoring_retry_delay(),
        },
    );
    tracing::info!("✓ Scoring client initialized: {}", config.scoring_base_url);

    let loans = LoanService::new(
        Arc::new(kyc),
        Arc::new(scoring),
        config.max_concurrent_workflows,
    );

    let app_state = Arc::new(AppState {
        loans: loans.clone(),
        operator: OperatorCredentials::new(
            config.operator_username.clone(),
            &config.operator_password,
        ),
    });

    let app = handlers::router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, draining loan workflows");
    if loans.shutdown(config.shutdown_grace()).await {
        tracing::info!("All loan workflows finished");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
