//! Server startup.

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use paybridge_chain_eip155::{Eip155RevertProbe, RevertProbe};
use paybridge_router::fees::{GasEstimator, NoGasFee};
use paybridge_router::handlers::{self, AppState};
use paybridge_router::lifecycle::PaymentLifecycle;
use paybridge_router::resolver::{AlwaysHealthy, FeeQuoter};
use paybridge_router::sweeper::ExpirySweeper;
use paybridge_router::util::{SigDown, Telemetry};
use paybridge_types::store::{ConfigStore, PaymentStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tower_http::cors;

use crate::config::Config;

/// Starts the payment router.
///
/// - Loads `.env` variables and installs logging (and OTLP export when configured).
/// - Seeds the in-memory store from the config registry.
/// - Serves the HTTP endpoints and runs the expiry sweeper until SIGTERM/SIGINT.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register()?;

    let config = Config::load()?;
    let addr = SocketAddr::new(config.host(), config.port());
    let payment_ttl_secs = config.payment_ttl_secs();
    let sweep_period = Duration::from_secs(config.expiry_sweep_secs());

    let store = Arc::new(config.into_registry().into_store().await?);
    let config_store: Arc<dyn ConfigStore> = store.clone();
    let payment_store: Arc<dyn PaymentStore> = store;
    let lifecycle = PaymentLifecycle::with_collaborators(
        config_store,
        payment_store.clone(),
        Arc::new(AlwaysHealthy) as Arc<dyn FeeQuoter>,
        Arc::new(NoGasFee) as Arc<dyn GasEstimator>,
    )
    .with_payment_ttl(payment_ttl_secs);
    let lifecycle = Arc::new(lifecycle);
    let probe: Arc<dyn RevertProbe> = Arc::new(Eip155RevertProbe::new());
    let axum_state = AppState::new(lifecycle.clone(), probe);

    let http_endpoints = Router::new()
        .merge(handlers::routes().with_state(axum_state))
        .layer(telemetry.http_tracing())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    tracing::info!("Starting server at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .inspect_err(|e| tracing::error!("Failed to bind to {}: {}", addr, e))?;

    let sig_down = SigDown::try_new()?;
    let background = TaskTracker::new();
    ExpirySweeper::new(lifecycle, payment_store, sweep_period)
        .spawn(&background, sig_down.cancellation_token());
    background.close();

    let axum_cancellation_token = sig_down.cancellation_token();
    let axum_graceful_shutdown = async move { axum_cancellation_token.cancelled().await };
    axum::serve(listener, http_endpoints)
        .with_graceful_shutdown(axum_graceful_shutdown)
        .await?;

    background.wait().await;
    tracing::info!("Server stopped");
    Ok(())
}
