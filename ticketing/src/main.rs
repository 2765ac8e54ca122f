//! Ticket sale HTTP server.

use ticketing::{AppState, Config, metrics};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticketing=debug,ticket_engine_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ticket sale server");

    let config = Config::from_env();
    info!(
        host = %config.server.host,
        port = config.server.port,
        order_limit = config.orders.limit,
        expiry_minutes = config.orders.expiry_minutes,
        "Configuration loaded"
    );
    if config.payment.mock_auto_pay {
        warn!("Mock payment provider settles every checkout as paid");
    }

    let (state, seeded) = AppState::in_memory(config);
    for user in &seeded {
        info!(username = %user.username, user_id = %user.id, admin = user.admin, "Seeded user");
    }

    let state = match metrics::install_exporter() {
        Ok(handle) => state.with_metrics(handle),
        Err(error) => {
            warn!(error = %error, "Prometheus exporter not installed");
            state
        }
    };

    ticketing::run(state).await
}
