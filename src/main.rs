use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use barberbook::config::AppConfig;
use barberbook::db;
use barberbook::handlers;
use barberbook::services::loyalty;
use barberbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let state = Arc::new(AppState::new(conn, config.clone()));

    if config.loyalty_sweep_secs > 0 {
        tracing::info!(
            interval_secs = config.loyalty_sweep_secs,
            "loyalty reconciliation sweep enabled"
        );
        tokio::spawn(loyalty_sweep(
            state.clone(),
            Duration::from_secs(config.loyalty_sweep_secs),
        ));
    }

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn loyalty_sweep(state: Arc<AppState>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let result = state.conn().and_then(|db| loyalty::reconcile(&db));
        if let Err(e) = result {
            tracing::warn!(error = %e, "loyalty reconciliation sweep failed");
        }
    }
}
