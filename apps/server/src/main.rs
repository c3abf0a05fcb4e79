#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use stockpace_api::{construct_router, state::State};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Stockpace Reporting Service");

    let config = config::Config::from_env()?;
    tracing::info!(
        "Loaded configuration: db_host={} db_port={}",
        config.db.host,
        config.db.port
    );

    let state = Arc::new(State::new(config.db.clone()));

    let app = construct_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    stockpace_api::axum::serve(listener, app).await?;

    Ok(())
}
