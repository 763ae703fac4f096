use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use cavemap_api::app::{self, CaveState};
use cavemap_api::clients::GroupServiceClient;
use cavemap_api::config::Config;
use cavemap_api::handlers;
use cavemap_api::middleware::{init_metrics, logging};
use cavemap_api::services::CaveOps;
use domain::models::event::{CAVE_EVENTS_EXCHANGE, USER_EVENTS_EXCHANGE};
use messaging::{EventConsumer, EventPublisher};
use persistence::repositories::CaveRepository;
use shared::service_token::SharedSecretVerifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    logging::init_logging(&config.logging);
    init_metrics();

    info!("Starting CaveMap cave service v{}", env!("CARGO_PKG_VERSION"));
    info!(
        token_fingerprint = %shared::service_token::fingerprint(&config.services.service_token),
        "Service credential loaded"
    );

    // The database is a hard dependency: bounded retries, then fail startup.
    let pool = persistence::db::create_pool_with_retry(&config.database_config()).await?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations/cave")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let publisher = Arc::new(EventPublisher::new(&config.broker.url, CAVE_EVENTS_EXCHANGE));
    // Don't fail startup if the broker is unavailable; publishing and the
    // consumer loop both reconnect on their own.
    if let Err(e) = publisher.start().await {
        warn!(error = %e, "Broker unavailable at startup, continuing without it");
    }

    let group_client = Arc::new(GroupServiceClient::new(
        &config.services.group_service_url,
        &config.services.service_token,
        config.services.request_timeout_secs,
    ));

    let ops = Arc::new(CaveOps::new(
        CaveRepository::new(pool.clone()),
        Arc::clone(&publisher),
        Arc::clone(&group_client),
    ));

    let mut consumer = EventConsumer::new("cave-service", &config.broker.url);
    consumer.register(
        USER_EVENTS_EXCHANGE,
        Arc::new(handlers::cave::UserDeletedHandler::new(Arc::clone(&ops))),
    );
    let consumer = Arc::new(consumer);
    consumer.start().await;

    let state = CaveState {
        config: Arc::new(config.clone()),
        verifier: Arc::new(SharedSecretVerifier::new(&config.services.service_token)),
        ops,
        group_client,
    };
    let app = app::create_cave_app(state);

    let addr = config.socket_addr();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(app::shutdown_signal())
        .await?;

    consumer.stop().await;
    publisher.close().await;
    info!("Cave service stopped");

    Ok(())
}
