use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use cavemap_api::app::{self, MediaState};
use cavemap_api::clients::CaveServiceClient;
use cavemap_api::config::Config;
use cavemap_api::handlers;
use cavemap_api::middleware::{init_metrics, logging};
use domain::models::event::CAVE_EVENTS_EXCHANGE;
use messaging::EventConsumer;
use persistence::repositories::MediaRepository;
use shared::service_token::SharedSecretVerifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    logging::init_logging(&config.logging);
    init_metrics();

    info!("Starting CaveMap media service v{}", env!("CARGO_PKG_VERSION"));
    info!(
        token_fingerprint = %shared::service_token::fingerprint(&config.services.service_token),
        "Service credential loaded"
    );

    let pool = persistence::db::create_pool_with_retry(&config.database_config()).await?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations/media")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let repo = MediaRepository::new(pool.clone());

    let mut consumer = EventConsumer::new("media-service", &config.broker.url);
    consumer.register(
        CAVE_EVENTS_EXCHANGE,
        Arc::new(handlers::media::CaveDeletedHandler::new(repo.clone())),
    );
    let consumer = Arc::new(consumer);
    consumer.start().await;

    let state = MediaState {
        config: Arc::new(config.clone()),
        verifier: Arc::new(SharedSecretVerifier::new(&config.services.service_token)),
        repo,
        cave_client: Arc::new(CaveServiceClient::new(
            &config.services.cave_service_url,
            &config.services.service_token,
            config.services.request_timeout_secs,
        )),
    };
    let app = app::create_media_app(state);

    let addr = config.socket_addr();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(app::shutdown_signal())
        .await?;

    consumer.stop().await;
    info!("Media service stopped");

    Ok(())
}
