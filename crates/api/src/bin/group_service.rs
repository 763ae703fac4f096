use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use cavemap_api::app::{self, GroupState};
use cavemap_api::clients::{CaveServiceClient, UserServiceClient};
use cavemap_api::config::Config;
use cavemap_api::handlers;
use cavemap_api::middleware::{init_metrics, logging};
use domain::models::event::{CAVE_EVENTS_EXCHANGE, USER_EVENTS_EXCHANGE};
use messaging::EventConsumer;
use persistence::repositories::GroupRepository;
use shared::service_token::SharedSecretVerifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    logging::init_logging(&config.logging);
    init_metrics();

    info!("Starting CaveMap group service v{}", env!("CARGO_PKG_VERSION"));
    info!(
        token_fingerprint = %shared::service_token::fingerprint(&config.services.service_token),
        "Service credential loaded"
    );

    let pool = persistence::db::create_pool_with_retry(&config.database_config()).await?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations/group")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let repo = GroupRepository::new(pool.clone());

    // Consumes both deletion topics: user.deleted drives the ownership
    // cascade, cave.deleted drives assignment cleanup.
    let mut consumer = EventConsumer::new("group-service", &config.broker.url);
    consumer.register(
        USER_EVENTS_EXCHANGE,
        Arc::new(handlers::group::UserDeletedHandler::new(repo.clone())),
    );
    consumer.register(
        CAVE_EVENTS_EXCHANGE,
        Arc::new(handlers::group::CaveDeletedHandler::new(repo.clone())),
    );
    let consumer = Arc::new(consumer);
    consumer.start().await;

    let state = GroupState {
        config: Arc::new(config.clone()),
        verifier: Arc::new(SharedSecretVerifier::new(&config.services.service_token)),
        repo,
        user_client: Arc::new(UserServiceClient::new(
            &config.services.user_service_url,
            &config.services.service_token,
            config.services.request_timeout_secs,
        )),
        cave_client: Arc::new(CaveServiceClient::new(
            &config.services.cave_service_url,
            &config.services.service_token,
            config.services.request_timeout_secs,
        )),
    };
    let app = app::create_group_app(state);

    let addr = config.socket_addr();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(app::shutdown_signal())
        .await?;

    consumer.stop().await;
    info!("Group service stopped");

    Ok(())
}
