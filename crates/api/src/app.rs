//! Router and state construction for the three service binaries.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use shared::service_token::ServiceTokenVerifier;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::clients::{CaveServiceClient, GroupServiceClient, UserServiceClient};
use crate::config::Config;
use crate::middleware::auth::AuthState;
use crate::middleware::metrics_handler;
use crate::routes;
use crate::services::CaveOps;
use persistence::repositories::{GroupRepository, MediaRepository};

/// Application state for the cave service.
#[derive(Clone)]
pub struct CaveState {
    pub config: Arc<Config>,
    pub verifier: Arc<dyn ServiceTokenVerifier>,
    pub ops: Arc<CaveOps>,
    pub group_client: Arc<GroupServiceClient>,
}

impl AuthState for CaveState {
    fn token_verifier(&self) -> &Arc<dyn ServiceTokenVerifier> {
        &self.verifier
    }
}

/// Application state for the group service.
#[derive(Clone)]
pub struct GroupState {
    pub config: Arc<Config>,
    pub verifier: Arc<dyn ServiceTokenVerifier>,
    pub repo: GroupRepository,
    pub user_client: Arc<UserServiceClient>,
    pub cave_client: Arc<CaveServiceClient>,
}

impl AuthState for GroupState {
    fn token_verifier(&self) -> &Arc<dyn ServiceTokenVerifier> {
        &self.verifier
    }
}

/// Application state for the media service.
#[derive(Clone)]
pub struct MediaState {
    pub config: Arc<Config>,
    pub verifier: Arc<dyn ServiceTokenVerifier>,
    pub repo: MediaRepository,
    pub cave_client: Arc<CaveServiceClient>,
}

impl AuthState for MediaState {
    fn token_verifier(&self) -> &Arc<dyn ServiceTokenVerifier> {
        &self.verifier
    }
}

/// Build the cave service router.
pub fn create_cave_app(state: CaveState) -> Router {
    let timeout = request_timeout(&state.config);

    Router::new()
        .route(
            "/caves",
            get(routes::caves::list_caves).post(routes::caves::create_cave),
        )
        .route(
            "/caves/:cave_id",
            get(routes::caves::get_cave)
                .patch(routes::caves::update_cave)
                .delete(routes::caves::delete_cave),
        )
        .route(
            "/caves/:cave_id/entrances",
            get(routes::caves::list_entrances).post(routes::caves::add_entrance),
        )
        .route(
            "/caves/:cave_id/entrances/:entrance_id",
            delete(routes::caves::delete_entrance),
        )
        .route(
            "/caves/:cave_id/permissions/:user_email",
            get(routes::caves::cave_permissions),
        )
        .route("/health", get(routes::health::health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors_layer())
        .with_state(state)
}

/// Build the group service router.
pub fn create_group_app(state: GroupState) -> Router {
    let timeout = request_timeout(&state.config);

    Router::new()
        .route(
            "/groups",
            get(routes::groups::list_all_groups).post(routes::groups::create_group),
        )
        .route("/groups/me", get(routes::groups::list_my_groups))
        .route(
            "/groups/:group_id",
            get(routes::groups::get_group)
                .patch(routes::groups::update_group)
                .delete(routes::groups::delete_group),
        )
        .route("/groups/:group_id/join", post(routes::groups::join_group))
        .route(
            "/groups/:group_id/members",
            get(routes::members::list_members),
        )
        .route(
            "/groups/:group_id/members/:user_email",
            axum::routing::patch(routes::members::update_member_role)
                .delete(routes::members::remove_member),
        )
        .route(
            "/groups/:group_id/invitations",
            post(routes::invitations::create_invitation),
        )
        .route("/invitations/me", get(routes::invitations::my_invitations))
        .route(
            "/invitations/:invitation_id/accept",
            post(routes::invitations::accept_invitation),
        )
        .route(
            "/invitations/:invitation_id/decline",
            post(routes::invitations::decline_invitation),
        )
        .route(
            "/groups/:group_id/applications",
            get(routes::applications::list_applications).post(routes::applications::apply),
        )
        .route(
            "/applications/:application_id/approve",
            post(routes::applications::approve_application),
        )
        .route(
            "/applications/:application_id/reject",
            post(routes::applications::reject_application),
        )
        .route(
            "/groups/:group_id/caves",
            get(routes::group_caves::list_group_caves).post(routes::group_caves::assign_cave),
        )
        .route(
            "/groups/:group_id/caves/:cave_id",
            delete(routes::group_caves::unassign_cave),
        )
        .route(
            "/groups/caves/:cave_id/group",
            get(routes::group_caves::get_cave_group),
        )
        // Internal endpoints, service token only.
        .route(
            "/groups/caves/:cave_id/inheritance",
            get(routes::group_caves::cave_inheritance),
        )
        .route(
            "/caves/:cave_id/assignments",
            delete(routes::group_caves::delete_cave_assignments),
        )
        .route(
            "/caves/:cave_id/membership/:user_email",
            get(routes::group_caves::cave_membership),
        )
        .route("/health", get(routes::health::health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors_layer())
        .with_state(state)
}

/// Build the media service router.
pub fn create_media_app(state: MediaState) -> Router {
    let timeout = request_timeout(&state.config);

    Router::new()
        .route("/media", post(routes::media::register_media))
        .route(
            "/media/:id",
            get(routes::media::get_media).delete(routes::media::delete_media),
        )
        .route("/caves/:cave_id/media", get(routes::media::list_cave_media))
        .route("/health", get(routes::health::health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors_layer())
        .with_state(state)
}

fn request_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.server.request_timeout_secs)
}

fn cors_layer() -> CorsLayer {
    // The auth proxy in front of the services owns origin policy; the
    // services themselves stay permissive.
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Resolve on SIGTERM or ctrl-c, for graceful shutdown.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
