//! Cave service routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::warn;
use validator::Validate;

use domain::models::cave::{
    Cave, CaveDetail, CaveEntrance, CavePermissionResponse, CreateCaveRequest,
    CreateEntranceRequest, UpdateCaveRequest,
};

use crate::app::CaveState;
use crate::error::ApiError;
use crate::middleware::auth::{CurrentUser, ServiceIdentity};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List caves.
pub async fn list_caves(
    State(state): State<CaveState>,
    _user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Cave>>, ApiError> {
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let offset = query.offset.unwrap_or(0).max(0);

    let caves = state.ops.repo().list_caves(limit, offset).await?;
    Ok(Json(caves.into_iter().map(Into::into).collect()))
}

/// Create a cave. The caller becomes the owner.
pub async fn create_cave(
    State(state): State<CaveState>,
    user: CurrentUser,
    Json(req): Json<CreateCaveRequest>,
) -> Result<(StatusCode, Json<Cave>), ApiError> {
    req.validate()?;

    let cave = state
        .ops
        .repo()
        .create_cave(
            &req.name,
            req.description.as_deref(),
            &user.email,
            req.latitude,
            req.longitude,
            req.depth_m,
            req.length_m,
            req.discovered_at,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(cave.into())))
}

/// Get a cave with its entrances and associated media ids.
pub async fn get_cave(
    State(state): State<CaveState>,
    _user: CurrentUser,
    Path(cave_id): Path<i32>,
) -> Result<Json<CaveDetail>, ApiError> {
    let cave = state
        .ops
        .repo()
        .find_by_id(cave_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Cave not found".into()))?;

    let entrances = state.ops.repo().list_entrances(cave_id).await?;
    let media_file_ids = state.ops.repo().media_file_ids(cave_id).await?;

    Ok(Json(to_cave_detail(cave.into(), entrances, media_file_ids)))
}

/// Update a cave. Owner only.
pub async fn update_cave(
    State(state): State<CaveState>,
    user: CurrentUser,
    Path(cave_id): Path<i32>,
    Json(req): Json<UpdateCaveRequest>,
) -> Result<Json<Cave>, ApiError> {
    req.validate()?;
    require_owner(&state, cave_id, &user).await?;

    let cave = state
        .ops
        .repo()
        .update_cave(
            cave_id,
            req.name.as_deref(),
            req.description.as_deref(),
            req.latitude,
            req.longitude,
            req.depth_m,
            req.length_m,
        )
        .await?;

    Ok(Json(cave.into()))
}

/// Delete a cave. Owner only. Succeeds from the caller's point of view as
/// soon as the row is gone; cross-service cleanup reconciles via the
/// published event.
pub async fn delete_cave(
    State(state): State<CaveState>,
    user: CurrentUser,
    Path(cave_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    require_owner(&state, cave_id, &user).await?;

    if state.ops.delete_cave_and_notify(cave_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Cave not found".into()))
    }
}

/// List a cave's entrances.
pub async fn list_entrances(
    State(state): State<CaveState>,
    _user: CurrentUser,
    Path(cave_id): Path<i32>,
) -> Result<Json<Vec<CaveEntrance>>, ApiError> {
    state
        .ops
        .repo()
        .find_by_id(cave_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Cave not found".into()))?;

    let entrances = state.ops.repo().list_entrances(cave_id).await?;
    Ok(Json(entrances.into_iter().map(Into::into).collect()))
}

/// Add an entrance. Owner only.
pub async fn add_entrance(
    State(state): State<CaveState>,
    user: CurrentUser,
    Path(cave_id): Path<i32>,
    Json(req): Json<CreateEntranceRequest>,
) -> Result<(StatusCode, Json<CaveEntrance>), ApiError> {
    req.validate()?;
    require_owner(&state, cave_id, &user).await?;

    let entrance = state
        .ops
        .repo()
        .add_entrance(
            cave_id,
            req.name.as_deref(),
            req.latitude,
            req.longitude,
            req.elevation_m,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(entrance.into())))
}

/// Remove an entrance. Owner only.
pub async fn delete_entrance(
    State(state): State<CaveState>,
    user: CurrentUser,
    Path((cave_id, entrance_id)): Path<(i32, i32)>,
) -> Result<StatusCode, ApiError> {
    require_owner(&state, cave_id, &user).await?;

    let removed = state.ops.repo().delete_entrance(cave_id, entrance_id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound("Entrance not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Internal: can this user modify the cave's attachments?
///
/// The owner always can; otherwise membership in the assigned group counts.
/// When the membership probe is unreachable after retries the answer is 503
/// so the caller denies access, never a silent allow.
pub async fn cave_permissions(
    State(state): State<CaveState>,
    _service: ServiceIdentity,
    Path((cave_id, user_email)): Path<(i32, String)>,
) -> Result<Json<CavePermissionResponse>, ApiError> {
    let cave = state
        .ops
        .repo()
        .find_by_id(cave_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Cave not found".into()))?;

    if cave.owner_email == user_email {
        return Ok(Json(CavePermissionResponse { can_edit: true }));
    }

    match state.group_client.cave_membership(cave_id, &user_email).await {
        Ok(membership) => Ok(Json(CavePermissionResponse {
            can_edit: membership.is_member,
        })),
        Err(e) => {
            warn!(cave_id = cave_id, error = %e, "Membership probe unreachable, failing closed");
            Err(ApiError::ServiceUnavailable(
                "Permission check unavailable".into(),
            ))
        }
    }
}

async fn require_owner(
    state: &CaveState,
    cave_id: i32,
    user: &CurrentUser,
) -> Result<(), ApiError> {
    let cave = state
        .ops
        .repo()
        .find_by_id(cave_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Cave not found".into()))?;

    if user.is_service || cave.owner_email == user.email {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Only the owner can modify this cave".into()))
    }
}

fn to_cave_detail(
    cave: Cave,
    entrances: Vec<persistence::entities::CaveEntranceEntity>,
    media_file_ids: Vec<i32>,
) -> CaveDetail {
    CaveDetail {
        cave_id: cave.cave_id,
        name: cave.name,
        description: cave.description,
        owner_email: cave.owner_email,
        latitude: cave.latitude,
        longitude: cave.longitude,
        depth_m: cave.depth_m,
        length_m: cave.length_m,
        discovered_at: cave.discovered_at,
        created_at: cave.created_at,
        updated_at: cave.updated_at,
        entrances: entrances.into_iter().map(Into::into).collect(),
        media_file_ids,
    }
}
