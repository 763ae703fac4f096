//! Media service routes.
//!
//! Mutations on media attached to a cave are gated by the cave service's
//! permission probe. That call protects an authorization decision, so when
//! it cannot be answered the operation is rejected, never waved through.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::warn;
use validator::Validate;

use domain::models::media::{MediaFile, MediaListResponse, RegisterMediaRequest};

use crate::app::MediaState;
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;

/// Register an uploaded media file.
pub async fn register_media(
    State(state): State<MediaState>,
    user: CurrentUser,
    Json(req): Json<RegisterMediaRequest>,
) -> Result<(StatusCode, Json<MediaFile>), ApiError> {
    req.validate()?;

    if let Some(cave_id) = req.cave_id {
        require_cave_edit(&state, cave_id, &user).await?;
    }

    let media = state
        .repo
        .register_media(
            &req.filename,
            &req.original_name,
            &req.content_type,
            req.size_bytes,
            req.cave_id,
            &user.email,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(media.into())))
}

/// Get a media record.
pub async fn get_media(
    State(state): State<MediaState>,
    _user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<Json<MediaFile>, ApiError> {
    let media = state
        .repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Media file not found".into()))?;
    Ok(Json(media.into()))
}

/// List media records for a cave.
pub async fn list_cave_media(
    State(state): State<MediaState>,
    _user: CurrentUser,
    Path(cave_id): Path<i32>,
) -> Result<Json<MediaListResponse>, ApiError> {
    let media = state.repo.list_for_cave(cave_id).await?;
    let data: Vec<MediaFile> = media.into_iter().map(Into::into).collect();
    let count = data.len();
    Ok(Json(MediaListResponse { data, count }))
}

/// Delete a media record. Allowed for the uploader, or anyone the cave
/// service says may edit the cave.
pub async fn delete_media(
    State(state): State<MediaState>,
    user: CurrentUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let media = state
        .repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Media file not found".into()))?;

    if media.uploaded_by != user.email && !user.is_service {
        match media.cave_id {
            Some(cave_id) => require_cave_edit(&state, cave_id, &user).await?,
            None => {
                return Err(ApiError::Forbidden(
                    "Only the uploader can delete this file".into(),
                ))
            }
        }
    }

    state.repo.delete_media(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fail-closed permission gate: any failure to get an answer is a denial.
async fn require_cave_edit(
    state: &MediaState,
    cave_id: i32,
    user: &CurrentUser,
) -> Result<(), ApiError> {
    if user.is_service {
        return Ok(());
    }

    match state.cave_client.can_edit_cave(cave_id, &user.email).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::Forbidden(
            "You do not have permission to modify this cave's media".into(),
        )),
        Err(e) => {
            warn!(
                cave_id = cave_id,
                user_email = %user.email,
                error = %e,
                "Permission check failed, denying access"
            );
            Err(ApiError::Forbidden(
                "You do not have permission to modify this cave's media".into(),
            ))
        }
    }
}
