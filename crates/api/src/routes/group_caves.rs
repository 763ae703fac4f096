//! Group service routes: cave assignments and the internal
//! cross-service consistency endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use domain::models::group::{AssignCaveRequest, CaveAssignmentResponse, MembershipResponse};
use domain::services::inheritance::{resolve_cave_owner, InheritanceResponse};

use crate::app::GroupState;
use crate::clients::cave_service::cave_name_fallback;
use crate::error::ApiError;
use crate::middleware::auth::{CurrentUser, ServiceIdentity};

use super::groups::{get_group_or_404, require_group_admin, require_membership};
use super::mappers;

/// Assign a cave to this group. Requires admin privileges.
pub async fn assign_cave(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(group_id): Path<i32>,
    Json(req): Json<AssignCaveRequest>,
) -> Result<(StatusCode, Json<CaveAssignmentResponse>), ApiError> {
    get_group_or_404(&state, group_id).await?;
    require_group_admin(&state, group_id, &user.email).await?;

    // One group per cave, globally.
    if let Some(existing) = state.repo.find_assignment_by_cave(req.cave_id).await? {
        let message = if existing.group_id == group_id {
            "Cave is already assigned to this group"
        } else {
            "Cave is already assigned to another group"
        };
        return Err(ApiError::Validation(message.into()));
    }

    let assignment = state
        .repo
        .assign_cave(group_id, req.cave_id, &user.email)
        .await?;

    let cave_name = match state.cave_client.get_cave(assignment.cave_id).await {
        Some(cave) => cave.name,
        None => cave_name_fallback(assignment.cave_id),
    };
    let usernames = state
        .user_client
        .lookup_usernames(&[assignment.assigned_by.clone()])
        .await;

    Ok((
        StatusCode::CREATED,
        Json(mappers::assignment_response(assignment, cave_name, &usernames)),
    ))
}

/// List all caves assigned to a group. User must be a member.
pub async fn list_group_caves(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(group_id): Path<i32>,
) -> Result<Json<Vec<CaveAssignmentResponse>>, ApiError> {
    get_group_or_404(&state, group_id).await?;
    if !user.is_service {
        require_membership(&state, group_id, &user.email).await?;
    }

    let assignments = state.repo.list_group_assignments(group_id).await?;
    let emails: Vec<String> = assignments.iter().map(|a| a.assigned_by.clone()).collect();
    let usernames = state.user_client.lookup_usernames(&emails).await;

    let mut responses = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let cave_name = match state.cave_client.get_cave(assignment.cave_id).await {
            Some(cave) => cave.name,
            None => cave_name_fallback(assignment.cave_id),
        };
        responses.push(mappers::assignment_response(assignment, cave_name, &usernames));
    }
    Ok(Json(responses))
}

/// Get the group that manages a specific cave.
pub async fn get_cave_group(
    State(state): State<GroupState>,
    _user: CurrentUser,
    Path(cave_id): Path<i32>,
) -> Result<Json<CaveAssignmentResponse>, ApiError> {
    let assignment = state
        .repo
        .find_assignment_by_cave(cave_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Cave is not assigned to any group".into()))?;

    let cave_name = match state.cave_client.get_cave(cave_id).await {
        Some(cave) => cave.name,
        None => cave_name_fallback(cave_id),
    };
    let usernames = state
        .user_client
        .lookup_usernames(&[assignment.assigned_by.clone()])
        .await;

    Ok(Json(mappers::assignment_response(
        assignment, cave_name, &usernames,
    )))
}

/// Remove a cave from this group. Requires admin privileges.
pub async fn unassign_cave(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path((group_id, cave_id)): Path<(i32, i32)>,
) -> Result<StatusCode, ApiError> {
    get_group_or_404(&state, group_id).await?;
    require_group_admin(&state, group_id, &user.email).await?;

    let removed = state.repo.unassign_cave(group_id, cave_id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound(
            "Cave is not assigned to this group".into(),
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct InheritanceQuery {
    pub current_owner_email: String,
}

/// Internal: who inherits this cave when its current owner disappears?
///
/// Pure resolution over the current membership snapshot; the cave service
/// applies the decision on its side.
pub async fn cave_inheritance(
    State(state): State<GroupState>,
    _service: ServiceIdentity,
    Path(cave_id): Path<i32>,
    Query(query): Query<InheritanceQuery>,
) -> Result<Json<InheritanceResponse>, ApiError> {
    let candidates = state
        .repo
        .inheritance_candidates(cave_id, &query.current_owner_email)
        .await?;

    let decision = resolve_cave_owner(&candidates);
    info!(
        cave_id = cave_id,
        current_owner = %query.current_owner_email,
        candidates = candidates.len(),
        decision = ?decision,
        "Resolved cave inheritance"
    );

    Ok(Json(decision.into()))
}

/// Internal: remove every assignment referencing a cave. Idempotent; a
/// cave with no assignments still answers 204.
pub async fn delete_cave_assignments(
    State(state): State<GroupState>,
    _service: ServiceIdentity,
    Path(cave_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let removed = state.repo.delete_assignments_for_cave(cave_id).await?;
    info!(cave_id = cave_id, removed = removed, "Deleted cave assignments");
    Ok(StatusCode::NO_CONTENT)
}

/// Internal: is this user a member of the group the cave is assigned to?
pub async fn cave_membership(
    State(state): State<GroupState>,
    _service: ServiceIdentity,
    Path((cave_id, user_email)): Path<(i32, String)>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let Some(assignment) = state.repo.find_assignment_by_cave(cave_id).await? else {
        return Ok(Json(MembershipResponse {
            is_member: false,
            role: None,
        }));
    };

    let membership = state
        .repo
        .get_membership(assignment.group_id, &user_email)
        .await?;

    Ok(Json(MembershipResponse {
        is_member: membership.is_some(),
        role: membership.map(|m| m.role.into()),
    }))
}
