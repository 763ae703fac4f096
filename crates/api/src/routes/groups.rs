//! Group service routes: group CRUD and joining.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use domain::models::group::{
    CreateGroupRequest, GroupDetail, GroupPublic, GroupSummary, JoinPolicy, MemberRole,
    UpdateGroupRequest,
};

use crate::app::GroupState;
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;

use super::mappers;

/// Create a new expedition group. The creator becomes the owner.
pub async fn create_group(
    State(state): State<GroupState>,
    user: CurrentUser,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupDetail>), ApiError> {
    req.validate()?;

    // Unique among active groups, case-insensitive.
    if state.repo.name_exists(&req.name, None).await? {
        return Err(ApiError::Conflict(
            "A group with this name already exists".into(),
        ));
    }

    let group = state
        .repo
        .create_group(
            &req.name,
            req.description.as_deref(),
            req.join_policy.unwrap_or(JoinPolicy::InviteOnly),
            &user.email,
        )
        .await?;

    let detail = mappers::group_detail(&state, group).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// List all groups the current user is a member of.
pub async fn list_my_groups(
    State(state): State<GroupState>,
    user: CurrentUser,
) -> Result<Json<Vec<GroupSummary>>, ApiError> {
    let groups = state.repo.find_user_groups(&user.email).await?;
    Ok(Json(groups.into_iter().map(mappers::group_summary).collect()))
}

/// List all active groups with membership status for the current user.
pub async fn list_all_groups(
    State(state): State<GroupState>,
    user: CurrentUser,
) -> Result<Json<Vec<GroupPublic>>, ApiError> {
    let groups = state.repo.list_active_groups().await?;
    let member_of = state.repo.membership_group_ids(&user.email).await?;
    let applied_to = state.repo.pending_application_group_ids(&user.email).await?;

    Ok(Json(
        groups
            .into_iter()
            .map(|g| mappers::group_public(g, &member_of, &applied_to))
            .collect(),
    ))
}

/// Get detailed information about a group. User must be a member.
pub async fn get_group(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(group_id): Path<i32>,
) -> Result<Json<GroupDetail>, ApiError> {
    let group = get_group_or_404(&state, group_id).await?;

    if !user.is_service {
        require_membership(&state, group_id, &user.email).await?;
    }

    let detail = mappers::group_detail(&state, group).await?;
    Ok(Json(detail))
}

/// Update group details. Requires admin privileges.
pub async fn update_group(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(group_id): Path<i32>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<Json<GroupDetail>, ApiError> {
    req.validate()?;
    get_group_or_404(&state, group_id).await?;
    require_group_admin(&state, group_id, &user.email).await?;

    if let Some(name) = &req.name {
        if state.repo.name_exists(name, Some(group_id)).await? {
            return Err(ApiError::Conflict(
                "A group with this name already exists".into(),
            ));
        }
    }

    let group = state
        .repo
        .update_group(
            group_id,
            req.name.as_deref(),
            req.description.as_deref(),
            req.join_policy,
        )
        .await?;

    let detail = mappers::group_detail(&state, group).await?;
    Ok(Json(detail))
}

/// Delete a group (soft delete). Requires owner privileges.
pub async fn delete_group(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(group_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    get_group_or_404(&state, group_id).await?;
    require_group_owner(&state, group_id, &user.email).await?;

    state.repo.soft_delete_group(group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join an open group directly.
pub async fn join_group(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(group_id): Path<i32>,
) -> Result<Json<GroupDetail>, ApiError> {
    let group = get_group_or_404(&state, group_id).await?;

    let policy: JoinPolicy = group.join_policy.into();
    if policy != JoinPolicy::Open {
        return Err(ApiError::Validation(
            "This group is not open for direct joining. You may need to apply or request an invitation.".into(),
        ));
    }

    if state
        .repo
        .get_membership(group_id, &user.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Validation(
            "You are already a member of this group".into(),
        ));
    }

    state
        .repo
        .add_member(group_id, &user.email, MemberRole::Member)
        .await?;

    let group = get_group_or_404(&state, group_id).await?;
    let detail = mappers::group_detail(&state, group).await?;
    Ok(Json(detail))
}

// --- Shared helpers used across group-service route modules ---

pub(crate) async fn get_group_or_404(
    state: &GroupState,
    group_id: i32,
) -> Result<persistence::entities::GroupEntity, ApiError> {
    state
        .repo
        .find_by_id(group_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Group not found".into()))
}

pub(crate) async fn require_membership(
    state: &GroupState,
    group_id: i32,
    user_email: &str,
) -> Result<persistence::entities::GroupMemberEntity, ApiError> {
    state
        .repo
        .get_membership(group_id, user_email)
        .await?
        .ok_or_else(|| ApiError::Forbidden("You are not a member of this group".into()))
}

pub(crate) async fn require_group_admin(
    state: &GroupState,
    group_id: i32,
    user_email: &str,
) -> Result<persistence::entities::GroupMemberEntity, ApiError> {
    let membership = require_membership(state, group_id, user_email)
        .await
        .map_err(|_| ApiError::Forbidden("Admin privileges required".into()))?;

    let role: MemberRole = membership.role.into();
    if role.can_manage_group() {
        Ok(membership)
    } else {
        Err(ApiError::Forbidden("Admin privileges required".into()))
    }
}

pub(crate) async fn require_group_owner(
    state: &GroupState,
    group_id: i32,
    user_email: &str,
) -> Result<persistence::entities::GroupMemberEntity, ApiError> {
    let membership = require_membership(state, group_id, user_email)
        .await
        .map_err(|_| ApiError::Forbidden("Owner privileges required".into()))?;

    let role: MemberRole = membership.role.into();
    if role.can_delete_group() {
        Ok(membership)
    } else {
        Err(ApiError::Forbidden("Owner privileges required".into()))
    }
}
