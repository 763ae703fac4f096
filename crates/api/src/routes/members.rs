//! Group service routes: membership management.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use domain::models::group::{MemberResponse, MemberRole, UpdateMemberRoleRequest};

use crate::app::GroupState;
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;

use super::groups::{get_group_or_404, require_group_admin, require_membership};
use super::mappers;

/// List all members of a group. User must be a member.
pub async fn list_members(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(group_id): Path<i32>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    get_group_or_404(&state, group_id).await?;
    if !user.is_service {
        require_membership(&state, group_id, &user.email).await?;
    }

    let members = state.repo.list_members(group_id).await?;
    let emails: Vec<String> = members.iter().map(|m| m.user_email.clone()).collect();
    let usernames = state.user_client.lookup_usernames(&emails).await;

    Ok(Json(
        members
            .into_iter()
            .map(|m| mappers::member_response(m, &usernames))
            .collect(),
    ))
}

/// Change a member's role. Requires admin privileges.
///
/// The sole-owner invariant is enforced synchronously, before any mutation:
/// the owner cannot be demoted without a transfer, and promoting someone to
/// owner is the transfer (only the current owner may do it).
pub async fn update_member_role(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path((group_id, target_email)): Path<(i32, String)>,
    Json(req): Json<UpdateMemberRoleRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    get_group_or_404(&state, group_id).await?;
    let caller = require_group_admin(&state, group_id, &user.email).await?;

    let target = state
        .repo
        .get_membership(group_id, &target_email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".into()))?;

    let target_role: MemberRole = target.role.into();
    let caller_role: MemberRole = caller.role.into();

    if target_role == MemberRole::Owner && req.role != MemberRole::Owner {
        return Err(ApiError::Validation(
            "The owner cannot be demoted; transfer ownership instead".into(),
        ));
    }

    if req.role == MemberRole::Owner {
        if caller_role != MemberRole::Owner {
            return Err(ApiError::Forbidden(
                "Only the owner can transfer ownership".into(),
            ));
        }
        if target_email == user.email {
            return Err(ApiError::Validation("You are already the owner".into()));
        }
        state
            .repo
            .transfer_group_ownership(group_id, &user.email, &target_email)
            .await?;
    } else {
        state
            .repo
            .update_member_role(group_id, &target_email, req.role)
            .await?;
    }

    let updated = state
        .repo
        .get_membership(group_id, &target_email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".into()))?;

    let usernames = state
        .user_client
        .lookup_usernames(&[target_email.clone()])
        .await;
    Ok(Json(mappers::member_response(updated, &usernames)))
}

/// Remove a member. Admins can remove others; anyone can remove themselves.
/// The owner must transfer ownership before leaving.
pub async fn remove_member(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path((group_id, target_email)): Path<(i32, String)>,
) -> Result<StatusCode, ApiError> {
    get_group_or_404(&state, group_id).await?;

    if target_email != user.email {
        require_group_admin(&state, group_id, &user.email).await?;
    }

    let target = state
        .repo
        .get_membership(group_id, &target_email)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".into()))?;

    let target_role: MemberRole = target.role.into();
    if target_role == MemberRole::Owner {
        return Err(ApiError::Validation(
            "The owner cannot be removed; transfer ownership first".into(),
        ));
    }

    state.repo.remove_member(group_id, &target_email).await?;
    Ok(StatusCode::NO_CONTENT)
}
