//! Group service routes: invitations.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use validator::Validate;

use domain::models::group::{
    CreateInvitationRequest, InvitationResponse, InvitationStatus, MemberRole,
};
use persistence::entities::{GroupInvitationEntity, InvitationStatusDb};

use crate::app::GroupState;
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;

use super::groups::{get_group_or_404, require_group_admin};

/// How long an invitation stays open.
const INVITATION_TTL_DAYS: i64 = 14;

/// Invite a user into a group. Requires admin privileges.
pub async fn create_invitation(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(group_id): Path<i32>,
    Json(req): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), ApiError> {
    req.validate()?;
    let group = get_group_or_404(&state, group_id).await?;
    require_group_admin(&state, group_id, &user.email).await?;

    if state
        .repo
        .get_membership(group_id, &req.invitee_email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "User is already a member of this group".into(),
        ));
    }

    let role = req.role.unwrap_or(MemberRole::Member);
    if role == MemberRole::Owner {
        return Err(ApiError::Validation(
            "Cannot invite a user as owner".into(),
        ));
    }

    let invitation = state
        .repo
        .create_invitation(
            group_id,
            &user.email,
            &req.invitee_email,
            role,
            Some(Utc::now() + Duration::days(INVITATION_TTL_DAYS)),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(to_response(invitation, group.name)),
    ))
}

/// List pending invitations addressed to the current user.
pub async fn my_invitations(
    State(state): State<GroupState>,
    user: CurrentUser,
) -> Result<Json<Vec<InvitationResponse>>, ApiError> {
    let invitations = state.repo.list_user_invitations(&user.email).await?;

    let mut responses = Vec::with_capacity(invitations.len());
    for invitation in invitations {
        let group_name = match state.repo.find_by_id(invitation.group_id).await? {
            Some(group) => group.name,
            None => format!("Group #{}", invitation.group_id),
        };
        responses.push(to_response(invitation, group_name));
    }
    Ok(Json(responses))
}

/// Accept an invitation. Must be the invitee.
pub async fn accept_invitation(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(invitation_id): Path<i32>,
) -> Result<Json<InvitationResponse>, ApiError> {
    let invitation = find_pending_for(&state, invitation_id, &user.email).await?;
    let group = get_group_or_404(&state, invitation.group_id).await?;

    if let Some(expires_at) = invitation.expires_at {
        if expires_at < Utc::now() {
            state
                .repo
                .respond_invitation(invitation_id, InvitationStatus::Expired)
                .await?;
            return Err(ApiError::Validation("Invitation has expired".into()));
        }
    }

    if state
        .repo
        .get_membership(invitation.group_id, &user.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "You are already a member of this group".into(),
        ));
    }

    state
        .repo
        .add_member(invitation.group_id, &user.email, invitation.role.into())
        .await?;

    let accepted = state
        .repo
        .respond_invitation(invitation_id, InvitationStatus::Accepted)
        .await?;

    Ok(Json(to_response(accepted, group.name)))
}

/// Decline an invitation. Must be the invitee.
pub async fn decline_invitation(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(invitation_id): Path<i32>,
) -> Result<Json<InvitationResponse>, ApiError> {
    let invitation = find_pending_for(&state, invitation_id, &user.email).await?;

    let group_name = state
        .repo
        .find_by_id(invitation.group_id)
        .await?
        .map(|g| g.name)
        .unwrap_or_default();

    let declined = state
        .repo
        .respond_invitation(invitation_id, InvitationStatus::Declined)
        .await?;

    Ok(Json(to_response(declined, group_name)))
}

async fn find_pending_for(
    state: &GroupState,
    invitation_id: i32,
    user_email: &str,
) -> Result<GroupInvitationEntity, ApiError> {
    let invitation = state
        .repo
        .find_invitation(invitation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invitation not found".into()))?;

    if invitation.invitee_email != user_email {
        return Err(ApiError::Forbidden(
            "This invitation is not addressed to you".into(),
        ));
    }

    if invitation.status != InvitationStatusDb::Pending {
        return Err(ApiError::Validation(
            "Invitation has already been responded to".into(),
        ));
    }

    Ok(invitation)
}

fn to_response(invitation: GroupInvitationEntity, group_name: String) -> InvitationResponse {
    InvitationResponse {
        invitation_id: invitation.invitation_id,
        group_id: invitation.group_id,
        group_name,
        inviter_email: invitation.inviter_email,
        invitee_email: invitation.invitee_email,
        role: invitation.role.into(),
        status: invitation.status.into(),
        created_at: invitation.created_at,
        expires_at: invitation.expires_at,
    }
}
