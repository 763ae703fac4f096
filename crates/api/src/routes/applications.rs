//! Group service routes: join applications.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use domain::models::group::{
    ApplicationResponse, ApplicationStatus, CreateApplicationRequest, JoinPolicy, MemberRole,
};
use persistence::entities::{ApplicationStatusDb, GroupApplicationEntity};

use crate::app::GroupState;
use crate::error::ApiError;
use crate::middleware::auth::CurrentUser;

use super::groups::{get_group_or_404, require_group_admin};

/// Apply to join an application-based group.
pub async fn apply(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(group_id): Path<i32>,
    Json(req): Json<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationResponse>), ApiError> {
    req.validate()?;
    let group = get_group_or_404(&state, group_id).await?;

    let policy: JoinPolicy = group.join_policy.into();
    if policy != JoinPolicy::Application {
        return Err(ApiError::Validation(
            "This group does not accept applications".into(),
        ));
    }

    if state
        .repo
        .get_membership(group_id, &user.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "You are already a member of this group".into(),
        ));
    }

    let pending = state.repo.pending_application_group_ids(&user.email).await?;
    if pending.contains(&group_id) {
        return Err(ApiError::Conflict(
            "You already have a pending application for this group".into(),
        ));
    }

    let application = state
        .repo
        .create_application(group_id, &user.email, req.message.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(to_response(application))))
}

/// List pending applications for a group. Requires admin privileges.
pub async fn list_applications(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(group_id): Path<i32>,
) -> Result<Json<Vec<ApplicationResponse>>, ApiError> {
    get_group_or_404(&state, group_id).await?;
    require_group_admin(&state, group_id, &user.email).await?;

    let applications = state.repo.list_pending_applications(group_id).await?;
    Ok(Json(applications.into_iter().map(to_response).collect()))
}

/// Approve an application: the applicant becomes a member.
pub async fn approve_application(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(application_id): Path<i32>,
) -> Result<Json<ApplicationResponse>, ApiError> {
    let application = find_pending(&state, application_id).await?;
    get_group_or_404(&state, application.group_id).await?;
    require_group_admin(&state, application.group_id, &user.email).await?;

    if state
        .repo
        .get_membership(application.group_id, &application.applicant_email)
        .await?
        .is_none()
    {
        state
            .repo
            .add_member(
                application.group_id,
                &application.applicant_email,
                MemberRole::Member,
            )
            .await?;
    }

    let reviewed = state
        .repo
        .review_application(application_id, ApplicationStatus::Approved, &user.email)
        .await?;

    Ok(Json(to_response(reviewed)))
}

/// Reject an application.
pub async fn reject_application(
    State(state): State<GroupState>,
    user: CurrentUser,
    Path(application_id): Path<i32>,
) -> Result<Json<ApplicationResponse>, ApiError> {
    let application = find_pending(&state, application_id).await?;
    get_group_or_404(&state, application.group_id).await?;
    require_group_admin(&state, application.group_id, &user.email).await?;

    let reviewed = state
        .repo
        .review_application(application_id, ApplicationStatus::Rejected, &user.email)
        .await?;

    Ok(Json(to_response(reviewed)))
}

async fn find_pending(
    state: &GroupState,
    application_id: i32,
) -> Result<GroupApplicationEntity, ApiError> {
    let application = state
        .repo
        .find_application(application_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Application not found".into()))?;

    if application.status != ApplicationStatusDb::Pending {
        return Err(ApiError::Validation(
            "Application has already been reviewed".into(),
        ));
    }

    Ok(application)
}

fn to_response(application: GroupApplicationEntity) -> ApplicationResponse {
    ApplicationResponse {
        application_id: application.application_id,
        group_id: application.group_id,
        applicant_email: application.applicant_email,
        message: application.message,
        status: application.status.into(),
        created_at: application.created_at,
        reviewed_at: application.reviewed_at,
        reviewed_by: application.reviewed_by,
    }
}
