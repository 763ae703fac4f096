//! Group domain models for expedition groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Role within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
        }
    }

    /// Ranking weight used by ownership inheritance. Higher wins.
    pub fn priority(&self) -> u8 {
        match self {
            MemberRole::Owner => 3,
            MemberRole::Admin => 2,
            MemberRole::Member => 1,
        }
    }

    /// Returns true if this role can manage members and cave assignments.
    pub fn can_manage_group(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }

    /// Returns true if this role can delete the group.
    pub fn can_delete_group(&self) -> bool {
        matches!(self, MemberRole::Owner)
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(MemberRole::Owner),
            "admin" => Ok(MemberRole::Admin),
            "member" => Ok(MemberRole::Member),
            _ => Err(format!("Invalid member role: {}", s)),
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How users can join a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Anyone can join directly.
    Open,
    /// Users apply, admins approve.
    Application,
    /// Only by invitation.
    InviteOnly,
}

impl JoinPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinPolicy::Open => "open",
            JoinPolicy::Application => "application",
            JoinPolicy::InviteOnly => "invite_only",
        }
    }
}

/// Status of a group invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

/// Status of a join application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

/// An expedition group managing shared caves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Group {
    pub group_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub join_policy: JoinPolicy,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's membership in a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupMember {
    pub member_id: i32,
    pub group_id: i32,
    pub user_email: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Assignment linking a cave (by foreign-service id) to a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CaveAssignment {
    pub id: i32,
    pub group_id: i32,
    pub cave_id: i32,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Request payload for creating a group.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateGroupRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Name must be between 1 and 255 characters"
    ))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub join_policy: Option<JoinPolicy>,
}

/// Request payload for updating a group.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateGroupRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Name must be between 1 and 255 characters"
    ))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub join_policy: Option<JoinPolicy>,
}

/// Request to change a member's role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UpdateMemberRoleRequest {
    pub role: MemberRole,
}

/// Request to invite a user into a group.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateInvitationRequest {
    #[validate(email(message = "Invitee must be a valid email address"))]
    pub invitee_email: String,

    pub role: Option<MemberRole>,
}

/// Request to apply for membership.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateApplicationRequest {
    #[validate(length(max = 2000, message = "Message must be at most 2000 characters"))]
    pub message: Option<String>,
}

/// Request to assign a cave to a group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssignCaveRequest {
    pub cave_id: i32,
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Member in a group response, enriched with a display username.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MemberResponse {
    pub member_id: i32,
    pub user_email: String,
    pub username: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Cave assignment in a group response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CaveAssignmentResponse {
    pub id: i32,
    pub group_id: i32,
    pub cave_id: i32,
    pub cave_name: String,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

/// Full group detail with members and assigned caves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupDetail {
    pub group_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub join_policy: JoinPolicy,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub members: Vec<MemberResponse>,
    pub caves: Vec<CaveAssignmentResponse>,
}

/// Group summary for the caller's own group listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupSummary {
    pub group_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub join_policy: JoinPolicy,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Group listing entry with the caller's relationship to the group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupPublic {
    pub group_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub join_policy: JoinPolicy,
    pub member_count: i64,
    pub is_member: bool,
    pub has_pending_application: bool,
    pub created_at: DateTime<Utc>,
}

/// Invitation as returned to inviters and invitees.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InvitationResponse {
    pub invitation_id: i32,
    pub group_id: i32,
    pub group_name: String,
    pub inviter_email: String,
    pub invitee_email: String,
    pub role: MemberRole,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Application as returned to applicants and reviewers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ApplicationResponse {
    pub application_id: i32,
    pub group_id: i32,
    pub applicant_email: String,
    pub message: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

/// Membership probe answer for sibling services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MembershipResponse {
    pub is_member: bool,
    pub role: Option<MemberRole>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_role_as_str() {
        assert_eq!(MemberRole::Owner.as_str(), "owner");
        assert_eq!(MemberRole::Admin.as_str(), "admin");
        assert_eq!(MemberRole::Member.as_str(), "member");
    }

    #[test]
    fn test_member_role_from_str() {
        assert_eq!(MemberRole::from_str("owner").unwrap(), MemberRole::Owner);
        assert_eq!(MemberRole::from_str("ADMIN").unwrap(), MemberRole::Admin);
        assert_eq!(MemberRole::from_str("Member").unwrap(), MemberRole::Member);
        assert!(MemberRole::from_str("viewer").is_err());
    }

    #[test]
    fn test_member_role_priority_ordering() {
        assert!(MemberRole::Owner.priority() > MemberRole::Admin.priority());
        assert!(MemberRole::Admin.priority() > MemberRole::Member.priority());
    }

    #[test]
    fn test_member_role_permissions() {
        assert!(MemberRole::Owner.can_manage_group());
        assert!(MemberRole::Owner.can_delete_group());

        assert!(MemberRole::Admin.can_manage_group());
        assert!(!MemberRole::Admin.can_delete_group());

        assert!(!MemberRole::Member.can_manage_group());
        assert!(!MemberRole::Member.can_delete_group());
    }

    #[test]
    fn test_join_policy_serde_round_trip() {
        let json = serde_json::to_string(&JoinPolicy::InviteOnly).unwrap();
        assert_eq!(json, "\"invite_only\"");
        let back: JoinPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, JoinPolicy::InviteOnly);
    }

    #[test]
    fn test_create_group_request_validation() {
        let valid = CreateGroupRequest {
            name: "Karst Explorers".to_string(),
            description: Some("Weekend expeditions".to_string()),
            join_policy: Some(JoinPolicy::Open),
        };
        assert!(valid.validate().is_ok());

        let empty_name = CreateGroupRequest {
            name: String::new(),
            description: None,
            join_policy: None,
        };
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_create_invitation_request_validation() {
        let valid = CreateInvitationRequest {
            invitee_email: "caver@example.com".to_string(),
            role: Some(MemberRole::Member),
        };
        assert!(valid.validate().is_ok());

        let invalid = CreateInvitationRequest {
            invitee_email: "not-an-email".to_string(),
            role: None,
        };
        assert!(invalid.validate().is_err());
    }
}
