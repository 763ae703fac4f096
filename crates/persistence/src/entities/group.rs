//! Group entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::group::{
    ApplicationStatus, CaveAssignment, Group, GroupMember, InvitationStatus, JoinPolicy,
    MemberRole,
};
use domain::services::inheritance::CandidateMember;
use sqlx::FromRow;

/// Database enum for member_role that maps to the PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
pub enum MemberRoleDb {
    Owner,
    Admin,
    Member,
}

impl From<MemberRoleDb> for MemberRole {
    fn from(db_role: MemberRoleDb) -> Self {
        match db_role {
            MemberRoleDb::Owner => MemberRole::Owner,
            MemberRoleDb::Admin => MemberRole::Admin,
            MemberRoleDb::Member => MemberRole::Member,
        }
    }
}

impl From<MemberRole> for MemberRoleDb {
    fn from(role: MemberRole) -> Self {
        match role {
            MemberRole::Owner => MemberRoleDb::Owner,
            MemberRole::Admin => MemberRoleDb::Admin,
            MemberRole::Member => MemberRoleDb::Member,
        }
    }
}

/// Database enum for join_policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "join_policy", rename_all = "snake_case")]
pub enum JoinPolicyDb {
    Open,
    Application,
    InviteOnly,
}

impl From<JoinPolicyDb> for JoinPolicy {
    fn from(db: JoinPolicyDb) -> Self {
        match db {
            JoinPolicyDb::Open => JoinPolicy::Open,
            JoinPolicyDb::Application => JoinPolicy::Application,
            JoinPolicyDb::InviteOnly => JoinPolicy::InviteOnly,
        }
    }
}

impl From<JoinPolicy> for JoinPolicyDb {
    fn from(policy: JoinPolicy) -> Self {
        match policy {
            JoinPolicy::Open => JoinPolicyDb::Open,
            JoinPolicy::Application => JoinPolicyDb::Application,
            JoinPolicy::InviteOnly => JoinPolicyDb::InviteOnly,
        }
    }
}

/// Database enum for invitation_status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
pub enum InvitationStatusDb {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl From<InvitationStatusDb> for InvitationStatus {
    fn from(db: InvitationStatusDb) -> Self {
        match db {
            InvitationStatusDb::Pending => InvitationStatus::Pending,
            InvitationStatusDb::Accepted => InvitationStatus::Accepted,
            InvitationStatusDb::Declined => InvitationStatus::Declined,
            InvitationStatusDb::Expired => InvitationStatus::Expired,
        }
    }
}

/// Database enum for application_status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
pub enum ApplicationStatusDb {
    Pending,
    Approved,
    Rejected,
}

impl From<ApplicationStatusDb> for ApplicationStatus {
    fn from(db: ApplicationStatusDb) -> Self {
        match db {
            ApplicationStatusDb::Pending => ApplicationStatus::Pending,
            ApplicationStatusDb::Approved => ApplicationStatus::Approved,
            ApplicationStatusDb::Rejected => ApplicationStatus::Rejected,
        }
    }
}

/// Database row mapping for the groups table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupEntity {
    pub group_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub join_policy: JoinPolicyDb,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GroupEntity> for Group {
    fn from(entity: GroupEntity) -> Self {
        Self {
            group_id: entity.group_id,
            name: entity.name,
            description: entity.description,
            join_policy: entity.join_policy.into(),
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the group_members table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupMemberEntity {
    pub member_id: i32,
    pub group_id: i32,
    pub user_email: String,
    pub role: MemberRoleDb,
    pub joined_at: DateTime<Utc>,
}

impl From<GroupMemberEntity> for GroupMember {
    fn from(entity: GroupMemberEntity) -> Self {
        Self {
            member_id: entity.member_id,
            group_id: entity.group_id,
            user_email: entity.user_email,
            role: entity.role.into(),
            joined_at: entity.joined_at,
        }
    }
}

impl From<GroupMemberEntity> for CandidateMember {
    fn from(entity: GroupMemberEntity) -> Self {
        Self {
            member_id: entity.member_id,
            user_email: entity.user_email,
            role: entity.role.into(),
            joined_at: entity.joined_at,
        }
    }
}

/// Group row joined with its member count, for listings.
#[derive(Debug, Clone, FromRow)]
pub struct GroupWithCountEntity {
    pub group_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub join_policy: JoinPolicyDb,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub member_count: i64,
}

/// Database row mapping for the group_invitations table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupInvitationEntity {
    pub invitation_id: i32,
    pub group_id: i32,
    pub inviter_email: String,
    pub invitee_email: String,
    pub role: MemberRoleDb,
    pub status: InvitationStatusDb,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Database row mapping for the group_applications table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupApplicationEntity {
    pub application_id: i32,
    pub group_id: i32,
    pub applicant_email: String,
    pub message: Option<String>,
    pub status: ApplicationStatusDb,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

/// Database row mapping for the group_caves assignment table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupCaveEntity {
    pub id: i32,
    pub group_id: i32,
    pub cave_id: i32,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

impl From<GroupCaveEntity> for CaveAssignment {
    fn from(entity: GroupCaveEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            cave_id: entity.cave_id,
            assigned_by: entity.assigned_by,
            assigned_at: entity.assigned_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_role_db_round_trip() {
        for role in [MemberRole::Owner, MemberRole::Admin, MemberRole::Member] {
            let db: MemberRoleDb = role.into();
            let back: MemberRole = db.into();
            assert_eq!(back, role);
        }
    }

    #[test]
    fn test_join_policy_db_round_trip() {
        for policy in [
            JoinPolicy::Open,
            JoinPolicy::Application,
            JoinPolicy::InviteOnly,
        ] {
            let db: JoinPolicyDb = policy.into();
            let back: JoinPolicy = db.into();
            assert_eq!(back, policy);
        }
    }
}
