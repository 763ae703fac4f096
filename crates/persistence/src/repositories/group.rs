//! Group repository for database operations.
//!
//! Besides plain CRUD this repository owns the user-deletion cascade: the
//! multi-group ownership transfer that must commit or roll back as one unit.

use domain::models::group::{ApplicationStatus, InvitationStatus, JoinPolicy, MemberRole};
use domain::services::inheritance::{select_group_successor, CandidateMember};
use shared::service_token::SYSTEM_IDENTITY;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;

use crate::entities::{
    ApplicationStatusDb, GroupApplicationEntity, GroupCaveEntity, GroupEntity,
    GroupInvitationEntity, GroupMemberEntity, GroupWithCountEntity, InvitationStatusDb,
    JoinPolicyDb, MemberRoleDb,
};
use crate::metrics::QueryTimer;

/// What the user-deletion cascade did, for logging and assertions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserDeletionOutcome {
    pub groups_transferred: u32,
    pub groups_deleted: u32,
    pub memberships_removed: u64,
    pub assignments_reattributed: u64,
}

/// Repository for group-related database operations.
#[derive(Clone)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    /// Creates a new GroupRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a new group and add the creator as owner.
    pub async fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
        join_policy: JoinPolicy,
        creator_email: &str,
    ) -> Result<GroupEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_group");

        // Group and owner membership must exist together.
        let mut tx = self.pool.begin().await?;

        let policy_db: JoinPolicyDb = join_policy.into();
        let group = sqlx::query_as::<_, GroupEntity>(
            r#"
            INSERT INTO groups (name, description, join_policy)
            VALUES ($1, $2, $3)
            RETURNING group_id, name, description, join_policy, is_active, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(policy_db)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_email, role)
            VALUES ($1, $2, 'owner')
            "#,
        )
        .bind(group.group_id)
        .bind(creator_email)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(group)
    }

    /// Find an active group by ID.
    pub async fn find_by_id(&self, group_id: i32) -> Result<Option<GroupEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_group_by_id");
        let result = sqlx::query_as::<_, GroupEntity>(
            r#"
            SELECT group_id, name, description, join_policy, is_active, created_at, updated_at
            FROM groups
            WHERE group_id = $1 AND is_active = true
            "#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Check whether an active group with this name exists (case-insensitive),
    /// optionally excluding one group id.
    pub async fn name_exists(
        &self,
        name: &str,
        exclude_group_id: Option<i32>,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("check_group_name_exists");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM groups
                WHERE lower(name) = lower($1)
                  AND is_active = true
                  AND ($2::int IS NULL OR group_id != $2)
            )
            "#,
        )
        .bind(name)
        .bind(exclude_group_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List active groups the user is a member of, with member counts.
    pub async fn find_user_groups(
        &self,
        user_email: &str,
    ) -> Result<Vec<GroupWithCountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_groups");
        let result = sqlx::query_as::<_, GroupWithCountEntity>(
            r#"
            SELECT
                g.group_id, g.name, g.description, g.join_policy, g.is_active,
                g.created_at, g.updated_at,
                (SELECT COUNT(*) FROM group_members WHERE group_id = g.group_id) as member_count
            FROM groups g
            JOIN group_members gm ON g.group_id = gm.group_id
            WHERE gm.user_email = $1 AND g.is_active = true
            ORDER BY g.name
            "#,
        )
        .bind(user_email)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List all active groups with member counts.
    pub async fn list_active_groups(&self) -> Result<Vec<GroupWithCountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_active_groups");
        let result = sqlx::query_as::<_, GroupWithCountEntity>(
            r#"
            SELECT
                g.group_id, g.name, g.description, g.join_policy, g.is_active,
                g.created_at, g.updated_at,
                (SELECT COUNT(*) FROM group_members WHERE group_id = g.group_id) as member_count
            FROM groups g
            WHERE g.is_active = true
            ORDER BY g.name
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Group ids where the user has a membership or a pending application.
    pub async fn membership_group_ids(&self, user_email: &str) -> Result<Vec<i32>, sqlx::Error> {
        let timer = QueryTimer::new("membership_group_ids");
        let result = sqlx::query_scalar(
            r#"
            SELECT group_id FROM group_members WHERE user_email = $1
            "#,
        )
        .bind(user_email)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Group ids with a pending application from the user.
    pub async fn pending_application_group_ids(
        &self,
        user_email: &str,
    ) -> Result<Vec<i32>, sqlx::Error> {
        let timer = QueryTimer::new("pending_application_group_ids");
        let result = sqlx::query_scalar(
            r#"
            SELECT group_id FROM group_applications
            WHERE applicant_email = $1 AND status = 'pending'
            "#,
        )
        .bind(user_email)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Update a group.
    pub async fn update_group(
        &self,
        group_id: i32,
        name: Option<&str>,
        description: Option<&str>,
        join_policy: Option<JoinPolicy>,
    ) -> Result<GroupEntity, sqlx::Error> {
        let timer = QueryTimer::new("update_group");
        let policy_db: Option<JoinPolicyDb> = join_policy.map(Into::into);
        let result = sqlx::query_as::<_, GroupEntity>(
            r#"
            UPDATE groups
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                join_policy = COALESCE($4, join_policy),
                updated_at = NOW()
            WHERE group_id = $1 AND is_active = true
            RETURNING group_id, name, description, join_policy, is_active, created_at, updated_at
            "#,
        )
        .bind(group_id)
        .bind(name)
        .bind(description)
        .bind(policy_db)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Soft delete a group and remove its invitations and cave assignments.
    pub async fn soft_delete_group(&self, group_id: i32) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("soft_delete_group");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE groups
            SET is_active = false, updated_at = NOW()
            WHERE group_id = $1 AND is_active = true
            "#,
        )
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        // Invitations and assignments must not linger on an inactive group.
        sqlx::query("DELETE FROM group_invitations WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM group_caves WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.record();
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Memberships
    // =========================================================================

    /// Get a user's membership in a group.
    pub async fn get_membership(
        &self,
        group_id: i32,
        user_email: &str,
    ) -> Result<Option<GroupMemberEntity>, sqlx::Error> {
        let timer = QueryTimer::new("get_group_membership");
        let result = sqlx::query_as::<_, GroupMemberEntity>(
            r#"
            SELECT member_id, group_id, user_email, role, joined_at
            FROM group_members
            WHERE group_id = $1 AND user_email = $2
            "#,
        )
        .bind(group_id)
        .bind(user_email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List members of a group in join order.
    pub async fn list_members(&self, group_id: i32) -> Result<Vec<GroupMemberEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_group_members");
        let result = sqlx::query_as::<_, GroupMemberEntity>(
            r#"
            SELECT member_id, group_id, user_email, role, joined_at
            FROM group_members
            WHERE group_id = $1
            ORDER BY joined_at ASC, member_id ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Add a member to a group.
    pub async fn add_member(
        &self,
        group_id: i32,
        user_email: &str,
        role: MemberRole,
    ) -> Result<GroupMemberEntity, sqlx::Error> {
        let timer = QueryTimer::new("add_group_member");
        let role_db: MemberRoleDb = role.into();
        let result = sqlx::query_as::<_, GroupMemberEntity>(
            r#"
            INSERT INTO group_members (group_id, user_email, role)
            VALUES ($1, $2, $3)
            RETURNING member_id, group_id, user_email, role, joined_at
            "#,
        )
        .bind(group_id)
        .bind(user_email)
        .bind(role_db)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Update a member's role.
    pub async fn update_member_role(
        &self,
        group_id: i32,
        user_email: &str,
        new_role: MemberRole,
    ) -> Result<GroupMemberEntity, sqlx::Error> {
        let timer = QueryTimer::new("update_member_role");
        let role_db: MemberRoleDb = new_role.into();
        let result = sqlx::query_as::<_, GroupMemberEntity>(
            r#"
            UPDATE group_members
            SET role = $3
            WHERE group_id = $1 AND user_email = $2
            RETURNING member_id, group_id, user_email, role, joined_at
            "#,
        )
        .bind(group_id)
        .bind(user_email)
        .bind(role_db)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Transfer group ownership atomically: the new owner is promoted first,
    /// then the previous owner becomes admin, so the group never lacks an
    /// owner mid-flight.
    pub async fn transfer_group_ownership(
        &self,
        group_id: i32,
        current_owner_email: &str,
        new_owner_email: &str,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("transfer_group_ownership");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE group_members SET role = 'owner'
            WHERE group_id = $1 AND user_email = $2
            "#,
        )
        .bind(group_id)
        .bind(new_owner_email)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE group_members SET role = 'admin'
            WHERE group_id = $1 AND user_email = $2
            "#,
        )
        .bind(group_id)
        .bind(current_owner_email)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(())
    }

    /// Remove a member from a group.
    pub async fn remove_member(&self, group_id: i32, user_email: &str) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("remove_group_member");
        let result = sqlx::query(
            r#"
            DELETE FROM group_members WHERE group_id = $1 AND user_email = $2
            "#,
        )
        .bind(group_id)
        .bind(user_email)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Invitations
    // =========================================================================

    /// Create a pending invitation.
    pub async fn create_invitation(
        &self,
        group_id: i32,
        inviter_email: &str,
        invitee_email: &str,
        role: MemberRole,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<GroupInvitationEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_group_invitation");
        let role_db: MemberRoleDb = role.into();
        let result = sqlx::query_as::<_, GroupInvitationEntity>(
            r#"
            INSERT INTO group_invitations (group_id, inviter_email, invitee_email, role, status, expires_at)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING invitation_id, group_id, inviter_email, invitee_email, role, status, created_at, expires_at, responded_at
            "#,
        )
        .bind(group_id)
        .bind(inviter_email)
        .bind(invitee_email)
        .bind(role_db)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an invitation by ID.
    pub async fn find_invitation(
        &self,
        invitation_id: i32,
    ) -> Result<Option<GroupInvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_group_invitation");
        let result = sqlx::query_as::<_, GroupInvitationEntity>(
            r#"
            SELECT invitation_id, group_id, inviter_email, invitee_email, role, status, created_at, expires_at, responded_at
            FROM group_invitations
            WHERE invitation_id = $1
            "#,
        )
        .bind(invitation_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List pending invitations addressed to a user.
    pub async fn list_user_invitations(
        &self,
        invitee_email: &str,
    ) -> Result<Vec<GroupInvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_user_invitations");
        let result = sqlx::query_as::<_, GroupInvitationEntity>(
            r#"
            SELECT invitation_id, group_id, inviter_email, invitee_email, role, status, created_at, expires_at, responded_at
            FROM group_invitations
            WHERE invitee_email = $1 AND status = 'pending'
            ORDER BY created_at DESC
            "#,
        )
        .bind(invitee_email)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Record a response to an invitation.
    pub async fn respond_invitation(
        &self,
        invitation_id: i32,
        status: InvitationStatus,
    ) -> Result<GroupInvitationEntity, sqlx::Error> {
        let timer = QueryTimer::new("respond_group_invitation");
        let status_db = match status {
            InvitationStatus::Pending => InvitationStatusDb::Pending,
            InvitationStatus::Accepted => InvitationStatusDb::Accepted,
            InvitationStatus::Declined => InvitationStatusDb::Declined,
            InvitationStatus::Expired => InvitationStatusDb::Expired,
        };
        let result = sqlx::query_as::<_, GroupInvitationEntity>(
            r#"
            UPDATE group_invitations
            SET status = $2, responded_at = NOW()
            WHERE invitation_id = $1
            RETURNING invitation_id, group_id, inviter_email, invitee_email, role, status, created_at, expires_at, responded_at
            "#,
        )
        .bind(invitation_id)
        .bind(status_db)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    // =========================================================================
    // Applications
    // =========================================================================

    /// Create a pending application.
    pub async fn create_application(
        &self,
        group_id: i32,
        applicant_email: &str,
        message: Option<&str>,
    ) -> Result<GroupApplicationEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_group_application");
        let result = sqlx::query_as::<_, GroupApplicationEntity>(
            r#"
            INSERT INTO group_applications (group_id, applicant_email, message, status)
            VALUES ($1, $2, $3, 'pending')
            RETURNING application_id, group_id, applicant_email, message, status, created_at, reviewed_at, reviewed_by
            "#,
        )
        .bind(group_id)
        .bind(applicant_email)
        .bind(message)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find an application by ID.
    pub async fn find_application(
        &self,
        application_id: i32,
    ) -> Result<Option<GroupApplicationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_group_application");
        let result = sqlx::query_as::<_, GroupApplicationEntity>(
            r#"
            SELECT application_id, group_id, applicant_email, message, status, created_at, reviewed_at, reviewed_by
            FROM group_applications
            WHERE application_id = $1
            "#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List pending applications for a group.
    pub async fn list_pending_applications(
        &self,
        group_id: i32,
    ) -> Result<Vec<GroupApplicationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_pending_applications");
        let result = sqlx::query_as::<_, GroupApplicationEntity>(
            r#"
            SELECT application_id, group_id, applicant_email, message, status, created_at, reviewed_at, reviewed_by
            FROM group_applications
            WHERE group_id = $1 AND status = 'pending'
            ORDER BY created_at ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Record a review decision on an application.
    pub async fn review_application(
        &self,
        application_id: i32,
        status: ApplicationStatus,
        reviewed_by: &str,
    ) -> Result<GroupApplicationEntity, sqlx::Error> {
        let timer = QueryTimer::new("review_group_application");
        let status_db = match status {
            ApplicationStatus::Pending => ApplicationStatusDb::Pending,
            ApplicationStatus::Approved => ApplicationStatusDb::Approved,
            ApplicationStatus::Rejected => ApplicationStatusDb::Rejected,
        };
        let result = sqlx::query_as::<_, GroupApplicationEntity>(
            r#"
            UPDATE group_applications
            SET status = $2, reviewed_by = $3, reviewed_at = NOW()
            WHERE application_id = $1
            RETURNING application_id, group_id, applicant_email, message, status, created_at, reviewed_at, reviewed_by
            "#,
        )
        .bind(application_id)
        .bind(status_db)
        .bind(reviewed_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    // =========================================================================
    // Cave assignments
    // =========================================================================

    /// Assign a cave to a group.
    pub async fn assign_cave(
        &self,
        group_id: i32,
        cave_id: i32,
        assigned_by: &str,
    ) -> Result<GroupCaveEntity, sqlx::Error> {
        let timer = QueryTimer::new("assign_cave");
        let result = sqlx::query_as::<_, GroupCaveEntity>(
            r#"
            INSERT INTO group_caves (group_id, cave_id, assigned_by)
            VALUES ($1, $2, $3)
            RETURNING id, group_id, cave_id, assigned_by, assigned_at
            "#,
        )
        .bind(group_id)
        .bind(cave_id)
        .bind(assigned_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find the assignment for a cave, if any. At most one by invariant.
    pub async fn find_assignment_by_cave(
        &self,
        cave_id: i32,
    ) -> Result<Option<GroupCaveEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_assignment_by_cave");
        let result = sqlx::query_as::<_, GroupCaveEntity>(
            r#"
            SELECT id, group_id, cave_id, assigned_by, assigned_at
            FROM group_caves
            WHERE cave_id = $1
            "#,
        )
        .bind(cave_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List cave assignments for a group, newest first.
    pub async fn list_group_assignments(
        &self,
        group_id: i32,
    ) -> Result<Vec<GroupCaveEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_group_assignments");
        let result = sqlx::query_as::<_, GroupCaveEntity>(
            r#"
            SELECT id, group_id, cave_id, assigned_by, assigned_at
            FROM group_caves
            WHERE group_id = $1
            ORDER BY assigned_at DESC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Remove a cave from a group.
    pub async fn unassign_cave(&self, group_id: i32, cave_id: i32) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("unassign_cave");
        let result = sqlx::query(
            r#"
            DELETE FROM group_caves WHERE group_id = $1 AND cave_id = $2
            "#,
        )
        .bind(group_id)
        .bind(cave_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Remove every assignment referencing a cave. Idempotent: deleting
    /// assignments that are already gone affects zero rows and succeeds,
    /// which is what a redelivered `cave.deleted` event needs.
    pub async fn delete_assignments_for_cave(&self, cave_id: i32) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_assignments_for_cave");
        let result = sqlx::query(
            r#"
            DELETE FROM group_caves WHERE cave_id = $1
            "#,
        )
        .bind(cave_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Inheritance
    // =========================================================================

    /// Members of every active group the cave is assigned to, excluding the
    /// departing owner. This is the candidate snapshot fed to
    /// `resolve_cave_owner`.
    pub async fn inheritance_candidates(
        &self,
        cave_id: i32,
        current_owner_email: &str,
    ) -> Result<Vec<CandidateMember>, sqlx::Error> {
        let timer = QueryTimer::new("inheritance_candidates");
        let rows = sqlx::query_as::<_, GroupMemberEntity>(
            r#"
            SELECT gm.member_id, gm.group_id, gm.user_email, gm.role, gm.joined_at
            FROM group_members gm
            JOIN group_caves gc ON gm.group_id = gc.group_id
            JOIN groups g ON g.group_id = gm.group_id
            WHERE gc.cave_id = $1
              AND g.is_active = true
              AND gm.user_email != $2
            ORDER BY gm.joined_at ASC, gm.member_id ASC
            "#,
        )
        .bind(cave_id)
        .bind(current_owner_email)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        Ok(rows?.into_iter().map(Into::into).collect())
    }

    /// Run the full user-deletion cascade in one transaction.
    ///
    /// For every active group owned by the user: promote a successor
    /// (earliest-joined admin, else earliest-joined member) or delete the
    /// group outright when nobody remains. Then drop all of the user's
    /// memberships and reattribute their cave assignments to the system
    /// identity. Any failure rolls the whole event back.
    ///
    /// Concurrent deletions of two owners sharing a group are serialized
    /// only by row-level locks here; see DESIGN.md for the open question.
    pub async fn handle_user_deletion(
        &self,
        user_email: &str,
    ) -> Result<UserDeletionOutcome, sqlx::Error> {
        let timer = QueryTimer::new("handle_user_deletion");
        let mut outcome = UserDeletionOutcome::default();

        let mut tx = self.pool.begin().await?;

        let owned_groups = sqlx::query_as::<_, GroupEntity>(
            r#"
            SELECT g.group_id, g.name, g.description, g.join_policy, g.is_active, g.created_at, g.updated_at
            FROM groups g
            JOIN group_members gm ON g.group_id = gm.group_id
            WHERE gm.user_email = $1 AND gm.role = 'owner' AND g.is_active = true
            ORDER BY g.group_id
            FOR UPDATE OF g
            "#,
        )
        .bind(user_email)
        .fetch_all(&mut *tx)
        .await?;

        info!(
            user_email = user_email,
            owned_groups = owned_groups.len(),
            "Resolving group ownership for deleted user"
        );

        for group in &owned_groups {
            let transferred =
                Self::transfer_or_delete_group(&mut tx, group.group_id, user_email).await?;
            if transferred {
                outcome.groups_transferred += 1;
            } else {
                outcome.groups_deleted += 1;
            }
        }

        let removed = sqlx::query("DELETE FROM group_members WHERE user_email = $1")
            .bind(user_email)
            .execute(&mut *tx)
            .await?;
        outcome.memberships_removed = removed.rows_affected();

        // Assignment records survive; only the dangling attribution changes.
        let reattributed = sqlx::query(
            r#"
            UPDATE group_caves SET assigned_by = $2 WHERE assigned_by = $1
            "#,
        )
        .bind(user_email)
        .bind(SYSTEM_IDENTITY)
        .execute(&mut *tx)
        .await?;
        outcome.assignments_reattributed = reattributed.rows_affected();

        tx.commit().await?;
        timer.record();

        info!(
            user_email = user_email,
            transferred = outcome.groups_transferred,
            deleted = outcome.groups_deleted,
            memberships_removed = outcome.memberships_removed,
            assignments_reattributed = outcome.assignments_reattributed,
            "User deletion cascade committed"
        );
        Ok(outcome)
    }

    /// Promote a successor in one group, or hard-delete the group when no
    /// members remain. Returns true when ownership was transferred.
    async fn transfer_or_delete_group(
        tx: &mut Transaction<'_, Postgres>,
        group_id: i32,
        old_owner_email: &str,
    ) -> Result<bool, sqlx::Error> {
        let members = sqlx::query_as::<_, GroupMemberEntity>(
            r#"
            SELECT member_id, group_id, user_email, role, joined_at
            FROM group_members
            WHERE group_id = $1 AND user_email != $2
            ORDER BY joined_at ASC, member_id ASC
            "#,
        )
        .bind(group_id)
        .bind(old_owner_email)
        .fetch_all(&mut **tx)
        .await?;

        let candidates: Vec<CandidateMember> = members.into_iter().map(Into::into).collect();

        match select_group_successor(&candidates) {
            None => {
                // Hard delete: memberships, invitations, applications and
                // assignments go with the group via FK cascade.
                sqlx::query("DELETE FROM groups WHERE group_id = $1")
                    .bind(group_id)
                    .execute(&mut **tx)
                    .await?;
                info!(group_id = group_id, "Deleted group with no remaining members");
                Ok(false)
            }
            Some(successor) => {
                sqlx::query(
                    r#"
                    UPDATE group_members SET role = 'owner' WHERE member_id = $1
                    "#,
                )
                .bind(successor.member_id)
                .execute(&mut **tx)
                .await?;
                info!(
                    group_id = group_id,
                    new_owner = %successor.user_email,
                    previous_role = %successor.role,
                    "Transferred group ownership"
                );
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // Note: GroupRepository tests require a database connection and are
    // covered by integration tests. The successor and ranking logic it
    // delegates to is unit-tested in domain::services::inheritance.
}
