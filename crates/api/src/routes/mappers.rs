//! Mapping functions from entities to response DTOs.
//!
//! One mapper per response contract keeps handler logic and serialization
//! shape independently testable.

use std::collections::HashMap;

use domain::models::group::{
    CaveAssignmentResponse, GroupDetail, GroupPublic, GroupSummary, MemberResponse,
};

use crate::app::GroupState;
use crate::clients::cave_service::cave_name_fallback;
use crate::clients::user_service::username_or_fallback;
use crate::error::ApiError;
use persistence::entities::{GroupCaveEntity, GroupEntity, GroupMemberEntity, GroupWithCountEntity};

/// Full group detail: members and assignments enriched with usernames from
/// the user service and cave names from the cave service, degrading to the
/// email local part and a placeholder name respectively.
pub async fn group_detail(state: &GroupState, group: GroupEntity) -> Result<GroupDetail, ApiError> {
    let members = state.repo.list_members(group.group_id).await?;
    let assignments = state.repo.list_group_assignments(group.group_id).await?;

    let mut emails: Vec<String> = members.iter().map(|m| m.user_email.clone()).collect();
    for assignment in &assignments {
        if !emails.contains(&assignment.assigned_by) {
            emails.push(assignment.assigned_by.clone());
        }
    }
    let usernames = state.user_client.lookup_usernames(&emails).await;

    let mut caves = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let cave_name = match state.cave_client.get_cave(assignment.cave_id).await {
            Some(cave) => cave.name,
            None => cave_name_fallback(assignment.cave_id),
        };
        caves.push(assignment_response(assignment, cave_name, &usernames));
    }

    Ok(GroupDetail {
        group_id: group.group_id,
        name: group.name,
        description: group.description,
        join_policy: group.join_policy.into(),
        is_active: group.is_active,
        created_at: group.created_at,
        updated_at: group.updated_at,
        members: members
            .into_iter()
            .map(|m| member_response(m, &usernames))
            .collect(),
        caves,
    })
}

pub fn member_response(
    member: GroupMemberEntity,
    usernames: &HashMap<String, String>,
) -> MemberResponse {
    let username = username_or_fallback(usernames, &member.user_email);
    MemberResponse {
        member_id: member.member_id,
        user_email: member.user_email,
        username,
        role: member.role.into(),
        joined_at: member.joined_at,
    }
}

pub fn assignment_response(
    assignment: GroupCaveEntity,
    cave_name: String,
    usernames: &HashMap<String, String>,
) -> CaveAssignmentResponse {
    let assigned_by = username_or_fallback(usernames, &assignment.assigned_by);
    CaveAssignmentResponse {
        id: assignment.id,
        group_id: assignment.group_id,
        cave_id: assignment.cave_id,
        cave_name,
        assigned_by,
        assigned_at: assignment.assigned_at,
    }
}

pub fn group_summary(group: GroupWithCountEntity) -> GroupSummary {
    GroupSummary {
        group_id: group.group_id,
        name: group.name,
        description: group.description,
        join_policy: group.join_policy.into(),
        member_count: group.member_count,
        created_at: group.created_at,
    }
}

pub fn group_public(
    group: GroupWithCountEntity,
    member_of: &[i32],
    applied_to: &[i32],
) -> GroupPublic {
    GroupPublic {
        is_member: member_of.contains(&group.group_id),
        has_pending_application: applied_to.contains(&group.group_id),
        group_id: group.group_id,
        name: group.name,
        description: group.description,
        join_policy: group.join_policy.into(),
        member_count: group.member_count,
        created_at: group.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::models::group::MemberRole;
    use persistence::entities::{JoinPolicyDb, MemberRoleDb};

    fn member(email: &str) -> GroupMemberEntity {
        GroupMemberEntity {
            member_id: 1,
            group_id: 2,
            user_email: email.to_string(),
            role: MemberRoleDb::Admin,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn test_member_response_uses_lookup_then_falls_back() {
        let mut usernames = HashMap::new();
        usernames.insert("a@x.com".to_string(), "Ada".to_string());

        let enriched = member_response(member("a@x.com"), &usernames);
        assert_eq!(enriched.username, "Ada");
        assert_eq!(enriched.role, MemberRole::Admin);

        let fallback = member_response(member("b@x.com"), &usernames);
        assert_eq!(fallback.username, "b");
    }

    #[test]
    fn test_group_public_flags() {
        let group = GroupWithCountEntity {
            group_id: 9,
            name: "Karst".to_string(),
            description: None,
            join_policy: JoinPolicyDb::Open,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            member_count: 4,
        };
        let public = group_public(group, &[9], &[]);
        assert!(public.is_member);
        assert!(!public.has_pending_application);
        assert_eq!(public.member_count, 4);
    }
}
