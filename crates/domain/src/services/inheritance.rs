//! Ownership inheritance resolution.
//!
//! Two pure decision functions over a membership snapshot:
//!
//! - [`resolve_cave_owner`] picks the member a cave passes to when its
//!   current owner disappears, or decides the cave should be deleted.
//! - [`select_group_successor`] picks the member promoted to OWNER of a
//!   group whose owner was deleted.
//!
//! Both are deterministic over their input. Callers gather the snapshot
//! (and apply the resulting mutations) inside their own transaction scope.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::group::MemberRole;

/// A group member considered for inheritance, minus the departing owner.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMember {
    pub member_id: i32,
    pub user_email: String,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Outcome of a cave ownership resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnershipDecision {
    /// Transfer the cave to this member's email.
    Transfer { inherit_email: String },
    /// Nobody qualifies; delete the cave.
    Delete,
}

/// Wire form of an [`OwnershipDecision`], served by the inheritance endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InheritanceResponse {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherit_email: Option<String>,
}

impl From<OwnershipDecision> for InheritanceResponse {
    fn from(decision: OwnershipDecision) -> Self {
        match decision {
            OwnershipDecision::Transfer { inherit_email } => InheritanceResponse {
                action: "transfer",
                inherit_email: Some(inherit_email),
            },
            OwnershipDecision::Delete => InheritanceResponse {
                action: "delete",
                inherit_email: None,
            },
        }
    }
}

/// Decide who inherits a cave whose owner is being removed.
///
/// `candidates` is the union of members across every group the cave is
/// assigned to (at most one group by invariant, but the union tolerates
/// more), already excluding the departing owner.
///
/// Ranking is a strict total order: role priority (owner > admin > member)
/// first, then `joined_at` ascending, then `member_id` ascending. Two
/// members can share a join timestamp, so a deterministic last key is
/// required; lowest row id is the one we settled on (open question:
/// whether a more meaningful tie-break exists).
pub fn resolve_cave_owner(candidates: &[CandidateMember]) -> OwnershipDecision {
    let winner = candidates.iter().min_by(|a, b| {
        b.role
            .priority()
            .cmp(&a.role.priority())
            .then_with(|| a.joined_at.cmp(&b.joined_at))
            .then_with(|| a.member_id.cmp(&b.member_id))
    });

    match winner {
        Some(member) => OwnershipDecision::Transfer {
            inherit_email: member.user_email.clone(),
        },
        None => OwnershipDecision::Delete,
    }
}

/// Pick the member promoted to OWNER of a group whose owner was deleted.
///
/// Preference order: the earliest-joined ADMIN, otherwise the earliest-joined
/// member of any role. Returns `None` when the group has no members left,
/// in which case the group itself is deleted.
///
/// `members` must already exclude the deleted owner. Ordering of the input
/// does not matter; ties on `joined_at` fall back to `member_id`.
pub fn select_group_successor(members: &[CandidateMember]) -> Option<&CandidateMember> {
    let join_order = |a: &&CandidateMember, b: &&CandidateMember| {
        a.joined_at
            .cmp(&b.joined_at)
            .then_with(|| a.member_id.cmp(&b.member_id))
    };

    members
        .iter()
        .filter(|m| m.role == MemberRole::Admin)
        .min_by(join_order)
        .or_else(|| members.iter().min_by(join_order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(member_id: i32, email: &str, role: MemberRole, joined_secs: i64) -> CandidateMember {
        CandidateMember {
            member_id,
            user_email: email.to_string(),
            role,
            joined_at: Utc.timestamp_opt(joined_secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_empty_candidates_means_delete() {
        assert_eq!(resolve_cave_owner(&[]), OwnershipDecision::Delete);
    }

    #[test]
    fn test_any_candidate_means_transfer_never_delete() {
        let candidates = vec![candidate(1, "m@x.com", MemberRole::Member, 100)];
        match resolve_cave_owner(&candidates) {
            OwnershipDecision::Transfer { inherit_email } => {
                assert_eq!(inherit_email, "m@x.com");
            }
            OwnershipDecision::Delete => panic!("non-empty candidate set must transfer"),
        }
    }

    #[test]
    fn test_role_priority_beats_tenure() {
        // The member joined earliest, but the earlier of the two admins wins.
        let candidates = vec![
            candidate(1, "a@x.com", MemberRole::Member, 2),
            candidate(2, "b@x.com", MemberRole::Admin, 5),
            candidate(3, "c@x.com", MemberRole::Admin, 3),
        ];
        assert_eq!(
            resolve_cave_owner(&candidates),
            OwnershipDecision::Transfer {
                inherit_email: "c@x.com".to_string()
            }
        );
    }

    #[test]
    fn test_owner_of_another_group_outranks_admin() {
        let candidates = vec![
            candidate(1, "admin@x.com", MemberRole::Admin, 1),
            candidate(2, "owner@x.com", MemberRole::Owner, 50),
        ];
        assert_eq!(
            resolve_cave_owner(&candidates),
            OwnershipDecision::Transfer {
                inherit_email: "owner@x.com".to_string()
            }
        );
    }

    #[test]
    fn test_equal_roles_earliest_join_wins() {
        let candidates = vec![
            candidate(9, "late@x.com", MemberRole::Member, 200),
            candidate(4, "early@x.com", MemberRole::Member, 100),
        ];
        assert_eq!(
            resolve_cave_owner(&candidates),
            OwnershipDecision::Transfer {
                inherit_email: "early@x.com".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_joined_at_breaks_tie_by_member_id() {
        let candidates = vec![
            candidate(12, "second@x.com", MemberRole::Member, 100),
            candidate(7, "first@x.com", MemberRole::Member, 100),
        ];
        assert_eq!(
            resolve_cave_owner(&candidates),
            OwnershipDecision::Transfer {
                inherit_email: "first@x.com".to_string()
            }
        );
    }

    #[test]
    fn test_resolution_is_deterministic_under_input_order() {
        let mut candidates = vec![
            candidate(1, "a@x.com", MemberRole::Member, 2),
            candidate(2, "b@x.com", MemberRole::Admin, 5),
            candidate(3, "c@x.com", MemberRole::Admin, 3),
            candidate(4, "d@x.com", MemberRole::Member, 1),
        ];
        let expected = resolve_cave_owner(&candidates);
        candidates.reverse();
        assert_eq!(resolve_cave_owner(&candidates), expected);
        candidates.swap(0, 2);
        assert_eq!(resolve_cave_owner(&candidates), expected);
    }

    #[test]
    fn test_successor_none_when_no_members_remain() {
        assert!(select_group_successor(&[]).is_none());
    }

    #[test]
    fn test_successor_prefers_admin_over_longer_tenured_member() {
        let members = vec![
            candidate(1, "m1@x.com", MemberRole::Member, 1),
            candidate(2, "m2@x.com", MemberRole::Admin, 10),
        ];
        let successor = select_group_successor(&members).unwrap();
        assert_eq!(successor.user_email, "m2@x.com");
    }

    #[test]
    fn test_successor_earliest_admin_among_admins() {
        let members = vec![
            candidate(1, "late-admin@x.com", MemberRole::Admin, 30),
            candidate(2, "early-admin@x.com", MemberRole::Admin, 10),
            candidate(3, "m@x.com", MemberRole::Member, 1),
        ];
        let successor = select_group_successor(&members).unwrap();
        assert_eq!(successor.user_email, "early-admin@x.com");
    }

    #[test]
    fn test_successor_falls_back_to_first_member_in_join_order() {
        let members = vec![
            candidate(5, "late@x.com", MemberRole::Member, 40),
            candidate(6, "early@x.com", MemberRole::Member, 20),
        ];
        let successor = select_group_successor(&members).unwrap();
        assert_eq!(successor.user_email, "early@x.com");
    }

    #[test]
    fn test_inheritance_response_wire_shape() {
        let transfer: InheritanceResponse = OwnershipDecision::Transfer {
            inherit_email: "heir@x.com".to_string(),
        }
        .into();
        let value = serde_json::to_value(&transfer).unwrap();
        assert_eq!(value["action"], "transfer");
        assert_eq!(value["inherit_email"], "heir@x.com");

        let delete: InheritanceResponse = OwnershipDecision::Delete.into();
        let value = serde_json::to_value(&delete).unwrap();
        assert_eq!(value["action"], "delete");
        assert!(value.get("inherit_email").is_none());
    }
}
