//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod cave;
pub mod group;
pub mod media;

pub use cave::{CaveEntity, CaveEntranceEntity};
pub use group::{
    ApplicationStatusDb, GroupApplicationEntity, GroupCaveEntity, GroupEntity,
    GroupInvitationEntity, GroupMemberEntity, GroupWithCountEntity, InvitationStatusDb,
    JoinPolicyDb, MemberRoleDb,
};
pub use media::MediaFileEntity;
