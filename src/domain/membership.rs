//! Channel membership verdicts.
//!
//! The platform reports a user's standing in the required channel as one of
//! a fixed set of statuses; only three of them count as membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's standing in a chat, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    /// Whether this status entitles the user to interact with the bot.
    pub fn is_member(self) -> bool {
        matches!(
            self,
            MemberStatus::Creator | MemberStatus::Administrator | MemberStatus::Member
        )
    }
}

/// Cached membership verdict for one user.
///
/// A verdict older than the gate's TTL must not be trusted without
/// re-verification, except when overwritten by a push update.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MembershipRecord {
    /// When the verdict was last obtained from an authoritative source.
    pub checked_at: DateTime<Utc>,
    /// The verdict itself.
    pub is_member: bool,
}
