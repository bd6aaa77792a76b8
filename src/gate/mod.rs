//! The membership gate - cached channel-membership verdicts.
//!
//! Every user-facing operation first passes through the gate, which decides
//! whether the user currently belongs to the required channel. Verdicts are
//! cached with a freshness TTL so the platform is not asked on every
//! message; membership-change events pushed by the platform overwrite the
//! cache immediately.
//!
//! Lookup failures are treated as "not a member" and cached like any other
//! verdict. A failing platform dependency therefore locks users out until
//! the TTL elapses or a forced recheck succeeds, instead of being hammered
//! with retries on every message.

use std::sync::Arc;

use dashmap::DashMap;
use metrics::counter;

use crate::domain::membership::{MemberStatus, MembershipRecord};
use crate::domain::request::{ChatId, UserId};
use crate::gateway::ChatGateway;

/// Cached membership decisions for the required channel.
pub struct MembershipGate<G: ChatGateway> {
    gateway: Arc<G>,
    channel: ChatId,
    ttl: chrono::Duration,
    cache: DashMap<UserId, MembershipRecord>,
}

impl<G: ChatGateway> MembershipGate<G> {
    /// Create a gate for the given required channel.
    pub fn new(gateway: Arc<G>, channel: ChatId, ttl: chrono::Duration) -> Self {
        Self {
            gateway,
            channel,
            ttl,
            cache: DashMap::new(),
        }
    }

    /// Whether the user may interact with the bot.
    ///
    /// Returns the cached verdict when it is younger than the TTL and no
    /// forced recheck was requested; otherwise performs an authoritative
    /// lookup through the gateway. No cache lock is held across the lookup.
    pub async fn is_member(&self, user: UserId, force: bool) -> bool {
        if !force {
            // The dashmap guard is dropped before any await point.
            if let Some(record) = self.cache.get(&user) {
                let age = chrono::Utc::now() - record.checked_at;
                if age < self.ttl {
                    tracing::debug!(
                        user = %user,
                        is_member = record.is_member,
                        age_secs = age.num_seconds(),
                        "Membership verdict served from cache"
                    );
                    return record.is_member;
                }
            }
        }

        let verdict = match self.gateway.member_status(self.channel, user).await {
            Ok(status) => status.is_member(),
            Err(e) => {
                // Fail closed, and cache the verdict so a failing platform
                // is not re-queried on every message.
                counter!("triage_membership_lookup_failed_total").increment(1);
                tracing::error!(user = %user, error = %e, "Membership lookup failed");
                false
            }
        };

        self.cache.insert(
            user,
            MembershipRecord {
                checked_at: chrono::Utc::now(),
                is_member: verdict,
            },
        );

        tracing::info!(user = %user, is_member = verdict, forced = force, "Membership verified");

        verdict
    }

    /// Apply a membership-change event pushed by the platform.
    ///
    /// Push updates are authoritative and fresher than any poll: the record
    /// is overwritten unconditionally, bypassing TTL logic.
    pub fn apply_change(&self, user: UserId, status: MemberStatus) {
        let verdict = status.is_member();
        self.cache.insert(
            user,
            MembershipRecord {
                checked_at: chrono::Utc::now(),
                is_member: verdict,
            },
        );
        tracing::info!(user = %user, is_member = verdict, "Membership updated from platform event");
    }
}
