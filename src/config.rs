//! Configuration for the triage core.

use std::collections::HashSet;

use crate::domain::request::{AdminId, ChatId};

/// Configuration values the core depends on.
///
/// The embedding application decides where these come from (environment,
/// config file); the core only consumes the values.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BotConfig {
    /// Identities allowed to triage requests.
    pub admin_ids: HashSet<AdminId>,

    /// Channel a user must belong to before interacting with the bot.
    pub required_channel: ChatId,

    /// Public username of the requests channel (without the leading `@`),
    /// used to build join prompts and post links.
    pub channel_name: String,

    /// How long a cached membership verdict stays trustworthy, in seconds.
    pub membership_ttl_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            admin_ids: HashSet::new(),
            required_channel: ChatId(0),
            channel_name: String::new(),
            membership_ttl_secs: 3600, // Re-verify membership every hour
        }
    }
}

impl BotConfig {
    /// Whether an identity belongs to the configured admin set.
    pub fn is_admin(&self, admin: AdminId) -> bool {
        self.admin_ids.contains(&admin)
    }

    /// The membership TTL as a chrono duration.
    pub fn membership_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.membership_ttl_secs as i64)
    }
}
