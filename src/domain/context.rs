//! Admin follow-up expectations.
//!
//! When an admin picks an action that needs a second message (the file
//! itself, or a typed rejection reason), the bot must remember which
//! request that next message belongs to. The expectation is a single
//! tagged value per admin, never a set of independent flags, so an admin
//! can only ever owe one artifact at a time.

use serde::{Deserialize, Serialize};

use super::request::RequestId;

/// The single outstanding follow-up owed by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdminExpectation {
    /// The admin's next document/video fulfills the request directly.
    AwaitingFile { request: RequestId },
    /// The admin's next document/video is published to the requests channel.
    AwaitingChannelPost { request: RequestId },
    /// The admin's next text message is the rejection reason.
    AwaitingReason { request: RequestId },
}

impl AdminExpectation {
    /// The request this expectation will resolve.
    pub fn request(&self) -> RequestId {
        match self {
            AdminExpectation::AwaitingFile { request }
            | AdminExpectation::AwaitingChannelPost { request }
            | AdminExpectation::AwaitingReason { request } => *request,
        }
    }

    /// Whether the expectation is satisfied by a document/video upload.
    pub fn wants_artifact(&self) -> bool {
        matches!(
            self,
            AdminExpectation::AwaitingFile { .. } | AdminExpectation::AwaitingChannelPost { .. }
        )
    }

    /// Whether the expectation is satisfied by a plain text message.
    pub fn wants_text(&self) -> bool {
        matches!(self, AdminExpectation::AwaitingReason { .. })
    }
}
