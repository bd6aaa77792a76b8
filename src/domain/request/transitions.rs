//! State transitions for file requests using the typestate pattern.
//!
//! Each moderation state is a distinct type parameter on `Request<State>`,
//! so only the legal edges of the lifecycle exist as methods:
//!
//! ```text
//! Request<Pending> ──approve()──> Request<Approved> ──fulfill()──> Request<Completed>
//!       │                               │
//!       │                               └──publish()──> Request<PostedToChannel>
//!       └──reject()───> Request<Rejected>
//!                               │
//!                               └──explain()──> Request<RejectedWithReason>
//! ```
//!
//! All five non-pending states are terminal; no edge returns to pending and
//! none crosses between the approved and rejected branches.
//!
//! Transitions are pure: they consume one typed state and return the next.
//! The ledger applies them under its own lock, so two racing transitions on
//! the same request serialize and exactly one observes a legal edge.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::{
    AdminId, AnyRequest, Approved, Completed, Pending, PostedToChannel, Rejected,
    RejectedWithReason, Request,
};

/// An admin-triggered transition on a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TriageAction {
    /// Pending -> Approved
    Approve { admin: AdminId },
    /// Pending -> Rejected
    Reject { admin: AdminId },
    /// Approved -> Completed (file sent directly to the requester)
    Fulfill { admin: AdminId },
    /// Approved -> PostedToChannel (file published to the requests channel)
    Publish { admin: AdminId },
    /// Rejected -> RejectedWithReason
    Explain { admin: AdminId, reason: String },
}

impl fmt::Display for TriageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriageAction::Approve { .. } => "approve",
            TriageAction::Reject { .. } => "reject",
            TriageAction::Fulfill { .. } => "fulfill",
            TriageAction::Publish { .. } => "publish",
            TriageAction::Explain { .. } => "explain",
        };
        f.write_str(s)
    }
}

impl Request<Pending> {
    pub fn approve(self, admin: AdminId) -> Request<Approved> {
        Request {
            data: self.data,
            state: Approved {
                approved_by: admin,
                approved_at: chrono::Utc::now(),
            },
        }
    }

    pub fn reject(self, admin: AdminId) -> Request<Rejected> {
        Request {
            data: self.data,
            state: Rejected {
                rejected_by: admin,
                rejected_at: chrono::Utc::now(),
            },
        }
    }
}

impl Request<Approved> {
    pub fn fulfill(self, admin: AdminId) -> Request<Completed> {
        Request {
            data: self.data,
            state: Completed {
                approved_at: self.state.approved_at, // Carry over triage timestamp
                fulfilled_by: admin,
                completed_at: chrono::Utc::now(),
            },
        }
    }

    pub fn publish(self, admin: AdminId) -> Request<PostedToChannel> {
        Request {
            data: self.data,
            state: PostedToChannel {
                approved_at: self.state.approved_at, // Carry over triage timestamp
                posted_by: admin,
                posted_at: chrono::Utc::now(),
            },
        }
    }
}

impl Request<Rejected> {
    pub fn explain(self, admin: AdminId, reason: String) -> Request<RejectedWithReason> {
        Request {
            data: self.data,
            state: RejectedWithReason {
                rejected_at: self.state.rejected_at, // Carry over triage timestamp
                explained_by: admin,
                explained_at: chrono::Utc::now(),
                reason,
            },
        }
    }
}

impl AnyRequest {
    /// Apply an action to a request in an arbitrary state.
    ///
    /// Returns the transitioned request if the action is a legal edge from
    /// the current state, and gives the request back untouched otherwise so
    /// the caller can restore it and report the illegal edge.
    pub fn apply(self, action: &TriageAction) -> std::result::Result<AnyRequest, Box<AnyRequest>> {
        match (self, action) {
            (AnyRequest::Pending(r), TriageAction::Approve { admin }) => {
                Ok(r.approve(*admin).into())
            }
            (AnyRequest::Pending(r), TriageAction::Reject { admin }) => Ok(r.reject(*admin).into()),
            (AnyRequest::Approved(r), TriageAction::Fulfill { admin }) => {
                Ok(r.fulfill(*admin).into())
            }
            (AnyRequest::Approved(r), TriageAction::Publish { admin }) => {
                Ok(r.publish(*admin).into())
            }
            (AnyRequest::Rejected(r), TriageAction::Explain { admin, reason }) => {
                Ok(r.explain(*admin, reason.clone()).into())
            }
            (current, _) => Err(Box::new(current)),
        }
    }
}
