//! Core types for the request lifecycle.
//!
//! This module defines the type-safe request lifecycle using the typestate pattern.
//! Each request progresses through distinct moderation states, enforced at compile time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a file request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        RequestId(uuid)
    }
}

impl std::ops::Deref for RequestId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Platform identity of a requesting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform identity of an admin.
///
/// Admins are users too; `as_user` converts when an admin is addressed
/// through a user-facing channel (private instructions, confirmations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminId(pub i64);

impl AdminId {
    pub fn as_user(self) -> UserId {
        UserId(self.0)
    }
}

impl fmt::Display for AdminId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform identity of a chat or channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to the originating image of a request.
///
/// Owned by the chat platform; the ledger only carries it so the image can
/// be re-forwarded, never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

/// Opaque reference to an admin-supplied artifact (the found file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Platform file identifier, passed through unexamined.
    pub file: String,
    /// Whether the platform delivered the artifact as a document or a video.
    pub kind: ArtifactKind,
}

/// Artifact delivery kind, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Document,
    Video,
}

/// Opaque reference to a message owned by the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub i64);

/// Flat request status for queries and user-facing formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    PostedToChannel,
    RejectedWithReason,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Completed => "completed",
            RequestStatus::PostedToChannel => "posted_to_channel",
            RequestStatus::RejectedWithReason => "rejected_with_reason",
        };
        f.write_str(s)
    }
}

/// Marker trait for valid request states.
///
/// This trait enables the typestate pattern, ensuring that operations
/// are only performed on requests in valid states.
pub trait RequestState: Send + Sync {}

/// A file request under moderation.
///
/// Uses the typestate pattern to ensure type-safe state transitions.
/// The generic parameter `T` represents the current moderation state.
#[derive(Debug, Clone, Serialize)]
pub struct Request<T: RequestState> {
    /// The current state of the request.
    pub state: T,
    /// The immutable submission data.
    pub data: RequestData,
}

/// Immutable submission data for a request.
///
/// Everything here is fixed at creation time; only the state half of a
/// [`Request`] changes as admins act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestData {
    /// The ledger-assigned request identifier.
    pub id: RequestId,

    /// The user who submitted the request.
    pub requester: UserId,

    /// The submitted image describing the wanted file.
    pub source: ImageRef,

    /// When the request entered the ledger.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Request States
// ============================================================================

/// Request is waiting for admin triage.
///
/// This is the initial state for all newly submitted requests.
#[derive(Debug, Clone, Serialize)]
pub struct Pending;

impl RequestState for Pending {}

/// An admin approved the request; a file is expected to follow.
#[derive(Debug, Clone, Serialize)]
pub struct Approved {
    pub approved_by: AdminId,
    pub approved_at: DateTime<Utc>,
}

impl RequestState for Approved {}

/// An admin rejected the request; a reason may still follow.
#[derive(Debug, Clone, Serialize)]
pub struct Rejected {
    pub rejected_by: AdminId,
    pub rejected_at: DateTime<Utc>,
}

impl RequestState for Rejected {}

/// The found file was sent directly to the requester (terminal).
#[derive(Debug, Clone, Serialize)]
pub struct Completed {
    pub approved_at: DateTime<Utc>,
    pub fulfilled_by: AdminId,
    pub completed_at: DateTime<Utc>,
}

impl RequestState for Completed {}

/// The found file was published to the requests channel (terminal).
#[derive(Debug, Clone, Serialize)]
pub struct PostedToChannel {
    pub approved_at: DateTime<Utc>,
    pub posted_by: AdminId,
    pub posted_at: DateTime<Utc>,
}

impl RequestState for PostedToChannel {}

/// The rejection was explained to the requester (terminal).
#[derive(Debug, Clone, Serialize)]
pub struct RejectedWithReason {
    pub rejected_at: DateTime<Utc>,
    pub explained_by: AdminId,
    pub explained_at: DateTime<Utc>,
    pub reason: String,
}

impl RequestState for RejectedWithReason {}

// ============================================================================
// AnyRequest
// ============================================================================

/// A request in any moderation state.
///
/// The ledger stores requests through this enum; typed states are
/// materialized when a transition is applied.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnyRequest {
    Pending(Request<Pending>),
    Approved(Request<Approved>),
    Rejected(Request<Rejected>),
    Completed(Request<Completed>),
    PostedToChannel(Request<PostedToChannel>),
    RejectedWithReason(Request<RejectedWithReason>),
}

impl AnyRequest {
    /// The request's identifier, regardless of state.
    pub fn id(&self) -> RequestId {
        self.data().id
    }

    /// The submitting user, regardless of state.
    pub fn requester(&self) -> UserId {
        self.data().requester
    }

    /// The flat status of the current state.
    pub fn status(&self) -> RequestStatus {
        match self {
            AnyRequest::Pending(_) => RequestStatus::Pending,
            AnyRequest::Approved(_) => RequestStatus::Approved,
            AnyRequest::Rejected(_) => RequestStatus::Rejected,
            AnyRequest::Completed(_) => RequestStatus::Completed,
            AnyRequest::PostedToChannel(_) => RequestStatus::PostedToChannel,
            AnyRequest::RejectedWithReason(_) => RequestStatus::RejectedWithReason,
        }
    }

    /// Whether the request has reached a state with no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnyRequest::Completed(_)
                | AnyRequest::PostedToChannel(_)
                | AnyRequest::RejectedWithReason(_)
        )
    }

    /// The immutable submission data.
    pub fn data(&self) -> &RequestData {
        match self {
            AnyRequest::Pending(r) => &r.data,
            AnyRequest::Approved(r) => &r.data,
            AnyRequest::Rejected(r) => &r.data,
            AnyRequest::Completed(r) => &r.data,
            AnyRequest::PostedToChannel(r) => &r.data,
            AnyRequest::RejectedWithReason(r) => &r.data,
        }
    }
}

impl From<Request<Pending>> for AnyRequest {
    fn from(r: Request<Pending>) -> Self {
        AnyRequest::Pending(r)
    }
}

impl From<Request<Approved>> for AnyRequest {
    fn from(r: Request<Approved>) -> Self {
        AnyRequest::Approved(r)
    }
}

impl From<Request<Rejected>> for AnyRequest {
    fn from(r: Request<Rejected>) -> Self {
        AnyRequest::Rejected(r)
    }
}

impl From<Request<Completed>> for AnyRequest {
    fn from(r: Request<Completed>) -> Self {
        AnyRequest::Completed(r)
    }
}

impl From<Request<PostedToChannel>> for AnyRequest {
    fn from(r: Request<PostedToChannel>) -> Self {
        AnyRequest::PostedToChannel(r)
    }
}

impl From<Request<RejectedWithReason>> for AnyRequest {
    fn from(r: Request<RejectedWithReason>) -> Self {
        AnyRequest::RejectedWithReason(r)
    }
}
