//! The request ledger - authoritative store and state machine for requests.
//!
//! The ledger owns every request for the lifetime of the process. State
//! lives in memory only; resolved requests are retained indefinitely so
//! status queries keep working (there is no eviction policy).
//!
//! All mutations go through [`RequestLedger::transition`], which applies
//! the typestate edges from `domain::request::transitions` under a single
//! write lock, so racing transitions on the same request serialize and
//! exactly one wins.

use std::collections::HashMap;

use metrics::counter;
use parking_lot::RwLock;

use crate::domain::request::{
    AnyRequest, ImageRef, Pending, Request, RequestData, RequestId, TriageAction, UserId,
};
use crate::error::{Result, TriageError};

/// In-memory request store.
#[derive(Default)]
pub struct RequestLedger {
    requests: RwLock<HashMap<RequestId, AnyRequest>>,
}

impl RequestLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new pending request and return it.
    ///
    /// Identifiers are random v4 UUIDs, collision-free under concurrent
    /// submissions.
    pub fn create(&self, requester: UserId, source: ImageRef) -> Request<Pending> {
        let request = Request {
            state: Pending,
            data: RequestData {
                id: RequestId::from(uuid::Uuid::new_v4()),
                requester,
                source,
                created_at: chrono::Utc::now(),
            },
        };

        self.requests
            .write()
            .insert(request.data.id, request.clone().into());

        counter!("triage_requests_created_total").increment(1);
        tracing::info!(
            request_id = %request.data.id,
            requester = %requester,
            "Request created"
        );

        request
    }

    /// Apply an admin-triggered action to a request.
    ///
    /// The check-and-swap happens under the write lock: of two concurrent
    /// transitions on the same request, one observes the fresh state and
    /// the other gets `InvalidTransition`.
    ///
    /// # Errors
    /// - `NotFound` if the id is unknown
    /// - `InvalidTransition` if the action is not a legal edge from the
    ///   request's current state
    pub fn transition(&self, id: RequestId, action: TriageAction) -> Result<AnyRequest> {
        let mut requests = self.requests.write();

        let current = requests.remove(&id).ok_or_else(|| {
            counter!("triage_transition_denied_total", "reason" => "not_found").increment(1);
            TriageError::NotFound(id)
        })?;

        match current.apply(&action) {
            Ok(next) => {
                requests.insert(id, next.clone());
                tracing::info!(
                    request_id = %id,
                    action = %action,
                    status = %next.status(),
                    "Request transitioned"
                );
                Ok(next)
            }
            Err(original) => {
                let from = original.status().to_string();
                requests.insert(id, *original);
                counter!("triage_transition_denied_total", "reason" => "invalid_state")
                    .increment(1);
                tracing::warn!(
                    request_id = %id,
                    action = %action,
                    from = %from,
                    "Illegal transition rejected"
                );
                Err(TriageError::InvalidTransition(id, from, action.to_string()))
            }
        }
    }

    /// Get a request by id.
    pub fn get(&self, id: RequestId) -> Result<AnyRequest> {
        self.requests
            .read()
            .get(&id)
            .cloned()
            .ok_or(TriageError::NotFound(id))
    }

    /// All requests submitted by a user, oldest first.
    ///
    /// Returns an empty vector, never an error, when the user has none.
    pub fn list_by_requester(&self, user: UserId) -> Vec<AnyRequest> {
        let mut requests: Vec<AnyRequest> = self
            .requests
            .read()
            .values()
            .filter(|r| r.requester() == user)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.data().created_at);
        requests
    }
}
