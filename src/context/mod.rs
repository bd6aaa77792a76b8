//! Per-admin interaction context.
//!
//! When an admin commits to supplying a follow-up artifact (a file to
//! forward, a file to publish, a rejection reason), the bot records a
//! single outstanding expectation for that admin. The admin's next
//! qualifying message resolves it. Resolution is read-and-clear under one
//! lock, so two near-simultaneous messages from the same admin cannot both
//! consume the same expectation.
//!
//! An expectation the admin never follows up on simply stays until it is
//! overwritten by a newer one.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::domain::context::AdminExpectation;
use crate::domain::request::AdminId;

/// Store of outstanding admin expectations.
#[derive(Default)]
pub struct AdminContexts {
    pending: Mutex<HashMap<AdminId, AdminExpectation>>,
}

impl AdminContexts {
    /// Create an empty context store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the single outstanding expectation for an admin, discarding
    /// any previous one.
    pub fn expect(&self, admin: AdminId, expectation: AdminExpectation) {
        let replaced = self.pending.lock().insert(admin, expectation);
        if let Some(previous) = replaced {
            tracing::debug!(
                admin = %admin,
                request_id = %previous.request(),
                "Unresolved expectation replaced"
            );
        }
    }

    /// Return and clear the admin's expectation in one atomic step.
    pub fn resolve(&self, admin: AdminId) -> Option<AdminExpectation> {
        self.pending.lock().remove(&admin)
    }

    /// Return and clear the admin's expectation only if the predicate
    /// accepts it; a non-matching expectation stays in place.
    ///
    /// The router uses this to leave a file-kind expectation untouched
    /// when the admin sends text, and vice versa.
    pub fn resolve_matching(
        &self,
        admin: AdminId,
        wanted: impl FnOnce(&AdminExpectation) -> bool,
    ) -> Option<AdminExpectation> {
        let mut pending = self.pending.lock();
        match pending.get(&admin) {
            Some(expectation) if wanted(expectation) => pending.remove(&admin),
            _ => None,
        }
    }
}
