//! Tool-approval gate: sensitive actions suspend until a human accepts or
//! rejects them. Requests are correlated by the chat surface's message id,
//! which is unrelated to scheduler command ids.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};

pub type ApprovalId = u64;

pub const APPROVAL_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Rejected,
    TimedOut,
}

#[derive(Default)]
pub struct ApprovalGate {
    pending: Mutex<HashMap<ApprovalId, oneshot::Sender<ApprovalDecision>>>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a pending request. Returns `false` when the request is
    /// unknown, already resolved, or expired.
    pub async fn resolve(&self, id: ApprovalId, decision: ApprovalDecision) -> bool {
        let Some(sender) = self.pending.lock().await.remove(&id) else {
            log::warn!("Approval request {id} has expired or been removed");
            return false;
        };
        if sender.send(decision).is_err() {
            log::warn!("Approval request {id} is no longer awaited");
            return false;
        }

        log::info!("Tool approval {id} resolved by user: {decision:?}");
        true
    }

    /// Register a request and wait for the user's decision. Times out after
    /// [`APPROVAL_TIMEOUT`]; callers treat a timeout as denial.
    pub async fn await_decision(&self, id: ApprovalId) -> ApprovalOutcome {
        self.await_decision_with_timeout(id, APPROVAL_TIMEOUT).await
    }

    pub async fn await_decision_with_timeout(
        &self,
        id: ApprovalId,
        timeout: Duration,
    ) -> ApprovalOutcome {
        let (tx, rx) = oneshot::channel();
        // A new request under the same message id replaces the stale one.
        self.pending.lock().await.insert(id, tx);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(ApprovalDecision::Approved)) => ApprovalOutcome::Approved,
            Ok(Ok(ApprovalDecision::Rejected)) => ApprovalOutcome::Rejected,
            Ok(Err(_)) => {
                log::warn!("Approval request {id} was replaced before being resolved");
                ApprovalOutcome::Rejected
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                log::warn!("Tool approval {id} timed out");
                ApprovalOutcome::TimedOut
            }
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
