use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::DomainError;
use crate::models::{ConnectionEdge, Decision, EdgeId, MemberId};
use crate::reachability::ReachabilityChecker;
use crate::store::ConnectionStore;

/// Request / accept / reject state machine over the connection store.
///
/// `None -> Pending -> {Accepted, Rejected}`; a Rejected pair may start over.
#[derive(Clone)]
pub struct ConnectionWorkflow {
    store: Arc<dyn ConnectionStore>,
    reachability: ReachabilityChecker,
}

impl ConnectionWorkflow {
    pub fn new(store: Arc<dyn ConnectionStore>, reachability: ReachabilityChecker) -> Self {
        Self {
            store,
            reachability,
        }
    }

    pub fn reachability(&self) -> &ReachabilityChecker {
        &self.reachability
    }

    pub async fn request(&self, requester: &str, target: &str) -> Result<EdgeId, DomainError> {
        if requester == target {
            return Err(DomainError::SelfRequest);
        }

        // Fast path; the store repeats this check atomically.
        if self.store.active_between(requester, target).await?.is_some() {
            tracing::debug!(requester, target, "Request refused: pair already active");
            return Err(DomainError::AlreadyConnected(
                requester.to_string(),
                target.to_string(),
            ));
        }

        if !self.reachability.is_eligible(requester, target).await? {
            tracing::debug!(requester, target, "Request refused: target unreachable");
            return Err(DomainError::Unreachable {
                requester: requester.to_string(),
                target: target.to_string(),
            });
        }

        let edge_id = self.store.upsert_pending(requester, target).await?;
        tracing::info!(requester, target, edge_id = %edge_id, "Connection requested");
        Ok(edge_id)
    }

    pub async fn respond(
        &self,
        edge_id: EdgeId,
        actor: &str,
        decision: Decision,
    ) -> Result<ConnectionEdge, DomainError> {
        let edge = self.store.set_status(edge_id, decision.into(), actor).await?;
        tracing::info!(
            edge_id = %edge_id,
            requester = %edge.requester,
            target = %edge.target,
            status = ?edge.status,
            "Connection answered"
        );
        Ok(edge)
    }

    pub async fn get(&self, edge_id: EdgeId) -> Result<ConnectionEdge, DomainError> {
        self.store
            .get(edge_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("edge {}", edge_id)))
    }

    pub async fn list_friends(&self, member: &str) -> Result<BTreeSet<MemberId>, DomainError> {
        self.store.accepted(member).await
    }

    pub async fn pending_incoming(&self, member: &str) -> Result<Vec<ConnectionEdge>, DomainError> {
        self.store.pending_incoming(member).await
    }
}
