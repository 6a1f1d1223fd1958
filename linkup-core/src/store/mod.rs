//! Storage seams for the connection graph and the mailbox.
//!
//! The core never talks to a database directly: workflow, reachability and
//! mailbox logic receive `Arc<dyn …>` handles to these traits. Two adapters
//! ship with the crate:
//! - **memory** - a single async mutex per store; used by tests and local runs
//! - **postgres** - sqlx-backed tables from `migrations/`, per-pair advisory locks

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::DomainError;
use crate::models::{ConnectionEdge, EdgeId, EdgeStatus, MemberId, Message, MessageId};

pub mod memory;
pub mod postgres;

pub use memory::{MemberSet, MemoryConnectionStore, MemoryMessageStore};
pub use postgres::{PgConnectionStore, PgDirectory, PgMessageStore};

/// Resolves member identifiers. Owned outside this crate.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn exists(&self, member: &str) -> Result<bool, DomainError>;
}

/// Owner of connection edges.
///
/// Every mutation is an atomic read-check-write: implementations must make it
/// impossible for two callers to both create an active edge for one pair, or to
/// both transition the same pending edge.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Create a pending edge. Fails with `SelfRequest` or `AlreadyConnected`.
    async fn upsert_pending(&self, requester: &str, target: &str) -> Result<EdgeId, DomainError>;

    /// Move a pending edge to `status` on behalf of `actor`.
    /// Fails with `NotFound`, `InvalidTransition` or `Unauthorized`, in that order.
    async fn set_status(
        &self,
        edge_id: EdgeId,
        status: EdgeStatus,
        actor: &str,
    ) -> Result<ConnectionEdge, DomainError>;

    async fn get(&self, edge_id: EdgeId) -> Result<Option<ConnectionEdge>, DomainError>;

    /// The pending or accepted edge between `a` and `b`, in either direction.
    async fn active_between(&self, a: &str, b: &str)
        -> Result<Option<ConnectionEdge>, DomainError>;

    /// Members sharing an accepted edge with `member`, direction-agnostic.
    async fn accepted(&self, member: &str) -> Result<BTreeSet<MemberId>, DomainError>;

    /// Pending edges addressed to `member`, oldest first.
    async fn pending_incoming(&self, member: &str) -> Result<Vec<ConnectionEdge>, DomainError>;

    /// Accepted neighbors of every member in `frontier`, as `(member, neighbor)` pairs.
    async fn accepted_among(
        &self,
        frontier: &[MemberId],
    ) -> Result<Vec<(MemberId, MemberId)>, DomainError> {
        let mut out = Vec::new();
        for member in frontier {
            for neighbor in self.accepted(member).await? {
                out.push((member.clone(), neighbor));
            }
        }
        Ok(out)
    }
}

/// Persistence for mailbox messages. Validation lives in `Mailbox`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: &Message) -> Result<(), DomainError>;

    async fn get(&self, id: MessageId) -> Result<Option<Message>, DomainError>;

    /// Messages addressed to `receiver`, `sent_at` ascending, ties in insertion order.
    async fn list_for_receiver(
        &self,
        receiver: &str,
        include_deleted: bool,
    ) -> Result<Vec<Message>, DomainError>;

    /// Set `deleted = true`. Never clears the flag.
    async fn mark_deleted(&self, id: MessageId) -> Result<(), DomainError>;
}
