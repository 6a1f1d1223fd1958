use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ConnectionStore, Directory, MessageStore};
use crate::error::DomainError;
use crate::models::{ConnectionEdge, EdgeId, EdgeStatus, MemberId, MemberPair, Message, MessageId};

/// In-process member directory.
///
/// `MemberSet::open()` treats every identifier as known.
#[derive(Debug, Clone, Default)]
pub struct MemberSet {
    members: Option<HashSet<MemberId>>,
}

impl MemberSet {
    pub fn open() -> Self {
        Self { members: None }
    }

    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<MemberId>,
    {
        Self {
            members: Some(members.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl Directory for MemberSet {
    async fn exists(&self, member: &str) -> Result<bool, DomainError> {
        Ok(match &self.members {
            Some(set) => set.contains(member),
            None => true,
        })
    }
}

#[derive(Default)]
struct EdgeTable {
    edges: HashMap<EdgeId, ConnectionEdge>,
    // Secondary index: the single active edge of each pair.
    active: HashMap<MemberPair, EdgeId>,
    // Pending edges per target, in insertion order.
    pending: HashMap<MemberId, Vec<EdgeId>>,
    adjacency: HashMap<MemberId, BTreeSet<MemberId>>,
}

/// Connection store guarded by one mutex for each read-check-write.
#[derive(Default)]
pub struct MemoryConnectionStore {
    inner: Mutex<EdgeTable>,
}

impl MemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn upsert_pending(&self, requester: &str, target: &str) -> Result<EdgeId, DomainError> {
        if requester == target {
            return Err(DomainError::SelfRequest);
        }

        let pair = MemberPair::new(requester, target);
        let mut table = self.inner.lock().await;
        if table.active.contains_key(&pair) {
            return Err(DomainError::AlreadyConnected(
                requester.to_string(),
                target.to_string(),
            ));
        }

        let edge = ConnectionEdge::pending(requester, target);
        let id = edge.id;
        table.active.insert(pair, id);
        table.pending.entry(target.to_string()).or_default().push(id);
        table.edges.insert(id, edge);
        Ok(id)
    }

    async fn set_status(
        &self,
        edge_id: EdgeId,
        status: EdgeStatus,
        actor: &str,
    ) -> Result<ConnectionEdge, DomainError> {
        let mut table = self.inner.lock().await;
        let edge = table
            .edges
            .get_mut(&edge_id)
            .ok_or_else(|| DomainError::NotFound(format!("edge {}", edge_id)))?;

        edge.check_transition(status, actor)?;
        edge.apply(status);
        let edge = edge.clone();

        if let Some(ids) = table.pending.get_mut(&edge.target) {
            ids.retain(|id| *id != edge_id);
        }
        if !edge.status.is_active() {
            table.active.remove(&edge.pair());
        }
        if edge.status == EdgeStatus::Accepted {
            table
                .adjacency
                .entry(edge.requester.clone())
                .or_default()
                .insert(edge.target.clone());
            table
                .adjacency
                .entry(edge.target.clone())
                .or_default()
                .insert(edge.requester.clone());
        }

        Ok(edge)
    }

    async fn get(&self, edge_id: EdgeId) -> Result<Option<ConnectionEdge>, DomainError> {
        Ok(self.inner.lock().await.edges.get(&edge_id).cloned())
    }

    async fn active_between(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<ConnectionEdge>, DomainError> {
        let table = self.inner.lock().await;
        Ok(table
            .active
            .get(&MemberPair::new(a, b))
            .and_then(|id| table.edges.get(id))
            .cloned())
    }

    async fn accepted(&self, member: &str) -> Result<BTreeSet<MemberId>, DomainError> {
        Ok(self
            .inner
            .lock()
            .await
            .adjacency
            .get(member)
            .cloned()
            .unwrap_or_default())
    }

    async fn pending_incoming(&self, member: &str) -> Result<Vec<ConnectionEdge>, DomainError> {
        let table = self.inner.lock().await;
        let mut edges: Vec<ConnectionEdge> = table
            .pending
            .get(member)
            .into_iter()
            .flatten()
            .filter_map(|id| table.edges.get(id))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        edges.sort_by_key(|e| e.created_at);
        Ok(edges)
    }

    async fn accepted_among(
        &self,
        frontier: &[MemberId],
    ) -> Result<Vec<(MemberId, MemberId)>, DomainError> {
        // One lock for the whole frontier gives a consistent snapshot.
        let table = self.inner.lock().await;
        Ok(frontier
            .iter()
            .flat_map(|m| {
                table
                    .adjacency
                    .get(m)
                    .into_iter()
                    .flatten()
                    .map(move |n| (m.clone(), n.clone()))
            })
            .collect())
    }
}

#[derive(Default)]
struct MessageTable {
    // Insertion order; positions never move.
    messages: Vec<Message>,
    by_id: HashMap<MessageId, usize>,
    by_receiver: HashMap<MemberId, Vec<usize>>,
}

impl MessageTable {
    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        let pos = *self.by_id.get(&id)?;
        self.messages.get_mut(pos)
    }
}

/// Message store keeping insertion order for stable chronological listing.
#[derive(Default)]
pub struct MemoryMessageStore {
    inner: Mutex<MessageTable>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert(&self, message: &Message) -> Result<(), DomainError> {
        let mut table = self.inner.lock().await;
        let pos = table.messages.len();
        table.by_id.insert(message.id, pos);
        table
            .by_receiver
            .entry(message.receiver.clone())
            .or_default()
            .push(pos);
        table.messages.push(message.clone());
        Ok(())
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>, DomainError> {
        let table = self.inner.lock().await;
        Ok(table
            .by_id
            .get(&id)
            .and_then(|pos| table.messages.get(*pos))
            .cloned())
    }

    async fn list_for_receiver(
        &self,
        receiver: &str,
        include_deleted: bool,
    ) -> Result<Vec<Message>, DomainError> {
        let table = self.inner.lock().await;
        let mut inbox: Vec<Message> = table
            .by_receiver
            .get(receiver)
            .into_iter()
            .flatten()
            .filter_map(|pos| table.messages.get(*pos))
            .filter(|m| include_deleted || !m.deleted)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        inbox.sort_by_key(|m| m.sent_at);
        Ok(inbox)
    }

    async fn mark_deleted(&self, id: MessageId) -> Result<(), DomainError> {
        let mut table = self.inner.lock().await;
        match table.get_mut(id) {
            Some(m) => {
                m.deleted = true;
                Ok(())
            }
            None => Err(DomainError::NotFound(format!("message {}", id))),
        }
    }
}
