//! `Network` - one handle over the connection workflow and the mailbox
//!
//! Built from `LinkupConfig`; every transport (IPC, HTTP) dispatches into it.

use std::collections::BTreeSet;
use std::sync::Arc;

use sqlx::PgPool;

use crate::config::{LinkupConfig, ReachabilityConfig, StorageBackend};
use crate::error::{DomainError, LinkupError};
use crate::mailbox::Mailbox;
use crate::models::{ConnectionEdge, Decision, EdgeId, MemberId, Message, MessageId};
use crate::reachability::ReachabilityChecker;
use crate::store::{
    ConnectionStore, Directory, MemberSet, MemoryConnectionStore, MemoryMessageStore,
    MessageStore, PgConnectionStore, PgDirectory, PgMessageStore,
};
use crate::workflow::ConnectionWorkflow;

#[derive(Clone)]
pub struct Network {
    workflow: ConnectionWorkflow,
    mailbox: Mailbox,
    pool: Option<PgPool>,
}

impl Network {
    pub fn new(
        connections: Arc<dyn ConnectionStore>,
        messages: Arc<dyn MessageStore>,
        directory: Arc<dyn Directory>,
        reachability: ReachabilityConfig,
    ) -> Self {
        let checker = ReachabilityChecker::new(connections.clone(), directory, reachability);
        Self {
            workflow: ConnectionWorkflow::new(connections, checker),
            mailbox: Mailbox::new(messages),
            pool: None,
        }
    }

    /// In-memory network with an open directory.
    pub fn in_memory(reachability: ReachabilityConfig) -> Self {
        Self::new(
            Arc::new(MemoryConnectionStore::new()),
            Arc::new(MemoryMessageStore::new()),
            Arc::new(MemberSet::open()),
            reachability,
        )
    }

    /// Postgres-backed network over an already migrated pool.
    pub fn postgres(pool: PgPool, reachability: ReachabilityConfig) -> Self {
        let mut network = Self::new(
            Arc::new(PgConnectionStore::new(pool.clone())),
            Arc::new(PgMessageStore::new(pool.clone())),
            Arc::new(PgDirectory::new(pool.clone())),
            reachability,
        );
        network.pool = Some(pool);
        network
    }

    /// Build the configured backend, connecting and migrating when needed.
    pub async fn from_config(config: &LinkupConfig) -> Result<Self, LinkupError> {
        match config.storage.backend {
            StorageBackend::Memory => {
                tracing::info!("Using in-memory storage");
                Ok(Self::in_memory(config.reachability.clone()))
            }
            StorageBackend::Postgres => {
                let db = config.database.as_ref().ok_or_else(|| {
                    LinkupError::Other("storage backend is postgres but [database] is missing".into())
                })?;
                let pool = crate::db::connect_with_retry(db).await?;
                crate::db::run_migrations(&pool).await?;
                tracing::info!("Using PostgreSQL storage");
                Ok(Self::postgres(pool, config.reachability.clone()))
            }
        }
    }

    /// Backing pool, if any; used for health reporting.
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn backend_name(&self) -> &'static str {
        if self.pool.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }

    pub async fn request_connection(
        &self,
        requester: &str,
        target: &str,
    ) -> Result<EdgeId, DomainError> {
        self.workflow.request(requester, target).await
    }

    pub async fn respond_connection(
        &self,
        edge_id: EdgeId,
        actor: &str,
        decision: Decision,
    ) -> Result<ConnectionEdge, DomainError> {
        self.workflow.respond(edge_id, actor, decision).await
    }

    pub async fn get_connection(&self, edge_id: EdgeId) -> Result<ConnectionEdge, DomainError> {
        self.workflow.get(edge_id).await
    }

    pub async fn list_connections(&self, member: &str) -> Result<BTreeSet<MemberId>, DomainError> {
        self.workflow.list_friends(member).await
    }

    pub async fn list_pending_incoming(
        &self,
        member: &str,
    ) -> Result<Vec<ConnectionEdge>, DomainError> {
        self.workflow.pending_incoming(member).await
    }

    pub async fn check_eligibility(&self, requester: &str, target: &str) -> Result<bool, DomainError> {
        self.workflow.reachability().is_eligible(requester, target).await
    }

    pub async fn send_message(
        &self,
        sender: &str,
        receiver: &str,
        body: &str,
    ) -> Result<MessageId, DomainError> {
        self.mailbox.send(sender, receiver, body).await
    }

    pub async fn list_inbox(
        &self,
        receiver: &str,
        include_deleted: bool,
    ) -> Result<Vec<Message>, DomainError> {
        self.mailbox.list_inbox(receiver, include_deleted).await
    }

    pub async fn delete_message(&self, message_id: MessageId, actor: &str) -> Result<(), DomainError> {
        self.mailbox.soft_delete(message_id, actor).await
    }
}
