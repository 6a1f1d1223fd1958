use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::PgPool;

use super::{ConnectionStore, Directory, MessageStore};
use crate::error::DomainError;
use crate::models::{ConnectionEdge, EdgeId, EdgeStatus, MemberId, MemberPair, Message, MessageId};

const EDGE_COLUMNS: &str = "id, requester, target, status, created_at, responded_at";

/// Name of the partial unique index guarding active pairs (see migrations).
const ACTIVE_PAIR_INDEX: &str = "connection_edges_active_pair_uniq";

/// Directory backed by the `members` table.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn exists(&self, member: &str) -> Result<bool, DomainError> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM members WHERE id = $1)")
            .bind(member)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

#[derive(Clone)]
pub struct PgConnectionStore {
    pool: PgPool,
}

impl PgConnectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_active_pair_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(ACTIVE_PAIR_INDEX)
        }
        _ => false,
    }
}

#[async_trait]
impl ConnectionStore for PgConnectionStore {
    async fn upsert_pending(&self, requester: &str, target: &str) -> Result<EdgeId, DomainError> {
        if requester == target {
            return Err(DomainError::SelfRequest);
        }

        let pair = MemberPair::new(requester, target);
        let mut tx = self.pool.begin().await?;

        // Serialize every writer of this pair until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(pair.lock_key())
            .execute(&mut *tx)
            .await?;

        let existing: Option<(EdgeId,)> = sqlx::query_as(
            r#"
            SELECT id FROM connection_edges
            WHERE LEAST(requester, target) = $1
              AND GREATEST(requester, target) = $2
              AND status IN ('pending', 'accepted')
            "#,
        )
        .bind(&pair.low)
        .bind(&pair.high)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Err(DomainError::AlreadyConnected(
                requester.to_string(),
                target.to_string(),
            ));
        }

        let edge = ConnectionEdge::pending(requester, target);
        let inserted = sqlx::query(
            r#"
            INSERT INTO connection_edges (id, requester, target, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(edge.id)
        .bind(&edge.requester)
        .bind(&edge.target)
        .bind(edge.status)
        .bind(edge.created_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_active_pair_violation(&e) => {
                return Err(DomainError::AlreadyConnected(
                    requester.to_string(),
                    target.to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        Ok(edge.id)
    }

    async fn set_status(
        &self,
        edge_id: EdgeId,
        status: EdgeStatus,
        actor: &str,
    ) -> Result<ConnectionEdge, DomainError> {
        let mut tx = self.pool.begin().await?;

        let mut edge: ConnectionEdge = sqlx::query_as(&format!(
            "SELECT {} FROM connection_edges WHERE id = $1 FOR UPDATE",
            EDGE_COLUMNS
        ))
        .bind(edge_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("edge {}", edge_id)))?;

        edge.check_transition(status, actor)?;
        edge.apply(status);

        sqlx::query("UPDATE connection_edges SET status = $2, responded_at = $3 WHERE id = $1")
            .bind(edge.id)
            .bind(edge.status)
            .bind(edge.responded_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(edge)
    }

    async fn get(&self, edge_id: EdgeId) -> Result<Option<ConnectionEdge>, DomainError> {
        let edge = sqlx::query_as(&format!(
            "SELECT {} FROM connection_edges WHERE id = $1",
            EDGE_COLUMNS
        ))
        .bind(edge_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(edge)
    }

    async fn active_between(
        &self,
        a: &str,
        b: &str,
    ) -> Result<Option<ConnectionEdge>, DomainError> {
        let pair = MemberPair::new(a, b);
        let edge = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM connection_edges
            WHERE LEAST(requester, target) = $1
              AND GREATEST(requester, target) = $2
              AND status IN ('pending', 'accepted')
            "#,
            EDGE_COLUMNS
        ))
        .bind(&pair.low)
        .bind(&pair.high)
        .fetch_optional(&self.pool)
        .await?;
        Ok(edge)
    }

    async fn accepted(&self, member: &str) -> Result<BTreeSet<MemberId>, DomainError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT CASE WHEN requester = $1 THEN target ELSE requester END
            FROM connection_edges
            WHERE (requester = $1 OR target = $1)
              AND status = 'accepted'
            "#,
        )
        .bind(member)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(m,)| m).collect())
    }

    async fn pending_incoming(&self, member: &str) -> Result<Vec<ConnectionEdge>, DomainError> {
        let edges = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM connection_edges
            WHERE target = $1 AND status = 'pending'
            ORDER BY created_at ASC
            "#,
            EDGE_COLUMNS
        ))
        .bind(member)
        .fetch_all(&self.pool)
        .await?;
        Ok(edges)
    }

    async fn accepted_among(
        &self,
        frontier: &[MemberId],
    ) -> Result<Vec<(MemberId, MemberId)>, DomainError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT requester, target FROM connection_edges
            WHERE status = 'accepted' AND requester = ANY($1)
            UNION ALL
            SELECT target, requester FROM connection_edges
            WHERE status = 'accepted' AND target = ANY($1)
            "#,
        )
        .bind(frontier)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(&self, message: &Message) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, sender, receiver, body, sent_at, deleted)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id)
        .bind(&message.sender)
        .bind(&message.receiver)
        .bind(&message.body)
        .bind(message.sent_at)
        .bind(message.deleted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>, DomainError> {
        let message = sqlx::query_as(
            "SELECT id, sender, receiver, body, sent_at, deleted FROM messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn list_for_receiver(
        &self,
        receiver: &str,
        include_deleted: bool,
    ) -> Result<Vec<Message>, DomainError> {
        let messages = sqlx::query_as(
            r#"
            SELECT id, sender, receiver, body, sent_at, deleted
            FROM messages
            WHERE receiver = $1 AND ($2 OR deleted = FALSE)
            ORDER BY sent_at ASC, seq ASC
            "#,
        )
        .bind(receiver)
        .bind(include_deleted)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn mark_deleted(&self, id: MessageId) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE messages SET deleted = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("message {}", id)));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
