use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

pub type EdgeId = Uuid;

/// Lifecycle state of a connection edge. `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "edge_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EdgeStatus {
    Pending,
    Accepted,
    Rejected,
}

impl EdgeStatus {
    /// Pending and Accepted edges block a new request for the same pair.
    pub fn is_active(self) -> bool {
        matches!(self, EdgeStatus::Pending | EdgeStatus::Accepted)
    }
}

/// The solicited member's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl From<Decision> for EdgeStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Accept => EdgeStatus::Accepted,
            Decision::Reject => EdgeStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConnectionEdge {
    pub id: EdgeId,
    pub requester: String,
    pub target: String,
    pub status: EdgeStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl ConnectionEdge {
    pub fn pending(requester: &str, target: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester: requester.to_string(),
            target: target.to_string(),
            status: EdgeStatus::Pending,
            created_at: Utc::now(),
            responded_at: None,
        }
    }

    pub fn pair(&self) -> MemberPair {
        MemberPair::new(&self.requester, &self.target)
    }

    /// Validate a status change requested by `actor`.
    ///
    /// Terminal edges fail with `InvalidTransition` whoever asks; only then is
    /// the actor checked against the solicited party.
    pub fn check_transition(&self, next: EdgeStatus, actor: &str) -> Result<(), DomainError> {
        if self.status != EdgeStatus::Pending {
            return Err(DomainError::InvalidTransition(format!(
                "edge {} is already {:?}",
                self.id, self.status
            )));
        }
        if next == EdgeStatus::Pending {
            return Err(DomainError::InvalidTransition(format!(
                "edge {} can only move to accepted or rejected",
                self.id
            )));
        }
        if actor != self.target {
            return Err(DomainError::Unauthorized(format!(
                "only {} may answer edge {}",
                self.target, self.id
            )));
        }
        Ok(())
    }

    /// Apply a transition already validated by `check_transition`.
    pub fn apply(&mut self, next: EdgeStatus) {
        self.status = next;
        self.responded_at = Some(Utc::now());
    }
}

/// Unordered member pair, normalised so `(a, b)` and `(b, a)` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberPair {
    pub low: String,
    pub high: String,
}

impl MemberPair {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self {
                low: a.to_string(),
                high: b.to_string(),
            }
        } else {
            Self {
                low: b.to_string(),
                high: a.to_string(),
            }
        }
    }

    /// Key used for per-pair advisory locking.
    pub fn lock_key(&self) -> String {
        format!("{}\u{1f}{}", self.low, self.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_direction_agnostic() {
        assert_eq!(MemberPair::new("alice", "bob"), MemberPair::new("bob", "alice"));
        assert_eq!(
            MemberPair::new("alice", "bob").lock_key(),
            MemberPair::new("bob", "alice").lock_key()
        );
    }

    #[test]
    fn test_only_target_may_answer() {
        let edge = ConnectionEdge::pending("alice", "bob");
        assert!(matches!(
            edge.check_transition(EdgeStatus::Accepted, "alice"),
            Err(DomainError::Unauthorized(_))
        ));
        assert!(edge.check_transition(EdgeStatus::Accepted, "bob").is_ok());
    }

    #[test]
    fn test_terminal_edge_rejects_any_actor() {
        let mut edge = ConnectionEdge::pending("alice", "bob");
        edge.apply(EdgeStatus::Rejected);
        assert!(edge.responded_at.is_some());

        for actor in ["alice", "bob", "carol"] {
            assert!(matches!(
                edge.check_transition(EdgeStatus::Accepted, actor),
                Err(DomainError::InvalidTransition(_))
            ));
        }
    }

    #[test]
    fn test_cannot_move_back_to_pending() {
        let edge = ConnectionEdge::pending("alice", "bob");
        assert!(matches!(
            edge.check_transition(EdgeStatus::Pending, "bob"),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_decision_maps_to_status() {
        assert_eq!(EdgeStatus::from(Decision::Accept), EdgeStatus::Accepted);
        assert_eq!(EdgeStatus::from(Decision::Reject), EdgeStatus::Rejected);
        assert!(EdgeStatus::Pending.is_active());
        assert!(EdgeStatus::Accepted.is_active());
        assert!(!EdgeStatus::Rejected.is_active());
    }
}
