//! Bounded breadth-first reachability over the accepted-edge graph
//!
//! Gates new connection requests: a member may solicit a target that sits
//! within `max_hops` accepted connections of them.
//! - Frontier-by-frontier expansion, neighbors fetched per frontier from the store
//! - Visited set so each member is expanded at most once
//! - Early stop once a frontier comes back empty (component exhausted)
//! - Bootstrap allowance for requesters with few accepted connections
//!
//! The graph is never materialized; every query reads the store afresh.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::ReachabilityConfig;
use crate::error::DomainError;
use crate::models::MemberId;
use crate::store::{ConnectionStore, Directory};

/// Outcome of one frontier expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Target reached at this hop distance.
    Found(u32),
    /// Nothing new to visit; target is outside the requester's component.
    Exhausted,
    /// Hop bound reached without meeting the target.
    OutOfRange,
    /// Keep expanding.
    Continue,
}

/// Incremental BFS state, independent of where neighbors come from.
#[derive(Debug)]
pub struct FrontierSearch {
    target: MemberId,
    max_hops: u32,
    hops: u32,
    visited: HashSet<MemberId>,
    frontier: Vec<MemberId>,
}

impl FrontierSearch {
    pub fn new(requester: &str, target: &str, max_hops: u32) -> Self {
        let mut visited = HashSet::new();
        visited.insert(requester.to_string());
        Self {
            target: target.to_string(),
            max_hops,
            hops: 0,
            visited,
            frontier: vec![requester.to_string()],
        }
    }

    /// Members whose neighbors are needed for the next expansion.
    pub fn frontier(&self) -> &[MemberId] {
        &self.frontier
    }

    pub fn hops(&self) -> u32 {
        self.hops
    }

    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    /// Expand the current frontier with its neighbors.
    pub fn advance<I>(&mut self, neighbors: I) -> Step
    where
        I: IntoIterator<Item = MemberId>,
    {
        if self.hops >= self.max_hops {
            return Step::OutOfRange;
        }
        self.hops += 1;

        let mut next = Vec::new();
        for n in neighbors {
            if n == self.target {
                return Step::Found(self.hops);
            }
            if self.visited.insert(n.clone()) {
                next.push(n);
            }
        }
        self.frontier = next;

        if self.frontier.is_empty() {
            Step::Exhausted
        } else if self.hops >= self.max_hops {
            Step::OutOfRange
        } else {
            Step::Continue
        }
    }
}

/// Hop distance from `requester` to `target` if within `max_hops`, using an
/// in-memory undirected edge list (testable without a store).
pub fn hops_within(
    requester: &str,
    target: &str,
    max_hops: u32,
    edges: &[(MemberId, MemberId)],
) -> Option<u32> {
    if requester == target {
        return Some(0);
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (a, b) in edges {
        adjacency.entry(a.as_str()).or_default().push(b.as_str());
        adjacency.entry(b.as_str()).or_default().push(a.as_str());
    }

    let mut search = FrontierSearch::new(requester, target, max_hops);
    loop {
        let neighbors: Vec<MemberId> = search
            .frontier()
            .iter()
            .flat_map(|m| adjacency.get(m.as_str()).into_iter().flatten())
            .map(|n| n.to_string())
            .collect();
        match search.advance(neighbors) {
            Step::Found(h) => return Some(h),
            Step::Exhausted | Step::OutOfRange => return None,
            Step::Continue => {}
        }
    }
}

/// Decides whether a requester may solicit a target.
#[derive(Clone)]
pub struct ReachabilityChecker {
    store: Arc<dyn ConnectionStore>,
    directory: Arc<dyn Directory>,
    config: ReachabilityConfig,
}

impl ReachabilityChecker {
    pub fn new(
        store: Arc<dyn ConnectionStore>,
        directory: Arc<dyn Directory>,
        config: ReachabilityConfig,
    ) -> Self {
        Self {
            store,
            directory,
            config,
        }
    }

    pub fn config(&self) -> &ReachabilityConfig {
        &self.config
    }

    /// `is_eligible_within` at the configured hop bound.
    pub async fn is_eligible(&self, requester: &str, target: &str) -> Result<bool, DomainError> {
        self.is_eligible_within(requester, target, self.config.max_hops)
            .await
    }

    /// True if `target` is a known member and either `requester` is below the
    /// bootstrap threshold or `target` lies within `max_hops` accepted edges.
    pub async fn is_eligible_within(
        &self,
        requester: &str,
        target: &str,
        max_hops: u32,
    ) -> Result<bool, DomainError> {
        if !self.directory.exists(target).await? {
            tracing::debug!(requester, target, "Eligibility denied: unknown target");
            return Ok(false);
        }
        if requester == target {
            return Ok(true);
        }

        let degree = self.store.accepted(requester).await?.len();
        if degree < self.config.bootstrap_min_connections {
            tracing::debug!(
                requester,
                degree,
                threshold = self.config.bootstrap_min_connections,
                "Eligibility granted by bootstrap allowance"
            );
            return Ok(true);
        }

        let mut search = FrontierSearch::new(requester, target, max_hops);
        loop {
            let neighbors = self.store.accepted_among(search.frontier()).await?;
            match search.advance(neighbors.into_iter().map(|(_, n)| n)) {
                Step::Found(hops) => {
                    tracing::debug!(requester, target, hops, "Target within reach");
                    return Ok(true);
                }
                Step::Exhausted | Step::OutOfRange => {
                    tracing::debug!(
                        requester,
                        target,
                        hops = search.hops(),
                        visited = search.visited(),
                        "Target out of reach"
                    );
                    return Ok(false);
                }
                Step::Continue => {}
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EdgeStatus;
    use crate::store::{MemberSet, MemoryConnectionStore};

    fn edge(a: &str, b: &str) -> (MemberId, MemberId) {
        (a.to_string(), b.to_string())
    }

    fn chain() -> Vec<(MemberId, MemberId)> {
        vec![
            edge("a", "b"),
            edge("b", "c"),
            edge("c", "d"),
            edge("d", "e"),
        ]
    }

    async fn store_with(edges: &[(&str, &str)]) -> Arc<MemoryConnectionStore> {
        let store = Arc::new(MemoryConnectionStore::new());
        for (a, b) in edges {
            let id = store.upsert_pending(a, b).await.unwrap();
            store.set_status(id, EdgeStatus::Accepted, b).await.unwrap();
        }
        store
    }

    fn checker(store: Arc<MemoryConnectionStore>, bootstrap: usize) -> ReachabilityChecker {
        ReachabilityChecker::new(
            store,
            Arc::new(MemberSet::open()),
            ReachabilityConfig {
                max_hops: 3,
                bootstrap_min_connections: bootstrap,
            },
        )
    }

    // ========================================================================
    // Pure search over edge lists
    // ========================================================================

    #[test]
    fn test_chain_hop_distances() {
        let edges = chain();
        assert_eq!(hops_within("a", "b", 3, &edges), Some(1));
        assert_eq!(hops_within("a", "c", 3, &edges), Some(2));
        assert_eq!(hops_within("a", "d", 3, &edges), Some(3));
        assert_eq!(hops_within("a", "e", 3, &edges), None);
        assert_eq!(hops_within("a", "e", 4, &edges), Some(4));
    }

    #[test]
    fn test_edges_are_undirected() {
        let edges = chain();
        assert_eq!(hops_within("e", "a", 4, &edges), Some(4));
        assert_eq!(hops_within("c", "a", 3, &edges), Some(2));
    }

    #[test]
    fn test_monotone_in_hop_bound() {
        let edges = vec![
            edge("a", "b"),
            edge("a", "c"),
            edge("c", "d"),
            edge("b", "d"),
            edge("d", "e"),
            edge("x", "y"),
        ];
        for target in ["b", "c", "d", "e", "x", "y", "z"] {
            let mut seen = false;
            for bound in 0..8 {
                let reached = hops_within("a", target, bound, &edges).is_some();
                assert!(!seen || reached, "{} lost at bound {}", target, bound);
                seen |= reached;
            }
        }
    }

    #[test]
    fn test_cycles_terminate() {
        let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "a")];
        assert_eq!(hops_within("a", "z", 100, &edges), None);
    }

    #[test]
    fn test_exhausted_component_stops_early() {
        let mut search = FrontierSearch::new("a", "z", 10);
        assert_eq!(search.advance(vec!["b".to_string()]), Step::Continue);
        // b's only neighbor is a, already visited.
        assert_eq!(search.advance(vec!["a".to_string()]), Step::Exhausted);
        assert_eq!(search.hops(), 2);
        assert_eq!(search.visited(), 2);
    }

    #[test]
    fn test_zero_hop_bound() {
        let edges = chain();
        assert_eq!(hops_within("a", "a", 0, &edges), Some(0));
        assert_eq!(hops_within("a", "b", 0, &edges), None);
    }

    // ========================================================================
    // Store-backed checker
    // ========================================================================

    #[tokio::test]
    async fn test_checker_chain_example() {
        let store = store_with(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")]).await;
        let checker = checker(store, 0);

        assert!(checker.is_eligible("a", "c").await.unwrap());
        assert!(checker.is_eligible("a", "d").await.unwrap());
        assert!(!checker.is_eligible("a", "e").await.unwrap());
        assert!(checker.is_eligible_within("a", "e", 4).await.unwrap());
    }

    #[tokio::test]
    async fn test_bootstrap_allowance() {
        let store = store_with(&[("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")]).await;

        // a has one accepted connection, below a threshold of 2.
        let lenient = checker(store.clone(), 2);
        assert!(lenient.is_eligible("a", "e").await.unwrap());
        assert!(lenient.is_eligible("a", "stranger").await.unwrap());

        // b has two, so the hop rule applies.
        let strict = checker(store, 2);
        assert!(!strict.is_eligible("b", "stranger").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_target_is_ineligible() {
        let store = store_with(&[("a", "b")]).await;
        let checker = ReachabilityChecker::new(
            store,
            Arc::new(MemberSet::new(["a", "b"])),
            ReachabilityConfig {
                max_hops: 3,
                bootstrap_min_connections: 5,
            },
        );

        assert!(checker.is_eligible("a", "b").await.unwrap());
        assert!(!checker.is_eligible("a", "ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_and_rejected_edges_do_not_count() {
        let store = Arc::new(MemoryConnectionStore::new());
        let ab = store.upsert_pending("a", "b").await.unwrap();
        store.set_status(ab, EdgeStatus::Accepted, "b").await.unwrap();
        store.upsert_pending("b", "c").await.unwrap();
        let bd = store.upsert_pending("b", "d").await.unwrap();
        store.set_status(bd, EdgeStatus::Rejected, "d").await.unwrap();

        let checker = checker(store, 0);
        assert!(!checker.is_eligible("a", "c").await.unwrap());
        assert!(!checker.is_eligible("a", "d").await.unwrap());
    }

    #[tokio::test]
    async fn test_accept_changes_later_results() {
        let store = store_with(&[("a", "b"), ("b", "c"), ("c", "d")]).await;
        let checker = checker(store.clone(), 0);
        assert!(!checker.is_eligible("a", "e").await.unwrap());

        let id = store.upsert_pending("d", "e").await.unwrap();
        store.set_status(id, EdgeStatus::Accepted, "e").await.unwrap();
        assert!(checker.is_eligible("b", "e").await.unwrap());
        assert!(!checker.is_eligible("a", "e").await.unwrap());
    }
}
