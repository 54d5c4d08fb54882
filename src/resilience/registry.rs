//! Caller-owned collection of breakers for health reporting.
//!
//! # Responsibilities
//! - Hold breakers of different call signatures under one roof
//! - Report stats for every protected dependency
//! - Offer operator overrides (reset one or all)
//!
//! # Design Decisions
//! - Not a global: the owner constructs it and passes it around
//! - Breakers are type-erased behind [`Inspect`]; firing still goes through
//!   the caller's typed handle

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::types::{BreakerStats, CircuitState};

/// Signature-independent view of a breaker.
pub trait Inspect: Send + Sync {
    fn name(&self) -> &str;
    fn state(&self) -> CircuitState;
    fn stats(&self) -> BreakerStats;
    fn manual_reset(&self);
}

impl<F, A, T, E> Inspect for CircuitBreaker<F, A, T, E>
where
    F: Send + Sync,
{
    fn name(&self) -> &str {
        CircuitBreaker::name(self)
    }

    fn state(&self) -> CircuitState {
        CircuitBreaker::state(self)
    }

    fn stats(&self) -> BreakerStats {
        CircuitBreaker::stats(self)
    }

    fn manual_reset(&self) {
        CircuitBreaker::manual_reset(self)
    }
}

/// A set of breakers keyed by name.
#[derive(Clone, Default)]
pub struct BreakerSet {
    inner: Arc<DashMap<String, Arc<dyn Inspect>>>,
}

impl BreakerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `breaker` under its own name, replacing any breaker with that name.
    pub fn register<B>(&self, breaker: Arc<B>) -> Option<Arc<dyn Inspect>>
    where
        B: Inspect + 'static,
    {
        let name = breaker.name().to_string();
        tracing::debug!(breaker = %name, "Breaker registered");
        self.inner.insert(name, breaker)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Inspect>> {
        self.inner.get(name).map(|r| r.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Inspect>> {
        self.inner.remove(name).map(|(_, breaker)| breaker)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Stats for every breaker, ordered by name.
    pub fn stats(&self) -> BTreeMap<String, BreakerStats> {
        self.inner
            .iter()
            .map(|r| (r.key().clone(), r.value().stats()))
            .collect()
    }

    /// Names of breakers that are not closed.
    pub fn tripped(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .iter()
            .filter(|r| r.value().state() != CircuitState::Closed)
            .map(|r| r.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Reset every breaker. Returns how many were not closed.
    pub fn reset_all(&self) -> usize {
        let mut reopened = 0;
        for r in self.inner.iter() {
            if r.value().state() != CircuitState::Closed {
                reopened += 1;
            }
            r.value().manual_reset();
        }
        tracing::info!(breakers = self.inner.len(), tripped = reopened, "All breakers reset");
        reopened
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::types::BreakerOptions;
    use futures_util::future;
    use std::time::Duration;

    fn failing(name: &str) -> Arc<CircuitBreaker<impl Fn(()) -> future::Ready<Result<(), String>>, (), (), String>> {
        Arc::new(CircuitBreaker::new(
            |_: ()| future::ready(Err("down".to_string())),
            BreakerOptions::new(Duration::from_millis(50), 50.0, Duration::from_secs(60)).with_name(name),
        ))
    }

    #[tokio::test]
    async fn test_stats_for_every_breaker() {
        let set = BreakerSet::new();
        let payments = failing("payments");
        let search = Arc::new(CircuitBreaker::new(
            |q: String| future::ready(Ok::<usize, String>(q.len())),
            BreakerOptions::default().with_name("search"),
        ));
        set.register(payments.clone());
        set.register(search.clone());
        assert_eq!(set.len(), 2);

        let _ = payments.fire(()).await;
        assert_eq!(search.fire("rust".to_string()).await.unwrap(), 4);

        let stats = set.stats();
        assert_eq!(stats.keys().collect::<Vec<_>>(), vec!["payments", "search"]);
        assert_eq!(stats["payments"].state, CircuitState::Open);
        assert_eq!(stats["search"].success_count, 1);
        assert_eq!(set.tripped(), vec!["payments".to_string()]);
    }

    #[tokio::test]
    async fn test_reset_all() {
        let set = BreakerSet::new();
        let a = failing("a");
        let b = failing("b");
        set.register(a.clone());
        set.register(b.clone());
        let _ = a.fire(()).await;

        assert_eq!(set.reset_all(), 1);
        assert!(set.tripped().is_empty());
        assert_eq!(a.state(), CircuitState::Closed);
    }

    #[test]
    fn test_register_replaces_and_remove() {
        let set = BreakerSet::new();
        assert!(set.register(failing("dup")).is_none());
        assert!(set.register(failing("dup")).is_some());
        assert_eq!(set.len(), 1);

        assert!(set.get("dup").is_some());
        assert!(set.remove("dup").is_some());
        assert!(set.is_empty());
    }
}
