//! Exclusive, TTL-bounded claims on named resources.
//!
//! A lease is a store key at `<root>/lease/<name>` whose value is the holder's
//! identity and whose TTL is the lease duration. Exclusivity rests entirely on
//! the store's atomic create-if-absent. Leases are never renewed or released;
//! they lapse when the TTL runs out and the name becomes acquirable again.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tender_core::{KeyValueStore, Keyspace, MachineId, StoreError};
use tracing::{debug, trace, warn};

/// Trait for lease backends.
#[async_trait]
pub trait LeaseManager: Send + Sync {
    /// Try to become the holder of `name` for `ttl`.
    ///
    /// Returns `true` iff `holder` is the current holder afterwards. A holder
    /// asking again for a lease it already owns gets `true`; the TTL is left
    /// untouched. Store failures read as `false`.
    async fn acquire(&self, name: &str, holder: &MachineId, ttl: Duration) -> bool;

    /// Current holder of `name`, if the lease is live.
    async fn holder(&self, name: &str) -> Option<MachineId>;
}

/// [`LeaseManager`] backed by a [`KeyValueStore`].
pub struct StoreLeaseManager {
    store: Arc<dyn KeyValueStore>,
    keyspace: Keyspace,
}

impl StoreLeaseManager {
    pub fn new(store: Arc<dyn KeyValueStore>, keyspace: Keyspace) -> Self {
        Self { store, keyspace }
    }
}

#[async_trait]
impl LeaseManager for StoreLeaseManager {
    async fn acquire(&self, name: &str, holder: &MachineId, ttl: Duration) -> bool {
        let key = self.keyspace.lease(name);

        match self.store.create(&key, holder.as_str(), Some(ttl)).await {
            Ok(_) => {
                debug!(lease = %name, holder = %holder, ttl = ?ttl, "Acquired lease");
                true
            }
            Err(StoreError::AlreadyExists(_)) => match self.holder(name).await {
                Some(current) if current == *holder => {
                    trace!(lease = %name, holder = %holder, "Lease already held by caller");
                    true
                }
                current => {
                    trace!(lease = %name, holder = %holder, current = ?current, "Lease held elsewhere");
                    false
                }
            },
            Err(e) => {
                warn!(lease = %name, holder = %holder, error = %e, "Failed to acquire lease");
                false
            }
        }
    }

    async fn holder(&self, name: &str) -> Option<MachineId> {
        match self.store.get(&self.keyspace.lease(name), false).await {
            Ok(node) => node.value.map(MachineId::from),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!(lease = %name, error = %e, "Failed to read lease");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::UnavailableStore;
    use tender_store::MemoryStore;

    fn manager() -> (Arc<MemoryStore>, StoreLeaseManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = StoreLeaseManager::new(store.clone(), Keyspace::new("/t"));
        (store, manager)
    }

    #[tokio::test]
    async fn test_first_caller_wins() {
        let (store, leases) = manager();
        let ttl = Duration::from_secs(30);

        assert!(leases.acquire("offer-web", &"m1".into(), ttl).await);
        assert!(!leases.acquire("offer-web", &"m2".into(), ttl).await);
        assert_eq!(leases.holder("offer-web").await, Some(MachineId::from("m1")));

        let record = store.get("/t/lease/offer-web", false).await.unwrap();
        assert_eq!(record.value.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn test_holder_asking_again_is_granted() {
        let (_, leases) = manager();
        let ttl = Duration::from_secs(30);

        assert!(leases.acquire("offer-web", &"m1".into(), ttl).await);
        assert!(leases.acquire("offer-web", &"m1".into(), ttl).await);
    }

    #[tokio::test]
    async fn test_distinct_names_are_independent() {
        let (_, leases) = manager();
        let ttl = Duration::from_secs(30);

        assert!(leases.acquire("offer-web", &"m1".into(), ttl).await);
        assert!(leases.acquire("offer-db", &"m2".into(), ttl).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_lapses_after_ttl() {
        let (_, leases) = manager();
        let ttl = Duration::from_secs(10);

        assert!(leases.acquire("offer-web", &"m1".into(), ttl).await);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!leases.acquire("offer-web", &"m2".into(), ttl).await);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(leases.holder("offer-web").await, None);
        assert!(leases.acquire("offer-web", &"m2".into(), ttl).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_get_one_grant() {
        let (_, leases) = manager();
        let leases = Arc::new(leases);

        let attempts: Vec<_> = (0..16)
            .map(|i| {
                let leases = leases.clone();
                tokio::spawn(async move {
                    leases
                        .acquire("offer-web", &MachineId::new(format!("m{i}")), Duration::from_secs(30))
                        .await
                })
            })
            .collect();

        let mut granted = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_refusal() {
        let leases = StoreLeaseManager::new(Arc::new(UnavailableStore), Keyspace::new("/t"));

        assert!(!leases.acquire("offer-web", &"m1".into(), Duration::from_secs(1)).await);
        assert_eq!(leases.holder("offer-web").await, None);
    }
}
