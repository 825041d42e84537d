//! Event stream: drives the deriver from a store watch feed.

use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tender_core::{KeyValueStore, Keyspace, Mutation};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::events::{EventDeriver, JobEvent};

const DEFAULT_BUFFER: usize = 100;

/// Watches the offer namespace and forwards derived events, one mutation at a
/// time and in feed order.
pub struct EventStream {
    store: Arc<dyn KeyValueStore>,
    deriver: Arc<EventDeriver>,
    prefix: String,
    buffer: usize,
}

impl EventStream {
    pub fn new(store: Arc<dyn KeyValueStore>, keyspace: &Keyspace) -> Self {
        Self {
            store,
            deriver: Arc::new(EventDeriver::new()),
            prefix: keyspace.offers(),
            buffer: DEFAULT_BUFFER,
        }
    }

    pub fn with_deriver(mut self, deriver: EventDeriver) -> Self {
        self.deriver = Arc::new(deriver);
        self
    }

    /// Number of derived events that may queue up before the pump waits.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Start streaming, returning a channel of events and the pump's handle.
    ///
    /// The watch is registered before this returns, so every mutation applied
    /// afterwards is seen. The pump stops when the receiver is dropped or the
    /// feed ends.
    pub fn start(&self) -> (mpsc::Receiver<JobEvent>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let feed = self.store.watch(&self.prefix);
        let deriver = self.deriver.clone();

        info!(prefix = %self.prefix, "Starting event stream");
        let handle = tokio::spawn(Self::pump(feed, deriver, tx));

        (rx, handle)
    }

    async fn pump(
        mut feed: BoxStream<'static, Mutation>,
        deriver: Arc<EventDeriver>,
        tx: mpsc::Sender<JobEvent>,
    ) {
        loop {
            let mutation = tokio::select! {
                _ = tx.closed() => {
                    debug!("Event receiver dropped, stopping stream");
                    return;
                }
                next = feed.next() => match next {
                    Some(mutation) => mutation,
                    None => {
                        debug!("Watch feed ended");
                        return;
                    }
                },
            };

            for event in deriver.derive(&mutation).events {
                if tx.send(event).await.is_err() {
                    debug!("Event receiver dropped, stopping stream");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OfferRegistry;
    use serde_json::json;
    use std::time::Duration;
    use tender_core::{Job, JobBid, JobId, JobOffer, MachineId};
    use tender_store::MemoryStore;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn next(rx: &mut mpsc::Receiver<JobEvent>) -> JobEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("stream closed")
    }

    #[tokio::test]
    async fn test_end_to_end_auction() {
        let store = Arc::new(MemoryStore::new());
        let keyspace = Keyspace::new("/tender");
        let registry = OfferRegistry::new(store.clone(), keyspace.clone());
        let (mut events, _pump) = EventStream::new(store.clone(), &keyspace).start();

        let web = JobId::from("web");
        let offer = JobOffer::new(Job::new("web", json!({"unit": "web.service"})));
        registry.publish_offer(&offer).await.unwrap();
        match next(&mut events).await {
            JobEvent::JobOffered(received) => assert_eq!(received.job_id(), &web),
            other => panic!("Expected JobOffered, got {:?}", other),
        }

        registry.submit_bid(&web, &"node1".into()).await.unwrap();
        assert_eq!(
            next(&mut events).await,
            JobEvent::JobBidSubmitted(JobBid::new("web", "node1"))
        );

        let ttl = Duration::from_secs(30);
        assert!(registry.claim_offer(&web, &MachineId::from("node1"), ttl).await);

        registry.resolve_offer(&web).await;
        assert!(registry.unresolved_offers().await.is_empty());
        assert!(!registry.claim_offer(&web, &MachineId::from("node2"), ttl).await);
    }

    #[tokio::test]
    async fn test_events_arrive_in_feed_order() {
        let store = Arc::new(MemoryStore::new());
        let keyspace = Keyspace::new("/tender");
        let registry = OfferRegistry::new(store.clone(), keyspace.clone());
        let (mut events, _pump) = EventStream::new(store.clone(), &keyspace).start();

        let web = JobId::from("web");
        registry
            .publish_offer(&JobOffer::new(Job::new("web", json!(null))))
            .await
            .unwrap();
        for machine in ["a", "b", "c"] {
            registry.submit_bid(&web, &machine.into()).await.unwrap();
        }

        assert!(matches!(next(&mut events).await, JobEvent::JobOffered(_)));
        for machine in ["a", "b", "c"] {
            assert_eq!(
                next(&mut events).await,
                JobEvent::JobBidSubmitted(JobBid::new("web", machine))
            );
        }
    }

    #[tokio::test]
    async fn test_unrelated_keys_produce_nothing() {
        let store = Arc::new(MemoryStore::new());
        let keyspace = Keyspace::new("/tender");
        let (mut events, _pump) = EventStream::new(store.clone(), &keyspace).start();

        store.set("/tender/offer/web/notes", "x", None).await.unwrap();
        store.set("/tender/lease/offer-web", "m1", None).await.unwrap();
        store.set("/tender/offer/db/bids/n1", "", None).await.unwrap();

        assert_eq!(
            next(&mut events).await,
            JobEvent::JobBidSubmitted(JobBid::new("db", "n1"))
        );
    }

    #[tokio::test]
    async fn test_stops_when_receiver_dropped() {
        let store = Arc::new(MemoryStore::new());
        let (events, pump) = EventStream::new(store, &Keyspace::default()).start();

        drop(events);
        timeout(WAIT, pump)
            .await
            .expect("pump did not stop")
            .unwrap();
    }
}
