//! Offer registry: publish, list, bid on, claim and resolve offers.

use std::sync::Arc;
use std::time::Duration;
use tender_core::keyspace::OBJECT_KEY;
use tender_core::{
    Codec, JobBid, JobId, JobOffer, JsonCodec, KeyValueStore, Keyspace, MachineId, Node, OfferKey,
};
use tracing::{debug, info, warn};

use crate::lease::{LeaseManager, StoreLeaseManager};
use crate::RegistryResult;

/// Operations over the `<root>/offer` namespace.
///
/// Nothing is cached: every call reads or writes the store directly.
pub struct OfferRegistry {
    store: Arc<dyn KeyValueStore>,
    keyspace: Keyspace,
    codec: Arc<dyn Codec>,
    leases: Arc<dyn LeaseManager>,
    /// TTL applied to bid markers. `None` keeps bids until the offer is resolved.
    bid_ttl: Option<Duration>,
}

impl OfferRegistry {
    /// Create a registry using JSON payloads and store-backed leases.
    pub fn new(store: Arc<dyn KeyValueStore>, keyspace: Keyspace) -> Self {
        let leases: Arc<dyn LeaseManager> =
            Arc::new(StoreLeaseManager::new(store.clone(), keyspace.clone()));
        Self {
            store,
            keyspace,
            codec: Arc::new(JsonCodec),
            leases,
            bid_ttl: None,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_leases(mut self, leases: Arc<dyn LeaseManager>) -> Self {
        self.leases = leases;
        self
    }

    pub fn with_bid_ttl(mut self, bid_ttl: Option<Duration>) -> Self {
        self.bid_ttl = bid_ttl;
        self
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn leases(&self) -> &Arc<dyn LeaseManager> {
        &self.leases
    }

    /// Write an offer to its object key, replacing any previous one.
    ///
    /// Nothing is written if the job id is not a single path segment or the
    /// offer cannot be encoded.
    pub async fn publish_offer(&self, offer: &JobOffer) -> RegistryResult<()> {
        let key = self.keyspace.key(&OfferKey::Object(offer.job_id().clone()))?;
        let raw = self.codec.encode_offer(offer)?;

        self.store.set(&key, &raw, None).await?;
        info!(job = %offer.job_id(), "Published offer");
        Ok(())
    }

    /// Every offer currently in the store, in no particular order.
    ///
    /// Best effort: entries that cannot be decoded are skipped, and an
    /// unreadable namespace yields an empty list.
    pub async fn unresolved_offers(&self) -> Vec<JobOffer> {
        let listing = match self.store.get(&self.keyspace.offers(), true).await {
            Ok(node) => node,
            Err(e) if e.is_not_found() => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to list offers");
                return Vec::new();
            }
        };

        listing
            .nodes
            .iter()
            .filter_map(|entry| self.decode_entry(entry))
            .collect()
    }

    fn decode_entry(&self, entry: &Node) -> Option<JobOffer> {
        let Some(raw) = entry.child(OBJECT_KEY).and_then(|o| o.value.as_deref()) else {
            debug!(key = %entry.key, "Offer directory has no object, skipping");
            return None;
        };

        match self.codec.decode_offer(raw) {
            Ok(offer) if offer.job_id().as_str() == entry.name() => Some(offer),
            Ok(offer) => {
                warn!(
                    key = %entry.key,
                    job = %offer.job_id(),
                    "Skipping offer stored under another job's key"
                );
                None
            }
            Err(e) => {
                warn!(key = %entry.key, error = %e, "Skipping undecodable offer");
                None
            }
        }
    }

    /// Try to win exclusive assignment of an offer for `ttl`.
    ///
    /// The offer must still be live; otherwise no lease is attempted. The
    /// existence check and the lease are not atomic together, the lease alone
    /// decides the winner. Store failures read as `false`.
    pub async fn claim_offer(&self, job_id: &JobId, candidate: &MachineId, ttl: Duration) -> bool {
        let offer = match (self.keyspace.offer(job_id), candidate.validate()) {
            (Ok(offer), Ok(())) => offer,
            (Err(e), _) | (_, Err(e)) => {
                debug!(
                    job = %job_id,
                    candidate = %candidate,
                    error = %e,
                    "Invalid identity, not claimable"
                );
                return false;
            }
        };

        match self.store.get(&offer, true).await {
            Ok(node) if node.child(OBJECT_KEY).is_some() => {}
            Ok(_) => {
                debug!(job = %job_id, candidate = %candidate, "Offer has no object, not claimable");
                return false;
            }
            Err(e) => {
                debug!(job = %job_id, candidate = %candidate, error = %e, "Offer not claimable");
                return false;
            }
        }

        let granted = self
            .leases
            .acquire(&Keyspace::offer_lease_name(job_id), candidate, ttl)
            .await;

        if granted {
            info!(job = %job_id, machine = %candidate, "Claimed offer");
        } else {
            debug!(job = %job_id, candidate = %candidate, "Offer claimed elsewhere");
        }
        granted
    }

    /// Remove an offer and all its bids. Resolving an absent offer is a no-op.
    pub async fn resolve_offer(&self, job_id: &JobId) {
        let offer = match self.keyspace.offer(job_id) {
            Ok(offer) => offer,
            Err(e) => {
                warn!(job = %job_id, error = %e, "Refusing to resolve invalid job id");
                return;
            }
        };

        match self.store.delete(&offer, true).await {
            Ok(()) => info!(job = %job_id, "Resolved offer"),
            Err(e) if e.is_not_found() => debug!(job = %job_id, "Offer already resolved"),
            Err(e) => warn!(job = %job_id, error = %e, "Failed to resolve offer"),
        }
    }

    /// Record that `machine_id` is willing to run `job_id`. Resubmitting overwrites.
    ///
    /// This is a write path like [`publish_offer`](Self::publish_offer): invalid
    /// identities and store failures are returned so the bidder can decide
    /// whether to retry. Nothing is retried here.
    pub async fn submit_bid(&self, job_id: &JobId, machine_id: &MachineId) -> RegistryResult<()> {
        let bid = JobBid::new(job_id.clone(), machine_id.clone());
        let key = self.keyspace.key(&OfferKey::Bid(bid))?;

        self.store.set(&key, "", self.bid_ttl).await?;
        debug!(job = %job_id, machine = %machine_id, "Submitted bid");
        Ok(())
    }

    /// Bids currently recorded against an offer. Best effort, like listing.
    pub async fn bids(&self, job_id: &JobId) -> Vec<JobBid> {
        let dir = match self.keyspace.bids(job_id) {
            Ok(dir) => dir,
            Err(e) => {
                debug!(job = %job_id, error = %e, "Invalid job id, no bids");
                return Vec::new();
            }
        };

        match self.store.get(&dir, false).await {
            Ok(node) => node
                .nodes
                .iter()
                .filter_map(|n| OfferKey::parse_bid(&n.key).ok())
                .collect(),
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                warn!(job = %job_id, error = %e, "Failed to list bids");
                Vec::new()
            }
        }
    }
}
