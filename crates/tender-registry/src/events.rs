//! Derivation of typed events from raw store mutations.
//!
//! Each rule looks at one [`Mutation`] in isolation: its action, the shape of
//! its key and, for offers, its value. No stored state is consulted. A rule that
//! does not apply returns a [`Skip`] explaining why, which is the normal outcome
//! for most of the feed.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tender_core::{Action, Codec, JobBid, JobOffer, JsonCodec, Mutation, OfferKey, PathMismatch};
use thiserror::Error;
use tracing::{trace, warn};

/// Event derived from the watch feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum JobEvent {
    JobOffered(JobOffer),
    JobBidSubmitted(JobBid),
}

/// Why a rule produced no event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Skip {
    #[error("action '{0}' does not create offers or bids")]
    Action(Action),

    #[error("{key}: {reason}")]
    Path { key: String, reason: PathMismatch },

    #[error("{key}: undecodable offer: {message}")]
    Decode { key: String, message: String },
}

impl Skip {
    /// `true` for the expected case of a mutation the rule does not care about,
    /// `false` when the mutation had the right shape but unusable contents.
    pub fn is_noise(&self) -> bool {
        !matches!(self, Skip::Decode { .. })
    }
}

/// Outcome of offering one mutation to every rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derivation {
    pub events: Vec<JobEvent>,
    pub skipped: Vec<Skip>,
}

type Rule = fn(&EventDeriver, &Mutation) -> Result<JobEvent, Skip>;

const RULES: [Rule; 2] = [EventDeriver::job_offered, EventDeriver::job_bid_submitted];

/// Applies the derivation rules to mutations.
pub struct EventDeriver {
    codec: Arc<dyn Codec>,
}

impl EventDeriver {
    pub fn new() -> Self {
        Self {
            codec: Arc::new(JsonCodec),
        }
    }

    pub fn with_codec(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }

    /// Offer every rule the mutation. Rules are independent, so more than one
    /// event may come back if their shapes ever overlap.
    pub fn derive(&self, mutation: &Mutation) -> Derivation {
        let mut derivation = Derivation::default();

        for rule in RULES {
            match rule(self, mutation) {
                Ok(event) => derivation.events.push(event),
                Err(skip) => {
                    if skip.is_noise() {
                        trace!(action = %mutation.action, reason = %skip, "No event");
                    } else {
                        warn!(action = %mutation.action, reason = %skip, "Dropped malformed event");
                    }
                    derivation.skipped.push(skip);
                }
            }
        }

        derivation
    }

    /// `set` on `.../offer/<job>/object` becomes [`JobEvent::JobOffered`].
    pub fn job_offered(&self, mutation: &Mutation) -> Result<JobEvent, Skip> {
        require_set(mutation)?;
        OfferKey::parse_object(&mutation.key).map_err(|reason| Skip::Path {
            key: mutation.key.clone(),
            reason,
        })?;

        let raw = mutation.value.as_deref().ok_or_else(|| Skip::Decode {
            key: mutation.key.clone(),
            message: "no value".to_string(),
        })?;
        let offer = self.codec.decode_offer(raw).map_err(|e| Skip::Decode {
            key: mutation.key.clone(),
            message: e.to_string(),
        })?;

        Ok(JobEvent::JobOffered(offer))
    }

    /// `set` on `.../offer/<job>/bids/<machine>` becomes
    /// [`JobEvent::JobBidSubmitted`]. The value is ignored.
    pub fn job_bid_submitted(&self, mutation: &Mutation) -> Result<JobEvent, Skip> {
        require_set(mutation)?;
        let bid = OfferKey::parse_bid(&mutation.key).map_err(|reason| Skip::Path {
            key: mutation.key.clone(),
            reason,
        })?;

        Ok(JobEvent::JobBidSubmitted(bid))
    }
}

impl Default for EventDeriver {
    fn default() -> Self {
        Self::new()
    }
}

fn require_set(mutation: &Mutation) -> Result<(), Skip> {
    if mutation.action == Action::Set {
        Ok(())
    } else {
        Err(Skip::Action(mutation.action))
    }
}
