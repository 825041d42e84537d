//! Offer registry for Tender.
//!
//! Machines discover published offers, submit bids and race to claim an offer
//! through a TTL-bounded lease held in the shared store. Typed events are
//! derived from the store's watch feed by looking only at the shape of each
//! changed key.

pub mod error;
pub mod events;
pub mod lease;
pub mod offer;
pub mod stream;

pub use error::{RegistryError, RegistryResult};
pub use events::{Derivation, EventDeriver, JobEvent, Skip};
pub use lease::{LeaseManager, StoreLeaseManager};
pub use offer::OfferRegistry;
pub use stream::EventStream;

#[cfg(test)]
mod testing;
