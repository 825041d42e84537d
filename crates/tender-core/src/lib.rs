//! Core domain types and traits for Tender.
//!
//! This crate contains:
//! - Job and machine identifiers
//! - Offer and bid value types
//! - The key-value store contract consumed by the registry
//! - The key-path schema shared by writers and the event deriver
//! - The payload codec boundary

pub mod codec;
pub mod error;
pub mod id;
pub mod keyspace;
pub mod offer;
pub mod store;

pub use codec::{Codec, JsonCodec};
pub use error::{CodecError, StoreError, StoreResult};
pub use id::{InvalidIdentity, JobId, MachineId};
pub use keyspace::{Keyspace, OfferKey, PathMismatch};
pub use offer::{Job, JobBid, JobOffer};
pub use store::{Action, KeyValueStore, Mutation, Node};
