//! In-process store backend for Tender.
//!
//! Implements the [`KeyValueStore`](tender_core::KeyValueStore) contract with
//! TTLs, atomic create-if-absent and a watch feed. Used by tests and by the
//! `simulate` command; production deployments plug in a distributed store.

pub mod memory;

pub use memory::MemoryStore;
