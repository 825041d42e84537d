//! KDL configuration parsing for Tender.
//!
//! A configuration file holds a single `registry` node:
//!
//! ```kdl
//! registry {
//!     root "/tender"
//!     claim-ttl 30
//!     bid-ttl 120
//!     event-buffer 100
//! }
//! ```
//!
//! TTLs are whole seconds. `bid-ttl` is optional; without it bids live until
//! their offer is resolved.

pub mod error;
pub mod registry;

pub use error::{ConfigError, ConfigResult};
pub use registry::{RegistryConfig, parse_registry_config};
