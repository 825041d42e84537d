//! CLI command implementations.

pub mod simulate;

use anyhow::{Context, Result};
use std::path::Path;
use tender_config::RegistryConfig;

/// Load the configuration file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<RegistryConfig> {
    match path {
        Some(path) => RegistryConfig::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display())),
        None => Ok(RegistryConfig::default()),
    }
}

pub fn validate(path: &Path) -> Result<()> {
    let config = RegistryConfig::load(path)
        .with_context(|| format!("Configuration error in {}", path.display()))?;

    println!("Configuration is valid");
    println!("  root:         {}", config.root);
    println!("  claim-ttl:    {}s", config.claim_ttl.as_secs());
    match config.bid_ttl {
        Some(ttl) => println!("  bid-ttl:      {}s", ttl.as_secs()),
        None => println!("  bid-ttl:      none"),
    }
    println!("  event-buffer: {}", config.event_buffer);
    Ok(())
}
