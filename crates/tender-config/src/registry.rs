//! Registry configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tender_core::Keyspace;

const DEFAULT_ROOT: &str = "/tender";
const DEFAULT_CLAIM_TTL: Duration = Duration::from_secs(30);
const DEFAULT_EVENT_BUFFER: usize = 100;

/// Settings shared by every participant in one auction namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Store prefix under which offers and leases live.
    pub root: String,
    /// Lease duration used when claiming an offer.
    pub claim_ttl: Duration,
    /// Lifetime of bid markers. `None` keeps them until the offer is resolved.
    pub bid_ttl: Option<Duration>,
    /// Capacity of the derived event channel.
    pub event_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            claim_ttl: DEFAULT_CLAIM_TTL,
            bid_ttl: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl RegistryConfig {
    /// Read and parse a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        parse_registry_config(&text)
    }

    pub fn keyspace(&self) -> Keyspace {
        Keyspace::new(&self.root)
    }
}

/// Parse registry configuration from KDL text. Missing settings take defaults.
pub fn parse_registry_config(kdl: &str) -> ConfigResult<RegistryConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let registry = doc
        .nodes()
        .iter()
        .find(|n| n.name().value() == "registry")
        .ok_or_else(|| ConfigError::MissingField("registry".to_string()))?;

    let mut config = RegistryConfig::default();

    if let Some(children) = registry.children() {
        for child in children.nodes() {
            match child.name().value() {
                "root" => {
                    config.root = get_first_string_arg(child)
                        .ok_or_else(|| ConfigError::MissingField("root value".to_string()))?;
                }
                "claim-ttl" | "claim_ttl" => {
                    config.claim_ttl = get_seconds(child, "claim-ttl")?;
                }
                "bid-ttl" | "bid_ttl" => {
                    config.bid_ttl = Some(get_seconds(child, "bid-ttl")?);
                }
                "event-buffer" | "event_buffer" => {
                    config.event_buffer = get_positive_int(child, "event-buffer")? as usize;
                }
                _ => {} // Ignore unknown nodes
            }
        }
    }

    if !config.root.starts_with('/') {
        return Err(ConfigError::InvalidValue {
            field: "root".to_string(),
            message: format!("must be an absolute path, got '{}'", config.root),
        });
    }

    Ok(config)
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_positive_int(node: &KdlNode, field: &str) -> ConfigResult<u64> {
    let value = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
        .ok_or_else(|| ConfigError::MissingField(format!("{field} value")))?;

    if value <= 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("must be positive, got {value}"),
        });
    }

    u64::try_from(value).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("out of range: {value}"),
    })
}

fn get_seconds(node: &KdlNode, field: &str) -> ConfigResult<Duration> {
    get_positive_int(node, field).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let kdl = r#"
            registry {
                root "/_coreos.com/fleet"
                claim-ttl 10
                bid-ttl 60
                event-buffer 16
            }
        "#;

        let config = parse_registry_config(kdl).unwrap();
        assert_eq!(config.root, "/_coreos.com/fleet");
        assert_eq!(config.claim_ttl, Duration::from_secs(10));
        assert_eq!(config.bid_ttl, Some(Duration::from_secs(60)));
        assert_eq!(config.event_buffer, 16);
        assert_eq!(config.keyspace().offers(), "/_coreos.com/fleet/offer");
    }

    #[test]
    fn test_defaults_apply() {
        let config = parse_registry_config("registry").unwrap();
        assert_eq!(config, RegistryConfig::default());
        assert_eq!(config.bid_ttl, None);
    }

    #[test]
    fn test_missing_registry_node() {
        let result = parse_registry_config(r#"cluster "x""#);
        assert!(matches!(result.unwrap_err(), ConfigError::MissingField(_)));
    }

    #[test]
    fn test_relative_root_rejected() {
        let kdl = r#"
            registry {
                root "tender"
            }
        "#;
        assert!(matches!(
            parse_registry_config(kdl).unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "root"
        ));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let kdl = r#"
            registry {
                claim-ttl 0
            }
        "#;
        assert!(matches!(
            parse_registry_config(kdl).unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "claim-ttl"
        ));
    }

    #[test]
    fn test_ttl_must_be_integer() {
        let kdl = r#"
            registry {
                bid-ttl "soon"
            }
        "#;
        assert!(matches!(
            parse_registry_config(kdl).unwrap_err(),
            ConfigError::MissingField(_)
        ));
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            parse_registry_config("registry {").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }
}
