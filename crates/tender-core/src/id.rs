//! Job and machine identifiers.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An identity that cannot be used as a single store path segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidIdentity {
    #[error("identity is empty")]
    Empty,

    #[error("identity '{0}' contains '/'")]
    Separator(String),
}

fn check_segment(value: &str) -> Result<(), InvalidIdentity> {
    if value.is_empty() {
        Err(InvalidIdentity::Empty)
    } else if value.contains('/') {
        Err(InvalidIdentity::Separator(value.to_string()))
    } else {
        Ok(())
    }
}

/// Globally unique name of a job. Partition key for every offer and bid path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
#[display("{_0}")]
pub struct JobId(String);

impl JobId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Job ids name a directory in the store: non-empty, no `/`.
    pub fn validate(&self) -> Result<(), InvalidIdentity> {
        check_segment(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of a machine taking part in the auction (for example its boot id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
#[display("{_0}")]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Machine ids name a bid marker key: non-empty, no `/`.
    pub fn validate(&self) -> Result<(), InvalidIdentity> {
        check_segment(&self.0)
    }
}

impl From<&str> for MachineId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for MachineId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment_identities_are_valid() {
        assert!(JobId::from("web").validate().is_ok());
        assert!(MachineId::from("4f1c-boot").validate().is_ok());
    }

    #[test]
    fn test_empty_identities_are_rejected() {
        assert_eq!(JobId::from("").validate(), Err(InvalidIdentity::Empty));
        assert_eq!(MachineId::from("").validate(), Err(InvalidIdentity::Empty));
    }

    #[test]
    fn test_identities_with_separator_are_rejected() {
        assert_eq!(
            JobId::from("team/web").validate(),
            Err(InvalidIdentity::Separator("team/web".to_string()))
        );
        assert!(matches!(
            MachineId::from("rack/node1").validate(),
            Err(InvalidIdentity::Separator(_))
        ));
    }
}
