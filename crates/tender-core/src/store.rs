//! Key-value store contract.
//!
//! The registry never talks to a concrete backend. It is handed an
//! `Arc<dyn KeyValueStore>` at construction and uses only the operations below.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::StoreResult;

/// A node returned from a read. Directories carry children, files carry a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Absolute key of this node.
    pub key: String,
    /// Value for files, `None` for directories.
    pub value: Option<String>,
    pub dir: bool,
    /// Children of a directory. Populated one level deep for plain reads and
    /// fully for recursive reads.
    pub nodes: Vec<Node>,
    /// Store index of the last modification.
    pub modified_index: u64,
}

impl Node {
    /// Last path segment of the key.
    pub fn name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or_default()
    }

    /// Direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name() == name)
    }
}

/// Kind of change reported on the watch feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Set,
    Create,
    Delete,
    Expire,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Set => "set",
            Action::Create => "create",
            Action::Delete => "delete",
            Action::Expire => "expire",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change delivered by the watch feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub action: Action,
    pub key: String,
    pub value: Option<String>,
    pub index: u64,
}

impl Mutation {
    pub fn new(action: Action, key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            action,
            key: key.into(),
            value,
            index: 0,
        }
    }
}

/// Trait for hierarchical key-value store backends.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key. Directories are returned with their children; `recursive`
    /// controls whether grandchildren are included.
    async fn get(&self, key: &str, recursive: bool) -> StoreResult<Node>;

    /// Write a value, replacing whatever was there. `ttl` bounds the key's life.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<Node>;

    /// Atomically write a value only if the key does not exist.
    async fn create(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<Node>;

    /// Delete a key. Directories require `recursive`.
    async fn delete(&self, key: &str, recursive: bool) -> StoreResult<()>;

    /// Stream every change at or below `prefix`, in the order applied.
    fn watch(&self, prefix: &str) -> BoxStream<'static, Mutation>;
}
