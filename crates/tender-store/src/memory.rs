//! Hierarchical key-value store held in process memory.
//!
//! Keys are absolute, slash-separated paths. Directories are implicit: a
//! directory exists while at least one live key sits below it. Expired keys are
//! reaped lazily at the start of every operation, which is also when their
//! `expire` notifications are published.

use async_trait::async_trait;
use futures::StreamExt;
use futures::future;
use futures::stream::BoxStream;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tender_core::{Action, KeyValueStore, Mutation, Node, StoreError, StoreResult};
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, trace, warn};

const DEFAULT_WATCH_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
    modified_index: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    index: u64,
}

/// In-memory [`KeyValueStore`].
pub struct MemoryStore {
    inner: Mutex<Inner>,
    events: broadcast::Sender<Mutation>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_watch_capacity(DEFAULT_WATCH_CAPACITY)
    }

    /// Create a store whose watchers may fall at most `capacity` changes behind
    /// before they start missing notifications.
    pub fn with_watch_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Mutex::new(Inner::default()),
            events,
        }
    }

    fn publish(&self, mutation: Mutation) {
        trace!(action = %mutation.action, key = %mutation.key, "Store mutation");
        // No watchers is not an error.
        let _ = self.events.send(mutation);
    }

    fn reap(&self, inner: &mut Inner) {
        let now = Instant::now();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at.is_some_and(|at| at <= now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in expired {
            inner.entries.remove(&key);
            inner.index += 1;
            debug!(key = %key, "Key expired");
            self.publish(Mutation {
                action: Action::Expire,
                key,
                value: None,
                index: inner.index,
            });
        }
    }

    async fn write(
        &self,
        action: Action,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<Node> {
        let key = normalize_key(key)?;
        let mut inner = self.inner.lock().await;
        self.reap(&mut inner);

        if action == Action::Create
            && (inner.entries.contains_key(&key) || has_descendants(&inner.entries, &key))
        {
            return Err(StoreError::AlreadyExists(key));
        }
        if has_descendants(&inner.entries, &key) {
            return Err(StoreError::NotAFile(key));
        }
        if let Some(ancestor) = file_ancestor(&inner.entries, &key) {
            return Err(StoreError::NotADirectory(ancestor));
        }

        inner.index += 1;
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
            modified_index: inner.index,
        };
        let node = file_node(&key, &entry);
        inner.entries.insert(key.clone(), entry);

        self.publish(Mutation {
            action,
            key,
            value: Some(value.to_string()),
            index: inner.index,
        });
        Ok(node)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str, recursive: bool) -> StoreResult<Node> {
        let key = normalize_dir_key(key)?;
        let mut inner = self.inner.lock().await;
        self.reap(&mut inner);

        if let Some(entry) = inner.entries.get(&key) {
            return Ok(file_node(&key, entry));
        }
        if !has_descendants(&inner.entries, &key) {
            return Err(StoreError::NotFound(display_key(&key)));
        }
        Ok(dir_node(&key, &inner.entries, recursive, true))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<Node> {
        self.write(Action::Set, key, value, ttl).await
    }

    async fn create(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<Node> {
        self.write(Action::Create, key, value, ttl).await
    }

    async fn delete(&self, key: &str, recursive: bool) -> StoreResult<()> {
        let key = normalize_key(key)?;
        let mut inner = self.inner.lock().await;
        self.reap(&mut inner);

        if inner.entries.remove(&key).is_none() {
            if !has_descendants(&inner.entries, &key) {
                return Err(StoreError::NotFound(key));
            }
            if !recursive {
                return Err(StoreError::NotAFile(key));
            }
            let prefix = format!("{key}/");
            inner.entries.retain(|k, _| !k.starts_with(&prefix));
        }

        inner.index += 1;
        let index = inner.index;
        self.publish(Mutation {
            action: Action::Delete,
            key,
            value: None,
            index,
        });
        Ok(())
    }

    fn watch(&self, prefix: &str) -> BoxStream<'static, Mutation> {
        let prefix = prefix.trim_end_matches('/').to_string();
        BroadcastStream::new(self.events.subscribe())
            .filter_map(move |item| {
                let mutation = match item {
                    Ok(m) if within(&m.key, &prefix) => Some(m),
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Watcher fell behind, notifications dropped");
                        None
                    }
                };
                future::ready(mutation)
            })
            .boxed()
    }
}

/// Keys that name a file: absolute, no empty segments.
fn normalize_key(key: &str) -> StoreResult<String> {
    let key = key.trim_end_matches('/');
    if !key.starts_with('/') || key.split('/').skip(1).any(str::is_empty) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(key.to_string())
}

/// Like [`normalize_key`] but `/` is accepted and maps to the store root.
fn normalize_dir_key(key: &str) -> StoreResult<String> {
    if key.trim_end_matches('/').is_empty() {
        return Ok(String::new());
    }
    normalize_key(key)
}

fn display_key(key: &str) -> String {
    if key.is_empty() { "/".to_string() } else { key.to_string() }
}

fn within(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn has_descendants(entries: &BTreeMap<String, Entry>, key: &str) -> bool {
    let prefix = format!("{key}/");
    entries
        .range(prefix.clone()..)
        .next()
        .is_some_and(|(k, _)| k.starts_with(&prefix))
}

fn file_ancestor(entries: &BTreeMap<String, Entry>, key: &str) -> Option<String> {
    key.match_indices('/')
        .map(|(i, _)| &key[..i])
        .filter(|ancestor| !ancestor.is_empty())
        .find(|ancestor| entries.contains_key(*ancestor))
        .map(str::to_string)
}

fn file_node(key: &str, entry: &Entry) -> Node {
    Node {
        key: key.to_string(),
        value: Some(entry.value.clone()),
        dir: false,
        nodes: Vec::new(),
        modified_index: entry.modified_index,
    }
}

fn dir_node(key: &str, entries: &BTreeMap<String, Entry>, recursive: bool, expand: bool) -> Node {
    let prefix = format!("{key}/");
    let mut nodes = Vec::new();
    let mut modified_index = 0;
    let mut seen = BTreeSet::new();

    for (k, entry) in entries
        .range(prefix.clone()..)
        .take_while(|(k, _)| k.starts_with(&prefix))
    {
        modified_index = modified_index.max(entry.modified_index);
        if !expand {
            continue;
        }
        match k[prefix.len()..].split_once('/') {
            None => nodes.push(file_node(k, entry)),
            Some((child, _)) => {
                if seen.insert(child.to_string()) {
                    let child_key = format!("{prefix}{child}");
                    nodes.push(dir_node(&child_key, entries, recursive, recursive));
                }
            }
        }
    }

    Node {
        key: display_key(key),
        value: None,
        dir: true,
        nodes,
        modified_index,
    }
}
