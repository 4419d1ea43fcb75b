//! In-process store implementing the remote-store contract over a JSON
//! tree. Backs the test suite and local development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::{RemoteStore, Subscription, Transact, TransactFn};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    root: Value,
    /// Bumped on every committed mutation; transactions retry when the
    /// version moved between their snapshot and their commit.
    version: u64,
    next_subscriber: u64,
    subscribers: HashMap<u64, Subscriber>,
}

struct Subscriber {
    path: Vec<String>,
    tx: mpsc::UnboundedSender<Option<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn read(&self, path: &str) -> anyhow::Result<Option<Value>> {
        let state = self.lock();
        Ok(get_at(&state.root, &split(path)).cloned())
    }

    async fn write(&self, path: &str, partial: Value) -> anyhow::Result<()> {
        let mut state = self.lock();
        let segments = split(path);
        match partial {
            Value::Object(fields) => {
                for (key, value) in fields {
                    let mut child = segments.clone();
                    child.push(key);
                    let value = if value.is_null() { None } else { Some(value) };
                    set_at(&mut state.root, &child, value);
                }
            }
            value => set_at(&mut state.root, &segments, Some(value)),
        }
        state.commit(&segments);
        Ok(())
    }

    async fn remove(&self, path: &str) -> anyhow::Result<()> {
        let mut state = self.lock();
        let segments = split(path);
        set_at(&mut state.root, &segments, None);
        state.commit(&segments);
        Ok(())
    }

    async fn transact(&self, path: &str, mut f: TransactFn) -> anyhow::Result<Option<Value>> {
        let segments = split(path);
        loop {
            let (snapshot, seen_version) = {
                let state = self.lock();
                (get_at(&state.root, &segments).cloned(), state.version)
            };

            // Suspension point: concurrent writers can slip in here, which
            // is exactly the conflict the retry loop absorbs.
            tokio::task::yield_now().await;

            let outcome = f(snapshot);

            let mut state = self.lock();
            if state.version != seen_version {
                continue;
            }
            return match outcome {
                Transact::Abort => Ok(None),
                Transact::Commit(value) => {
                    let committed = if value.is_null() { None } else { Some(value) };
                    set_at(&mut state.root, &segments, committed.clone());
                    state.commit(&segments);
                    Ok(committed)
                }
            };
        }
    }

    async fn subscribe(&self, path: &str) -> anyhow::Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let segments = split(path);
        let id = {
            let mut state = self.lock();
            let id = state.next_subscriber;
            state.next_subscriber += 1;
            // Fires immediately with the current value.
            let _ = tx.send(get_at(&state.root, &segments).cloned());
            state.subscribers.insert(
                id,
                Subscriber {
                    path: segments,
                    tx,
                },
            );
            id
        };

        let inner = Arc::clone(&self.inner);
        Ok(Subscription::new(rx, move || {
            inner.lock().unwrap().subscribers.remove(&id);
        }))
    }
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl State {
    fn commit(&mut self, changed: &[String]) {
        self.version += 1;
        self.subscribers.retain(|_, sub| {
            if !overlaps(&sub.path, changed) {
                return true;
            }
            let current = get_at(&self.root, &sub.path).cloned();
            sub.tx.send(current).is_ok()
        });
    }
}

/// A change at `changed` is visible to a subscriber of `watched` when
/// either path is an ancestor of (or equal to) the other.
fn overlaps(watched: &[String], changed: &[String]) -> bool {
    let shorter = watched.len().min(changed.len());
    watched[..shorter] == changed[..shorter]
}

fn split(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn get_at<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut node = root;
    for segment in path {
        node = node.as_object()?.get(segment)?;
    }
    Some(node)
}

/// Writes (or removes, for `None`) the value at `path`, creating
/// intermediate objects on the way down and pruning emptied ones on the
/// way back up so a removed node reads as absent.
fn set_at(root: &mut Value, path: &[String], value: Option<Value>) {
    let Some((key, rest)) = path.split_first() else {
        *root = value.unwrap_or(Value::Object(Map::new()));
        return;
    };

    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    let map = root.as_object_mut().expect("just coerced to an object");

    if rest.is_empty() {
        match value {
            Some(v) => {
                map.insert(key.clone(), v);
            }
            None => {
                map.remove(key);
            }
        }
        return;
    }

    let child = map
        .entry(key.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    set_at(child, rest, value);
    if child.as_object().is_some_and(Map::is_empty) {
        map.remove(key);
    }
}
