//! Contract of the hosted realtime store the client runs against.
//!
//! The core never performs a plain read-then-write for score mutation:
//! every mutation of shared state goes through [`RemoteStore::transact`],
//! which the backing store retries on conflicting concurrent writers.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

pub mod memory;

pub use memory::MemoryStore;

/// Outcome of a transaction closure: commit the returned value or leave
/// the stored value untouched.
pub enum Transact {
    Commit(Value),
    Abort,
}

/// The closure a transaction re-runs against the latest snapshot until
/// it commits without a conflicting writer.
pub type TransactFn = Box<dyn FnMut(Option<Value>) -> Transact + Send>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// One-shot point read. `None` when nothing is stored at `path`.
    async fn read(&self, path: &str) -> anyhow::Result<Option<Value>>;

    /// Shallow-merges the fields of `partial` into the value at `path`.
    /// A `null` field value deletes that key.
    async fn write(&self, path: &str, partial: Value) -> anyhow::Result<()>;

    /// Deletes the value at `path`.
    async fn remove(&self, path: &str) -> anyhow::Result<()>;

    /// Optimistic read-modify-write. `f` is applied to the current value
    /// and re-run with a fresh snapshot whenever a concurrent writer got
    /// there first. Returns the committed value, or `None` if `f`
    /// aborted.
    async fn transact(&self, path: &str, f: TransactFn) -> anyhow::Result<Option<Value>>;

    /// Change feed for `path`: fires immediately with the current value,
    /// then on every subsequent change. Dropping the handle
    /// unsubscribes; no callbacks fire afterwards.
    async fn subscribe(&self, path: &str) -> anyhow::Result<Subscription>;
}

/// Live handle to one subscribed path.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Option<Value>>,
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Option<Value>>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Next value at the subscribed path. `None` when the store shut down.
    pub async fn next(&mut self) -> Option<Option<Value>> {
        self.rx.recv().await
    }
}

/// Each item is the full value at the path after a change (`None` when
/// the node was deleted), so the feed composes with stream adapters.
impl futures::Stream for Subscription {
    type Item = Option<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

/// Persisted path layout, stable across the whole system.
pub mod paths {
    use shared::{TaskId, UserId};

    pub const TASK_CATALOG: &str = "tasks";

    pub fn score(user: &UserId) -> String {
        format!("users/{user}/Score")
    }

    pub fn history(user: &UserId) -> String {
        format!("users/{user}/history")
    }

    pub fn farming(user: &UserId) -> String {
        format!("connections/{user}/farming")
    }

    /// Per-task claim records live directly under the connection node,
    /// keyed by task id.
    pub fn connections(user: &UserId) -> String {
        format!("connections/{user}")
    }

    pub fn claim_record(user: &UserId, task: &TaskId) -> String {
        format!("connections/{user}/{task}")
    }

    pub fn daily_tasks(user: &UserId) -> String {
        format!("connections/{user}/tasks/daily")
    }

    pub fn daily_game(user: &UserId) -> String {
        format!("connections/{user}/tasks/daily/game")
    }

    pub fn daily_news(user: &UserId) -> String {
        format!("connections/{user}/tasks/daily/news")
    }
}
