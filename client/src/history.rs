//! Write-only audit trail under `users/{id}/history`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use shared::{HistoryEntry, UserId};

use crate::store::{paths, RemoteStore};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Keys sort chronologically; the sequence suffix keeps entries written
/// within the same millisecond distinct.
fn entry_key(timestamp_ms: i64) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{timestamp_ms:013}-{seq:06}")
}

/// Appends one entry. Required side effect of every successful claim.
pub async fn append_history<S: RemoteStore + ?Sized>(
    store: &S,
    user: &UserId,
    entry: HistoryEntry,
) -> anyhow::Result<()> {
    let mut fields = Map::new();
    fields.insert(entry_key(entry.timestamp), serde_json::to_value(&entry)?);
    store.write(&paths::history(user), Value::Object(fields)).await
}
