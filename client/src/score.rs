//! Transactional call sites against the user's score record.
//!
//! Each merge rule lives in `shared::score` as a pure function of the
//! previous record; this module only routes it through the store's
//! optimistic transaction primitive.

use anyhow::Context;
use serde_json::{json, Value};
use shared::{
    apply_game_result, apply_ticket_spend, is_same_day, HistoryEntry, ScoreRecord, UserId,
};
use tracing::instrument;

use crate::history::append_history;
use crate::store::{paths, RemoteStore, Transact};

pub(crate) fn decode_score(value: Option<Value>) -> Option<ScoreRecord> {
    value.and_then(|v| serde_json::from_value(v).ok())
}

pub(crate) fn encode_score(record: ScoreRecord) -> Transact {
    match serde_json::to_value(record) {
        Ok(value) => Transact::Commit(value),
        Err(_) => Transact::Abort,
    }
}

/// Runs one merge rule inside a score transaction. A stored value the
/// record type cannot decode aborts the transaction: merging against a
/// fresh default would overwrite the user's accumulated scores.
pub(crate) fn merge_score<F>(current: Option<Value>, merge: F) -> Transact
where
    F: FnOnce(Option<ScoreRecord>) -> Option<ScoreRecord>,
{
    let prev = match current {
        None => None,
        Some(value) => match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(_) => return Transact::Abort,
        },
    };
    match merge(prev) {
        Some(next) => encode_score(next),
        None => Transact::Abort,
    }
}

/// Credits a finished game round and stamps the daily "played" sentinel
/// that unlocks the game task.
#[instrument(skip(store))]
pub async fn record_game_result<S: RemoteStore>(
    store: &S,
    user: &UserId,
    game_score: u64,
    now_ms: i64,
) -> anyhow::Result<()> {
    store
        .transact(
            &paths::score(user),
            Box::new(move |current| {
                merge_score(current, |prev| Some(apply_game_result(prev, game_score)))
            }),
        )
        .await?
        .context("score record could not be decoded, game result not credited")?;

    store
        .write(
            &paths::daily_tasks(user),
            json!({ "game": { "lastPlayed": now_ms } }),
        )
        .await?;

    append_history(
        store,
        user,
        HistoryEntry::new("Game Points Successfully Added", game_score, "game", now_ms),
    )
    .await
}

/// Spends one game ticket. Returns `false` (and changes nothing) when
/// the user has no tickets left.
#[instrument(skip(store))]
pub async fn spend_ticket<S: RemoteStore>(store: &S, user: &UserId) -> anyhow::Result<bool> {
    let committed = store
        .transact(
            &paths::score(user),
            Box::new(|current| merge_score(current, apply_ticket_spend)),
        )
        .await?;
    Ok(committed.is_some())
}

/// Best game round recorded so far, 0 when the record does not exist.
pub async fn fetch_high_score<S: RemoteStore>(store: &S, user: &UserId) -> anyhow::Result<u64> {
    let record = decode_score(store.read(&paths::score(user)).await?);
    Ok(record.map(|r| r.game_highest_score).unwrap_or(0))
}

/// Whether the user finished a game round today, per the daily sentinel.
pub async fn game_played_today<S: RemoteStore>(
    store: &S,
    user: &UserId,
    now_ms: i64,
) -> anyhow::Result<bool> {
    let sentinel = store.read(&paths::daily_game(user)).await?;
    Ok(sentinel
        .as_ref()
        .and_then(|v| v.get("lastPlayed"))
        .and_then(Value::as_i64)
        .is_some_and(|last| is_same_day(last, now_ms)))
}
