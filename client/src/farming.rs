//! Farming session lifecycle: start, project, claim.

use anyhow::Context;
use serde_json::{json, Value};
use shared::{apply_farming_claim, farming_status, FarmingStatus, HistoryEntry, UserId};
use tracing::{info, instrument};

use crate::claim::ClaimOutcome;
use crate::history::append_history;
use crate::score::merge_score;
use crate::store::{paths, RemoteStore};

/// Stamps the session start. Ignored while a session is already
/// running: restarting mid-session would erase the accrued reward.
#[instrument(skip(store))]
pub async fn start_farming<S: RemoteStore>(
    store: &S,
    user: &UserId,
    now_ms: i64,
) -> anyhow::Result<bool> {
    if read_start_time(store, user).await?.is_some() {
        return Ok(false);
    }
    store
        .write(&paths::farming(user), json!({ "startTime": now_ms }))
        .await?;
    Ok(true)
}

/// Projects the current session state from the stored start timestamp.
pub async fn current_status<S: RemoteStore>(
    store: &S,
    user: &UserId,
    now_ms: i64,
) -> anyhow::Result<FarmingStatus> {
    Ok(farming_status(read_start_time(store, user).await?, now_ms))
}

/// Claims a finished session: credits the reward through the score
/// transaction, deletes the session node, and logs the claim. Ignored
/// while the session is still running or was never started.
#[instrument(skip(store))]
pub async fn claim_farming<S: RemoteStore>(
    store: &S,
    user: &UserId,
    now_ms: i64,
) -> anyhow::Result<ClaimOutcome> {
    let status = farming_status(read_start_time(store, user).await?, now_ms);
    let Some(points) = status.claimable_points() else {
        return Ok(ClaimOutcome::Ignored);
    };

    store
        .transact(
            &paths::score(user),
            Box::new(move |current| {
                merge_score(current, |prev| Some(apply_farming_claim(prev, points, now_ms)))
            }),
        )
        .await?
        .context("score record could not be decoded, farming reward not credited")?;

    store.remove(&paths::farming(user)).await?;

    append_history(
        store,
        user,
        HistoryEntry::new("Farming Claimed", points, "Farming", now_ms),
    )
    .await?;

    info!(user = %user, points, "farming reward claimed");
    Ok(ClaimOutcome::Completed)
}

async fn read_start_time<S: RemoteStore>(store: &S, user: &UserId) -> anyhow::Result<Option<i64>> {
    Ok(store
        .read(&paths::farming(user))
        .await?
        .as_ref()
        .and_then(|v| v.get("startTime"))
        .and_then(Value::as_i64))
}
