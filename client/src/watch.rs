//! Timed-video unlock gate: a fixed watch requirement before the task's
//! claimable sentinel may be written.

use shared::{TaskId, UserId};

use crate::claim::unlock_task;
use crate::store::RemoteStore;

/// Seconds of watch time required before the reward unlocks.
pub const WATCH_REQUIRED_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchGate {
    Waiting { remaining_secs: i64 },
    Complete,
}

/// Projects the gate from when the video was opened, like the farming
/// countdown: re-derived from timestamps, never from a ticked counter.
pub fn watch_gate(opened_at_ms: i64, now_ms: i64) -> WatchGate {
    let elapsed_secs = ((now_ms - opened_at_ms) / 1000).max(0);
    if elapsed_secs >= WATCH_REQUIRED_SECS {
        WatchGate::Complete
    } else {
        WatchGate::Waiting {
            remaining_secs: WATCH_REQUIRED_SECS - elapsed_secs,
        }
    }
}

/// Writes the unlocked sentinel once the watch requirement has elapsed.
/// Returns `false` (no write) while the gate is still counting down.
pub async fn complete_watch<S: RemoteStore>(
    store: &S,
    user: &UserId,
    task_id: &TaskId,
    opened_at_ms: i64,
    now_ms: i64,
) -> anyhow::Result<bool> {
    if watch_gate(opened_at_ms, now_ms) != WatchGate::Complete {
        return Ok(false);
    }
    unlock_task(store, user, task_id).await?;
    Ok(true)
}
