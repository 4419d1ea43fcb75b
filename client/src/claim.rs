//! Claim orchestration for catalog tasks.
//!
//! Per (user, task) the flow is `Idle -> Processing -> {Succeeded,
//! Failed}`. A processing set absorbs rapid duplicate submissions, and
//! the claim-record transition `Unlocked -> Claimed` is a precondition
//! inside the store transaction, so two sessions racing on the same
//! task produce exactly one score credit.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::anyhow;
use serde_json::{Map, Value};
use shared::{
    apply_task_claim, ClaimRecord, HistoryEntry, TaskDefinition, TaskId, TaskType, UserId,
};
use tracing::{error, info, instrument, warn};

use crate::history::append_history;
use crate::score::{game_played_today, merge_score};
use crate::store::{paths, RemoteStore, Transact};

/// How long a failed claim shows "Failed" before offering a retry.
pub const FAILED_REVERT_DELAY: Duration = Duration::from_secs(2);

/// Stories a user must read before the daily news task unlocks.
pub const NEWS_REQUIRED: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim committed: score credited, record stamped, history logged.
    Completed,
    /// Precondition not met (ineligible, already processing, or another
    /// session won the race). Deliberately a silent no-op.
    Ignored,
}

/// Caller-visible per-task button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    #[default]
    Idle,
    Processing,
    Failed,
    TryAgain,
}

pub struct ClaimOrchestrator<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for ClaimOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    store: Arc<S>,
    user: UserId,
    processing: Mutex<HashSet<TaskId>>,
    statuses: Mutex<HashMap<TaskId, ButtonState>>,
    /// Pending Failed-to-TryAgain timers, aborted when superseded or when
    /// the orchestrator is torn down.
    reverts: Mutex<HashMap<TaskId, tokio::task::JoinHandle<()>>>,
}

impl<S> Drop for Inner<S> {
    fn drop(&mut self) {
        for (_, handle) in lock(&self.reverts).drain() {
            handle.abort();
        }
    }
}

impl<S: RemoteStore + 'static> ClaimOrchestrator<S> {
    pub fn new(store: Arc<S>, user: UserId) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                user,
                processing: Mutex::default(),
                statuses: Mutex::default(),
                reverts: Mutex::default(),
            }),
        }
    }

    pub fn status(&self, task_id: &TaskId) -> ButtonState {
        lock(&self.inner.statuses).get(task_id).copied().unwrap_or_default()
    }

    /// Runs the full claim sequence for one task.
    ///
    /// Returns `Ok(Ignored)` for precondition violations, `Err` only for
    /// connectivity failures; the processing guard is cleared on every
    /// exit path.
    #[instrument(skip(self, task), fields(user = %self.inner.user))]
    pub async fn claim_task(
        &self,
        task: &TaskDefinition,
        now_ms: i64,
    ) -> anyhow::Result<ClaimOutcome> {
        let Some(task_id) = task.id() else {
            warn!("catalog entry without an id, skipping claim");
            return Ok(ClaimOutcome::Ignored);
        };

        if !lock(&self.inner.processing).insert(task_id.clone()) {
            return Ok(ClaimOutcome::Ignored);
        }
        self.set_status(&task_id, ButtonState::Processing);

        let result = self.claim_inner(task, &task_id, now_ms).await;

        lock(&self.inner.processing).remove(&task_id);
        match &result {
            Ok(_) => self.set_status(&task_id, ButtonState::Idle),
            Err(err) => {
                error!("claim of task {task_id} failed: {err:#}");
                self.set_status(&task_id, ButtonState::Failed);
                self.spawn_failed_revert(task_id.clone());
            }
        }
        result
    }

    async fn claim_inner(
        &self,
        task: &TaskDefinition,
        task_id: &TaskId,
        now_ms: i64,
    ) -> anyhow::Result<ClaimOutcome> {
        let store = self.inner.store.as_ref();
        let user = &self.inner.user;

        let record = ClaimRecord::decode(
            store
                .read(&paths::claim_record(user, task_id))
                .await?
                .as_ref(),
        );
        if !record.is_unlocked() {
            return Ok(ClaimOutcome::Ignored);
        }

        if task.task_type == TaskType::News && news_progress(store, user).await? < NEWS_REQUIRED {
            return Ok(ClaimOutcome::Ignored);
        }

        // Gating act first: flip the sentinel to Claimed with the
        // precondition checked inside the transaction. If the score
        // credit below fails we compensate by reopening the record, so
        // a retry can never credit twice.
        let version = task.version;
        let claimed = store
            .transact(
                &paths::claim_record(user, task_id),
                Box::new(move |current| {
                    if ClaimRecord::decode(current.as_ref()).is_unlocked() {
                        Transact::Commit(ClaimRecord::encode_claimed(now_ms, version))
                    } else {
                        Transact::Abort
                    }
                }),
            )
            .await?;
        if claimed.is_none() {
            // Another session won the race.
            return Ok(ClaimOutcome::Ignored);
        }

        let points = task.reward();
        let credited = store
            .transact(
                &paths::score(user),
                Box::new(move |current| {
                    merge_score(current, |prev| Some(apply_task_claim(prev, points, now_ms)))
                }),
            )
            .await
            .and_then(|committed| {
                // An aborted merge means the stored record is undecodable;
                // the claim must not stay stamped without its credit.
                committed
                    .map(|_| ())
                    .ok_or_else(|| anyhow!("score record for {user} could not be decoded"))
            });

        if let Err(err) = credited {
            if let Err(revert) = self.reopen_claim(task_id).await {
                error!("failed to reopen claim record for {task_id}: {revert:#}");
            }
            return Err(err);
        }

        // The claim already committed; a lost audit entry is logged but
        // must not fail the claim.
        let entry = HistoryEntry::new("Task Claimed", points, task.task_type.as_str(), now_ms);
        if let Err(err) = append_history(store, user, entry).await {
            warn!("history append failed for task {task_id}: {err:#}");
        }

        info!(task = %task_id, points, "task claimed");
        Ok(ClaimOutcome::Completed)
    }

    async fn reopen_claim(&self, task_id: &TaskId) -> anyhow::Result<()> {
        self.inner
            .store
            .transact(
                &paths::claim_record(&self.inner.user, task_id),
                Box::new(|current| match ClaimRecord::decode(current.as_ref()) {
                    ClaimRecord::Claimed { .. } => {
                        Transact::Commit(ClaimRecord::encode_unlocked())
                    }
                    _ => Transact::Abort,
                }),
            )
            .await?;
        Ok(())
    }

    fn set_status(&self, task_id: &TaskId, state: ButtonState) {
        lock(&self.inner.statuses).insert(task_id.clone(), state);
    }

    fn spawn_failed_revert(&self, task_id: TaskId) {
        // The timer holds only a weak handle, so the orchestrator is not
        // kept alive by its own pending timers.
        let inner = Arc::downgrade(&self.inner);
        let timer_task = task_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(FAILED_REVERT_DELAY).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut statuses = lock(&inner.statuses);
            if statuses.get(&timer_task) == Some(&ButtonState::Failed) {
                statuses.insert(timer_task, ButtonState::TryAgain);
            }
        });
        if let Some(stale) = lock(&self.inner.reverts).insert(task_id, handle) {
            stale.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a task claimable (the `false` sentinel), the shared unlock step
/// used by membership verification, video completion, and the game and
/// news flows.
pub async fn unlock_task<S: RemoteStore + ?Sized>(
    store: &S,
    user: &UserId,
    task_id: &TaskId,
) -> anyhow::Result<()> {
    let mut fields = Map::new();
    fields.insert(task_id.clone(), ClaimRecord::encode_unlocked());
    store.write(&paths::connections(user), Value::Object(fields)).await
}

/// Unlocks the daily game task once a round has been played today.
pub async fn unlock_if_game_played<S: RemoteStore>(
    store: &S,
    user: &UserId,
    task_id: &TaskId,
    now_ms: i64,
) -> anyhow::Result<bool> {
    if !game_played_today(store, user, now_ms).await? {
        return Ok(false);
    }
    unlock_task(store, user, task_id).await?;
    Ok(true)
}

/// Stories read today, counted from the daily news node.
pub async fn news_progress<S: RemoteStore + ?Sized>(
    store: &S,
    user: &UserId,
) -> anyhow::Result<usize> {
    Ok(store
        .read(&paths::daily_news(user))
        .await?
        .as_ref()
        .and_then(Value::as_object)
        .map_or(0, Map::len))
}

/// Unlocks the daily news task once the reading quota is met.
pub async fn unlock_if_news_quota_met<S: RemoteStore>(
    store: &S,
    user: &UserId,
    task_id: &TaskId,
) -> anyhow::Result<bool> {
    if news_progress(store, user).await? < NEWS_REQUIRED {
        return Ok(false);
    }
    unlock_task(store, user, task_id).await?;
    Ok(true)
}
