use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::timeperiod::{is_same_day, is_same_week, ResetPeriod};
use crate::TaskId;

/// Reward credited when the catalog entry carries neither `points` nor
/// the legacy `score` field.
pub const DEFAULT_TASK_REWARD: u64 = 100;

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Watch,
    Social,
    Partnership,
    Misc,
    Game,
    News,
    #[default]
    #[serde(other)]
    Other,
}

impl TaskType {
    /// Label used in history log entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Watch => "watch",
            TaskType::Social => "social",
            TaskType::Partnership => "partnership",
            TaskType::Misc => "misc",
            TaskType::Game => "game",
            TaskType::News => "news",
            TaskType::Other => "task",
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Daily,
    Weekly,
    Achievements,
    #[default]
    #[serde(other)]
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetConfig {
    pub period: ResetPeriod,
}

/// Admin-authored catalog entry, read-only from the client's side.
///
/// The catalog is hand-edited, so every field is decoded leniently:
/// ids may be numbers, rewards may be numeric strings, and unknown
/// type/category strings fall back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskDefinition {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub category: TaskCategory,
    #[serde(default)]
    points: Option<Value>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    pub reset_config: Option<ResetConfig>,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "videoUrl", default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl TaskDefinition {
    pub fn id(&self) -> Option<TaskId> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Reward in points: `points`, else legacy `score`, else 100.
    /// Non-numeric values count as 0.
    pub fn reward(&self) -> u64 {
        match self.points.as_ref().or(self.score.as_ref()) {
            None => DEFAULT_TASK_REWARD,
            Some(raw) => as_points(raw),
        }
    }

    /// Catalog entries are keyed by id in the tree; entries missing an
    /// explicit `id` field inherit their key.
    pub fn with_fallback_id(mut self, key: &str) -> Self {
        if self.id.is_none() {
            self.id = Some(Value::String(key.to_owned()));
        }
        self
    }
}

fn as_points(raw: &Value) -> u64 {
    match raw {
        Value::Number(n) => n.as_f64().map(|f| f.max(0.0) as u64).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f.max(0.0) as u64).unwrap_or(0),
        _ => 0,
    }
}

/// Per-user claim record for one task, decoded from the wire encoding
/// at the store boundary.
///
/// Wire forms: absent/null, legacy boolean `true` (claimed before reset
/// support existed), boolean `false` (unlocked and awaiting claim), or
/// `{lastClaimed, status, version}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimRecord {
    Unclaimed,
    Unlocked,
    LegacyDone,
    Claimed {
        last_claimed_ms: Option<i64>,
        version: u32,
    },
}

impl ClaimRecord {
    pub fn decode(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => ClaimRecord::Unclaimed,
            Some(Value::Bool(false)) => ClaimRecord::Unlocked,
            Some(Value::Bool(true)) => ClaimRecord::LegacyDone,
            Some(Value::Object(map)) => ClaimRecord::Claimed {
                last_claimed_ms: map.get("lastClaimed").and_then(Value::as_i64),
                version: map
                    .get("version")
                    .and_then(Value::as_u64)
                    .unwrap_or_default() as u32,
            },
            Some(_) => ClaimRecord::Unclaimed,
        }
    }

    /// Wire form written on a successful claim.
    pub fn encode_claimed(now_ms: i64, version: u32) -> Value {
        json!({
            "lastClaimed": now_ms,
            "status": "claimed",
            "version": version,
        })
    }

    /// Wire form of the claimable sentinel.
    pub fn encode_unlocked() -> Value {
        Value::Bool(false)
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self, ClaimRecord::Unlocked)
    }

    fn claimed_version(&self) -> u32 {
        match self {
            ClaimRecord::Claimed { version, .. } => *version,
            // Legacy boolean claims predate versioning.
            _ => 0,
        }
    }
}

/// Legacy type set that reset daily before `reset_config` existed.
const LEGACY_DAILY_TYPES: [TaskType; 3] = [TaskType::Game, TaskType::News, TaskType::Partnership];

/// Decides whether a task is completed and locked for this user.
///
/// Pure: depends only on the definition, the claim record, and `now_ms`
/// (which only the daily/weekly period predicates consult).
pub fn is_task_done(task: &TaskDefinition, record: &ClaimRecord, now_ms: i64) -> bool {
    if matches!(record, ClaimRecord::Unclaimed | ClaimRecord::Unlocked) {
        return false;
    }

    // An admin bump of the definition version forces a re-claim.
    if task.version > record.claimed_version() {
        return false;
    }

    if let Some(reset) = &task.reset_config {
        // Legacy boolean claims carry no timestamp, so a scoped task
        // treats them as expired.
        let ClaimRecord::Claimed {
            last_claimed_ms: Some(last),
            ..
        } = record
        else {
            return false;
        };
        return match reset.period {
            ResetPeriod::Daily => is_same_day(*last, now_ms),
            ResetPeriod::Weekly => is_same_week(*last, now_ms),
            ResetPeriod::Once | ResetPeriod::Infinite | ResetPeriod::Other => true,
        };
    }

    if LEGACY_DAILY_TYPES.contains(&task.task_type) {
        return match record {
            ClaimRecord::Claimed {
                last_claimed_ms: Some(last),
                ..
            } => is_same_day(*last, now_ms),
            _ => false,
        };
    }

    // One-time task: claimed forever.
    true
}
