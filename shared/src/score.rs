use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::timeperiod::{is_same_day, is_same_week};

/// Unified score record stored at `users/{id}/Score`.
///
/// `extra` carries any fields this client does not know about, so a
/// transactional rewrite never drops data written by newer clients.
/// Numeric fields decode leniently (numbers, numeric strings, junk as
/// 0), like the catalog reward fields: the record predates this client
/// and has been hand-edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub farming_score: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub game_score: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub game_highest_score: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub network_score: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub news_score: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub task_score: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_score: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub no_of_tickets: u64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub task_updated_at: Option<i64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub weekly_points: u64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub weekly_updated_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_u64<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    let raw = Value::deserialize(de)?;
    Ok(match &raw {
        Value::Number(n) => n.as_f64().map(|f| f.max(0.0) as u64).unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().map(|f| f.max(0.0) as u64).unwrap_or(0),
        _ => 0,
    })
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    let raw = Value::deserialize(de)?;
    Ok(match &raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

impl ScoreRecord {
    /// The authoritative total: sum of all category sub-scores.
    pub fn category_sum(&self) -> u64 {
        self.farming_score + self.game_score + self.network_score + self.news_score
            + self.task_score
    }

    /// Task score shown to the user, zeroed once the day rolls over.
    pub fn visible_task_score(&self, now_ms: i64) -> u64 {
        match self.task_updated_at {
            Some(at) if is_same_day(at, now_ms) => self.task_score,
            _ => 0,
        }
    }

    /// Weekly points shown to the user, zeroed once the week rolls over.
    pub fn visible_weekly_points(&self, now_ms: i64) -> u64 {
        match self.weekly_updated_at {
            Some(at) if is_same_week(at, now_ms) => self.weekly_points,
            _ => 0,
        }
    }
}

/// Merge rule for a farming claim. Initializes the record on first write.
pub fn apply_farming_claim(prev: Option<ScoreRecord>, points: u64, now_ms: i64) -> ScoreRecord {
    let mut record = prev.unwrap_or_default();
    record.farming_score += points;
    record.total_score = record.category_sum();
    record.task_updated_at = Some(now_ms);
    record
}

/// Merge rule for a finished game round: adds to `game_score`, keeps the
/// highest single-round score, and recomputes the total so the game path
/// upholds the same invariant as every other mutation.
pub fn apply_game_result(prev: Option<ScoreRecord>, game_score: u64) -> ScoreRecord {
    let mut record = prev.unwrap_or_default();
    record.game_score += game_score;
    record.game_highest_score = record.game_highest_score.max(game_score);
    record.total_score = record.category_sum();
    record
}

/// Merge rule for a task claim.
pub fn apply_task_claim(prev: Option<ScoreRecord>, points: u64, now_ms: i64) -> ScoreRecord {
    let mut record = prev.unwrap_or_default();
    record.task_score += points;
    record.total_score = record.category_sum();
    record.task_updated_at = Some(now_ms);
    record
}

/// Merge rule for spending a game ticket. Returns `None` (abort the
/// transaction, leaving the record untouched) when no tickets remain or
/// the record does not exist yet.
pub fn apply_ticket_spend(prev: Option<ScoreRecord>) -> Option<ScoreRecord> {
    let mut record = prev?;
    if record.no_of_tickets == 0 {
        return None;
    }
    record.no_of_tickets -= 1;
    Some(record)
}
