use serde::{Deserialize, Serialize};

mod farming;
mod score;
mod task;
mod timeperiod;

#[cfg(test)]
mod tests;

pub use farming::*;
pub use score::*;
pub use task::*;
pub use timeperiod::*;

pub type UserId = String;
pub type TaskId = String;

/// Append-only audit record written after every successful claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub points: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn new(action: &str, points: u64, kind: &str, timestamp_ms: i64) -> Self {
        Self {
            action: action.to_owned(),
            points,
            kind: kind.to_owned(),
            timestamp: timestamp_ms,
        }
    }
}
