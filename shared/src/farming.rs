use serde::{Deserialize, Serialize};

/// Total farming time in seconds (12 hours).
pub const FARMING_DURATION_SECS: i64 = 43_200;
/// Points accrued per farmed second.
pub const POINTS_PER_SECOND: f64 = 100.0 / 3600.0;

/// Singleton farming session stored at `connections/{id}/farming`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FarmingSession {
    #[serde(rename = "startTime", default)]
    pub start_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FarmingStatus {
    NotStarted,
    InProgress {
        remaining_secs: i64,
        points_earned: f64,
    },
    ReadyToClaim {
        total_points: f64,
    },
}

impl FarmingStatus {
    /// Integer points a claim would credit, if the session has finished.
    pub fn claimable_points(&self) -> Option<u64> {
        match self {
            FarmingStatus::ReadyToClaim { total_points } => Some(total_points.floor() as u64),
            _ => None,
        }
    }
}

/// Projects the farming state from the recorded start and the wall clock.
///
/// The local countdown a UI ticks between authoritative reads is only a
/// display smoothing; this function is the ground truth and can be
/// re-derived at any moment.
pub fn farming_status(start_time_ms: Option<i64>, now_ms: i64) -> FarmingStatus {
    let Some(start) = start_time_ms else {
        return FarmingStatus::NotStarted;
    };

    let elapsed_secs = ((now_ms - start) / 1000).max(0);
    if elapsed_secs >= FARMING_DURATION_SECS {
        FarmingStatus::ReadyToClaim {
            total_points: FARMING_DURATION_SECS as f64 * POINTS_PER_SECOND,
        }
    } else {
        FarmingStatus::InProgress {
            remaining_secs: FARMING_DURATION_SECS - elapsed_secs,
            points_earned: elapsed_secs as f64 * POINTS_PER_SECOND,
        }
    }
}
