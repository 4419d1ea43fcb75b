use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use super::*;

pub fn ms(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
        .unwrap()
        .timestamp_millis()
}

pub fn task(raw: Value) -> TaskDefinition {
    serde_json::from_value(raw).unwrap()
}

pub fn claimed_at(last_claimed_ms: i64, version: u32) -> ClaimRecord {
    ClaimRecord::Claimed {
        last_claimed_ms: Some(last_claimed_ms),
        version,
    }
}

// 2025-01-05 is a Sunday, 2025-01-06 the following Monday.
const SUNDAY_NIGHT: (i32, u32, u32) = (2025, 1, 5);
const MONDAY: (i32, u32, u32) = (2025, 1, 6);

#[test]
fn farming_not_started_without_session() {
    assert_eq!(farming_status(None, ms(2025, 1, 6, 12, 0, 0)), FarmingStatus::NotStarted);
}

#[test]
fn farming_accrues_linearly() {
    let start = ms(2025, 1, 6, 0, 0, 0);
    let one_hour_in = start + 3_600_000;
    match farming_status(Some(start), one_hour_in) {
        FarmingStatus::InProgress {
            remaining_secs,
            points_earned,
        } => {
            assert_eq!(remaining_secs, FARMING_DURATION_SECS - 3600);
            assert!((points_earned - 100.0).abs() < 1e-9);
        }
        other => panic!("expected InProgress, got {other:?}"),
    }
}

#[test]
fn farming_ready_exactly_at_duration() {
    let start = ms(2025, 1, 6, 0, 0, 0);
    let done = start + FARMING_DURATION_SECS * 1000;
    let status = farming_status(Some(start), done);
    assert_eq!(status.claimable_points(), Some(1200));

    let just_before = done - 1000;
    assert!(matches!(
        farming_status(Some(start), just_before),
        FarmingStatus::InProgress { remaining_secs: 1, .. }
    ));
}

#[test]
fn farming_clock_skew_clamps_to_zero_elapsed() {
    let start = ms(2025, 1, 6, 12, 0, 0);
    let earlier = start - 5000;
    assert!(matches!(
        farming_status(Some(start), earlier),
        FarmingStatus::InProgress {
            remaining_secs: FARMING_DURATION_SECS,
            ..
        }
    ));
}

#[test]
fn same_day_respects_midnight() {
    assert!(is_same_day(ms(2025, 1, 6, 0, 5, 0), ms(2025, 1, 6, 23, 59, 0)));
    assert!(!is_same_day(ms(2025, 1, 6, 23, 59, 0), ms(2025, 1, 7, 0, 1, 0)));
}

#[test]
fn same_week_starts_on_monday() {
    let (sy, sm, sd) = SUNDAY_NIGHT;
    let (my, mm, md) = MONDAY;
    let sunday_night = ms(sy, sm, sd, 23, 59, 0);
    let monday_morning = ms(my, mm, md, 9, 0, 0);
    let friday = ms(2025, 1, 10, 12, 0, 0);

    assert!(!is_same_week(sunday_night, monday_morning));
    assert!(is_same_week(monday_morning, friday));
    assert!(is_same_week(monday_morning, monday_morning));
}

#[test]
fn claim_record_decodes_every_wire_form() {
    assert_eq!(ClaimRecord::decode(None), ClaimRecord::Unclaimed);
    assert_eq!(ClaimRecord::decode(Some(&Value::Null)), ClaimRecord::Unclaimed);
    assert_eq!(ClaimRecord::decode(Some(&json!(false))), ClaimRecord::Unlocked);
    assert_eq!(ClaimRecord::decode(Some(&json!(true))), ClaimRecord::LegacyDone);
    assert_eq!(
        ClaimRecord::decode(Some(&json!({"lastClaimed": 42, "status": "claimed", "version": 3}))),
        claimed_at(42, 3)
    );
    // Objects written before versioning decode as version 0.
    assert_eq!(
        ClaimRecord::decode(Some(&json!({"lastClaimed": 42}))),
        claimed_at(42, 0)
    );
}

#[test]
fn reward_falls_back_from_points_to_score_to_default() {
    assert_eq!(task(json!({"points": 250})).reward(), 250);
    assert_eq!(task(json!({"score": 40})).reward(), 40);
    assert_eq!(task(json!({"points": 250, "score": 40})).reward(), 250);
    assert_eq!(task(json!({})).reward(), DEFAULT_TASK_REWARD);
    assert_eq!(task(json!({"points": "75"})).reward(), 75);
    assert_eq!(task(json!({"points": "a lot"})).reward(), 0);
}

#[test]
fn unclaimed_and_unlocked_are_never_done() {
    let def = task(json!({"id": 1, "type": "watch"}));
    let now = ms(2025, 1, 6, 12, 0, 0);
    assert!(!is_task_done(&def, &ClaimRecord::Unclaimed, now));
    assert!(!is_task_done(&def, &ClaimRecord::Unlocked, now));
}

#[test]
fn version_bump_forces_reclaim() {
    let def = task(json!({"id": 1, "type": "watch", "version": 2}));
    let now = ms(2025, 1, 6, 12, 0, 0);

    assert!(!is_task_done(&def, &claimed_at(now, 1), now));
    assert!(!is_task_done(&def, &ClaimRecord::LegacyDone, now));
    assert!(is_task_done(&def, &claimed_at(now, 2), now));
    // Newer claim than definition is still done.
    assert!(is_task_done(&def, &claimed_at(now, 3), now));
}

#[test]
fn daily_reset_config_expires_at_midnight() {
    let def = task(json!({"id": 1, "type": "watch", "reset_config": {"period": "daily"}}));
    let claimed = ms(2025, 1, 6, 9, 0, 0);

    assert!(is_task_done(&def, &claimed_at(claimed, 0), ms(2025, 1, 6, 23, 0, 0)));
    assert!(!is_task_done(&def, &claimed_at(claimed, 0), ms(2025, 1, 7, 1, 0, 0)));
}

#[test]
fn weekly_reset_config_expires_on_monday() {
    let def = task(json!({"id": 1, "type": "social", "reset_config": {"period": "weekly"}}));
    let (sy, sm, sd) = SUNDAY_NIGHT;
    let sunday_claim = ms(sy, sm, sd, 23, 59, 0);
    let (my, mm, md) = MONDAY;
    let monday = ms(my, mm, md, 8, 0, 0);

    assert!(!is_task_done(&def, &claimed_at(sunday_claim, 0), monday));
    // Claimed on Monday, still the same week on Friday.
    assert!(is_task_done(&def, &claimed_at(monday, 0), ms(2025, 1, 10, 12, 0, 0)));
}

#[test]
fn legacy_boolean_claim_on_scoped_task_is_expired() {
    let def = task(json!({"id": 1, "type": "watch", "reset_config": {"period": "once"}}));
    let now = ms(2025, 1, 6, 12, 0, 0);
    assert!(!is_task_done(&def, &ClaimRecord::LegacyDone, now));
    // A claim object without a timestamp is equally untrusted.
    let no_stamp = ClaimRecord::Claimed {
        last_claimed_ms: None,
        version: 0,
    };
    assert!(!is_task_done(&def, &no_stamp, now));
}

#[test]
fn once_and_infinite_periods_lock_permanently() {
    let now = ms(2025, 6, 1, 12, 0, 0);
    let long_ago = ms(2024, 1, 1, 12, 0, 0);
    for period in ["once", "infinite", "monthly"] {
        let def = task(json!({"id": 1, "type": "watch", "reset_config": {"period": period}}));
        assert!(is_task_done(&def, &claimed_at(long_ago, 0), now), "period {period}");
    }
}

#[test]
fn legacy_types_reset_daily_without_config() {
    let now = ms(2025, 1, 7, 12, 0, 0);
    let yesterday = ms(2025, 1, 6, 12, 0, 0);

    for kind in ["game", "news", "partnership"] {
        let def = task(json!({"id": 1, "type": kind}));
        assert!(!is_task_done(&def, &ClaimRecord::LegacyDone, now), "type {kind}");
        assert!(is_task_done(&def, &claimed_at(now, 0), now), "type {kind}");
        assert!(!is_task_done(&def, &claimed_at(yesterday, 0), now), "type {kind}");
    }
}

#[test]
fn one_time_tasks_stay_done() {
    let def = task(json!({"id": 1, "type": "watch"}));
    let long_ago = ms(2024, 1, 1, 12, 0, 0);
    let now = ms(2025, 6, 1, 12, 0, 0);
    assert!(is_task_done(&def, &claimed_at(long_ago, 0), now));
    assert!(is_task_done(&def, &ClaimRecord::LegacyDone, now));
}

#[test]
fn evaluator_is_pure() {
    let def = task(json!({"id": 1, "type": "watch", "reset_config": {"period": "daily"}}));
    let now = ms(2025, 1, 6, 12, 0, 0);
    let record = claimed_at(now, 0);
    let first = is_task_done(&def, &record, now);
    for _ in 0..10 {
        assert_eq!(is_task_done(&def, &record, now), first);
    }
}

#[test]
fn task_claim_recomputes_total_as_category_sum() {
    let prev = ScoreRecord {
        farming_score: 100,
        game_score: 50,
        task_score: 0,
        ..Default::default()
    };
    let now = ms(2025, 1, 6, 12, 0, 0);
    let next = apply_task_claim(Some(prev), 25, now);
    assert_eq!(next.task_score, 25);
    assert_eq!(next.total_score, 175);
    assert_eq!(next.task_updated_at, Some(now));
}

#[test]
fn farming_claim_initializes_missing_record() {
    let now = ms(2025, 1, 6, 12, 0, 0);
    let next = apply_farming_claim(None, 1200, now);
    assert_eq!(next.farming_score, 1200);
    assert_eq!(next.total_score, 1200);
}

#[test]
fn game_result_keeps_highest_and_recomputes_total() {
    let prev = ScoreRecord {
        farming_score: 100,
        game_score: 30,
        game_highest_score: 80,
        ..Default::default()
    };
    let next = apply_game_result(Some(prev), 50);
    assert_eq!(next.game_score, 80);
    assert_eq!(next.game_highest_score, 80);
    assert_eq!(next.total_score, 180);

    let higher = apply_game_result(Some(next), 90);
    assert_eq!(higher.game_highest_score, 90);
    assert_eq!(higher.total_score, higher.category_sum());
}

#[test]
fn ticket_spend_aborts_at_zero() {
    let broke = ScoreRecord {
        no_of_tickets: 0,
        ..Default::default()
    };
    assert_eq!(apply_ticket_spend(Some(broke)), None);
    assert_eq!(apply_ticket_spend(None), None);

    let flush = ScoreRecord {
        no_of_tickets: 2,
        ..Default::default()
    };
    assert_eq!(apply_ticket_spend(Some(flush)).unwrap().no_of_tickets, 1);
}

#[test]
fn score_record_decodes_hand_edited_numerics() {
    let raw = json!({
        "farming_score": 500,
        "network_score": "250",
        "game_score": 12.9,
        "news_score": "junk",
        "no_of_tickets": -3,
        "task_updated_at": "1736164800000",
        "total_score": 750,
    });
    let record: ScoreRecord = serde_json::from_value(raw).unwrap();
    assert_eq!(record.farming_score, 500);
    assert_eq!(record.network_score, 250);
    assert_eq!(record.game_score, 12);
    assert_eq!(record.news_score, 0);
    assert_eq!(record.no_of_tickets, 0);
    assert_eq!(record.task_updated_at, Some(1_736_164_800_000));

    let next = apply_task_claim(Some(record), 25, ms(2025, 1, 6, 12, 0, 0));
    assert_eq!(next.total_score, 500 + 250 + 12 + 25);
}

#[test]
fn score_record_preserves_unknown_fields() {
    let raw = json!({
        "farming_score": 10,
        "referral_code": "abc123",
    });
    let record: ScoreRecord = serde_json::from_value(raw).unwrap();
    assert_eq!(record.farming_score, 10);
    let back = serde_json::to_value(&record).unwrap();
    assert_eq!(back.get("referral_code"), Some(&json!("abc123")));
}

#[test]
fn display_windows_roll_over() {
    let monday = ms(2025, 1, 6, 12, 0, 0);
    let record = ScoreRecord {
        task_score: 40,
        task_updated_at: Some(monday),
        weekly_points: 300,
        weekly_updated_at: Some(monday),
        ..Default::default()
    };

    assert_eq!(record.visible_task_score(monday), 40);
    assert_eq!(record.visible_task_score(ms(2025, 1, 7, 1, 0, 0)), 0);
    assert_eq!(record.visible_weekly_points(ms(2025, 1, 10, 12, 0, 0)), 300);
    assert_eq!(record.visible_weekly_points(ms(2025, 1, 13, 1, 0, 0)), 0);
}
