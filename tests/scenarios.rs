//! End-to-end checks of the worked examples for each stage.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use study_scheduler::models::{
    AllocationOptions, DailyConstraints, PriorityResult, RepetitionRecord,
};
use study_scheduler::store::RepetitionStore;
use study_scheduler::{Allocator, InMemoryStore, RepetitionTracker, SchedulerError};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap()
}

fn existing(level: u8, next_review_at: DateTime<Utc>) -> RepetitionRecord {
    RepetitionRecord {
        learner_id: 1,
        topic_id: 42,
        last_studied_at: next_review_at - Duration::days(3),
        next_review_at,
        repetition_level: level,
        consecutive_correct: u32::from(level),
        easiness_factor: 2.5,
    }
}

#[test]
fn scenario_a_new_topic_starts_at_level_one() {
    let tracker = RepetitionTracker::default();
    let mut store = InMemoryStore::new();

    let record = tracker
        .record_study_event_at(&mut store, 1, 42, 0.9, now())
        .unwrap();

    assert_eq!(record.repetition_level, 1);
    assert_eq!(record.consecutive_correct, 1);
    assert_eq!(record.next_review_at, now() + Duration::days(1));
    assert_eq!(store.get(1, 42).unwrap(), Some(record));
}

#[test]
fn scenario_b_on_time_success_moves_up() {
    let tracker = RepetitionTracker::default();
    let mut store = InMemoryStore::new();
    store
        .upsert(&existing(1, now() + Duration::hours(2)))
        .unwrap();

    let record = tracker
        .record_study_event_at(&mut store, 1, 42, 0.8, now())
        .unwrap();

    assert_eq!(record.repetition_level, 2);
    assert_eq!(record.consecutive_correct, 2);
    assert_eq!(record.next_review_at, now() + Duration::days(7));
}

#[test]
fn scenario_c_failure_drops_a_level() {
    let tracker = RepetitionTracker::default();
    let mut store = InMemoryStore::new();
    store.upsert(&existing(3, now())).unwrap();

    let record = tracker
        .record_study_event_at(&mut store, 1, 42, 0.3, now())
        .unwrap();

    assert_eq!(record.repetition_level, 2);
    assert_eq!(record.consecutive_correct, 0);
    assert_eq!(record.next_review_at, now() + Duration::days(7));
    assert!(record.easiness_factor < 2.5);
}

#[test]
fn scenario_d_equal_priorities_share_the_budget() {
    let ranked: Vec<PriorityResult> = (0..10)
        .map(|i| PriorityResult {
            topic_id: i,
            subject_id: if i % 2 == 0 { 1 } else { 2 },
            priority_score: 0.4,
            recommended_minutes: 60,
            reasons: Vec::new(),
            success_rate: 0.75,
            is_weak: false,
        })
        .collect();

    let out = Allocator::default()
        .allocate(&ranked, 1200, &AllocationOptions::default())
        .unwrap();

    assert_eq!(out.len(), 10);
    for a in &out {
        assert_eq!(a.allocated_minutes, 120);
        assert_eq!(a.session_count, 2);
    }
}

#[test]
fn scenario_e_weekend_target_is_seventy_percent() {
    let constraints = DailyConstraints {
        daily_study_hours: 5.0,
        preferred_start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        preferred_end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        break_duration_minutes: 15,
        include_review_sessions: true,
    };
    let wednesday = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
    let sunday = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();

    assert_eq!(constraints.net_minutes_per_day(), 270);
    assert_eq!(constraints.target_minutes_for(wednesday, 0.7), 270);
    assert_eq!(constraints.target_minutes_for(sunday, 0.7), 189);
}

#[test]
fn out_of_range_scores_are_rejected_without_writing() {
    let tracker = RepetitionTracker::default();
    let mut store = InMemoryStore::new();

    for score in [-0.1, 1.01, f64::NAN] {
        assert!(matches!(
            tracker.record_study_event_at(&mut store, 1, 42, score, now()),
            Err(SchedulerError::InvalidPerformanceScore(_))
        ));
    }
    assert!(store.get(1, 42).unwrap().is_none());
}
