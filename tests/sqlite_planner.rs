use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use study_scheduler::models::{AllocationOptions, CalendarWindow, DailyConstraints};
use study_scheduler::store::{PlanStore, RepetitionStore};
use study_scheduler::{EngineConfig, PlanRequest, SchedulerError, SqliteStore, StudyPlanner};

const CATALOG: &str = r##"[
    {"id": 1, "name": "Mathematics", "color": "#1f77b4", "exam_track": "science",
     "topics": [
        {"id": 101, "name": "Functions", "difficulty": "Medium", "exam_weight": 3.0},
        {"id": 102, "name": "Derivatives", "difficulty": "Hard", "exam_weight": 4.0},
        {"id": 103, "name": "Sequences", "difficulty": "Easy", "exam_weight": 1.0}
     ]},
    {"id": 2, "name": "Physics", "color": "#ff7f0e", "exam_track": "science",
     "topics": [
        {"id": 201, "name": "Kinematics", "difficulty": "Medium", "exam_weight": 2.0},
        {"id": 202, "name": "Optics", "difficulty": "Hard", "exam_weight": 1.5}
     ]},
    {"id": 3, "name": "History", "color": "#2ca02c", "exam_track": "humanities",
     "topics": [{"id": 301, "name": "Antiquity", "difficulty": "Easy", "exam_weight": 2.0}]}
]"##;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 18, 0, 0).unwrap()
}

fn seeded_store() -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.seed_catalog(CATALOG).unwrap();
    store
}

fn request() -> PlanRequest {
    let start = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    PlanRequest {
        learner_id: 5,
        exam_track: "science".into(),
        window: CalendarWindow {
            start_date: start,
            end_date: start + Duration::days(6),
        },
        constraints: DailyConstraints {
            daily_study_hours: 5.0,
            preferred_start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            preferred_end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            break_duration_minutes: 15,
            include_review_sessions: true,
        },
        options: AllocationOptions::default(),
    }
}

#[test]
fn plan_is_persisted_and_read_back() {
    init_logger();
    let planner = StudyPlanner::default();
    let mut store = seeded_store();

    let (plan_id, plan) = planner
        .generate_and_activate(&mut store, &request(), now())
        .unwrap();

    assert_eq!(plan.days.len(), 7);
    let subjects: Vec<i64> = plan.subject_minutes().iter().map(|(id, _)| *id).collect();
    assert!(subjects.contains(&1) && subjects.contains(&2));
    assert!(!subjects.contains(&3));

    let stored = planner.active_plan(&store, 5).unwrap().unwrap();
    assert_eq!(stored.id, plan_id);
    assert!(stored.is_active);
    assert_eq!(stored.plan, plan);
}

#[test]
fn weak_topics_rise_in_the_ranking() {
    init_logger();
    let planner = StudyPlanner::default();
    let store = seeded_store();

    let before = planner.rank_topics(&store, 5, "science", now()).unwrap();
    assert_eq!(before[0].topic_id, 102);

    // 2 of 10 right on a low-weight topic
    for _ in 0..2 {
        store
            .log_study_session(5, 103, 1, 4, 0, 30, now() - Duration::days(3))
            .unwrap();
    }
    let after = planner.rank_topics(&store, 5, "science", now()).unwrap();
    let sequences = after.iter().find(|r| r.topic_id == 103).unwrap();
    assert!(sequences.is_weak);
    assert!(sequences.reasons.iter().any(|r| r.starts_with("Weak performance (20%")));
    let old = before.iter().find(|r| r.topic_id == 103).unwrap();
    assert!(sequences.priority_score > old.priority_score);
}

#[test]
fn overdue_reviews_show_up_in_ranking_and_due_list() {
    init_logger();
    let planner = StudyPlanner::default();
    let mut store = seeded_store();
    store
        .record_study_event(planner.tracker(), 5, 201, 0.9, now() - Duration::days(10))
        .unwrap();

    let due = planner.due_topics(&store, 5, now()).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].record.topic_id, 201);
    assert_eq!(due[0].days_overdue, 9);
    assert_eq!(due[0].days_since_last_study, 10);

    let ranked = planner.rank_topics(&store, 5, "science", now()).unwrap();
    let kinematics = ranked.iter().find(|r| r.topic_id == 201).unwrap();
    assert!(kinematics
        .reasons
        .contains(&"Review overdue by 9 days".to_string()));
}

#[test]
fn repeated_generation_keeps_one_active_plan() {
    init_logger();
    let planner = StudyPlanner::default();
    let mut store = seeded_store();

    let (first, _) = planner
        .generate_and_activate(&mut store, &request(), now())
        .unwrap();
    let mut shorter = request();
    shorter.window.end_date = shorter.window.start_date + Duration::days(2);
    let (second, plan) = planner
        .generate_and_activate(&mut store, &shorter, now())
        .unwrap();
    assert_ne!(first, second);

    let active: i64 = store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM study_plans WHERE learner_id = 5 AND is_active = 1",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(active, 1);
    assert_eq!(store.get_active_plan(5).unwrap().unwrap().plan, plan);
}

#[test]
fn failed_generation_leaves_the_active_plan_alone() {
    init_logger();
    let planner = StudyPlanner::default();
    let mut store = seeded_store();
    let (kept, _) = planner
        .generate_and_activate(&mut store, &request(), now())
        .unwrap();

    let mut backwards = request();
    backwards.window.end_date = backwards.window.start_date;
    assert!(matches!(
        planner.generate_and_activate(&mut store, &backwards, now()),
        Err(SchedulerError::InvalidDateRange { .. })
    ));

    let mut unknown = request();
    unknown.exam_track = "arts".into();
    assert!(matches!(
        planner.generate_and_activate(&mut store, &unknown, now()),
        Err(SchedulerError::NoEligibleTopics)
    ));

    assert_eq!(planner.active_plan(&store, 5).unwrap().unwrap().id, kept);
    assert!(store.get(5, 101).unwrap().is_none());
}

#[test]
fn config_overrides_flow_into_the_plan() {
    init_logger();
    let config = EngineConfig::from_toml_str(
        r#"
        [schedule]
        weekend_load_factor = 0.5

        [allocation]
        min_topic_minutes = 60
        "#,
    )
    .unwrap();
    let planner = StudyPlanner::new(config).unwrap();
    let mut store = seeded_store();

    let (_, plan) = planner
        .generate_and_activate(&mut store, &request(), now())
        .unwrap();

    // 270 on weekdays, 135 on the weekend; slots run 60 to 75 minutes
    assert_eq!(
        planner.study_budget(&request().window, &request().constraints),
        5 * 270 + 2 * 135
    );
    assert!(plan.days[0].daily_goal_minutes >= 270);
    let saturday = &plan.days[5];
    assert!(saturday.daily_goal_minutes < 135 + 75);
    for day in &plan.days {
        for slot in day.study_slots() {
            assert!((60..=75).contains(&slot.duration_minutes));
        }
    }
}

#[test]
fn second_connection_cannot_interleave_with_a_study_event() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("study.db");
    let planner = StudyPlanner::default();
    let tracker = planner.tracker();

    let mut ours = SqliteStore::open(&path).unwrap();
    ours.seed_catalog(CATALOG).unwrap();
    let mut theirs = SqliteStore::open(&path).unwrap();
    theirs
        .connection()
        .busy_timeout(std::time::Duration::ZERO)
        .unwrap();

    planner
        .record_study_event(&mut ours, 5, 101, 0.9, now())
        .unwrap();

    let later = now() + Duration::hours(2);
    let record = ours
        .update_with(5, 101, |previous| {
            // the write lock is already held, so the other connection is turned away
            let blocked = theirs.record_study_event(tracker, 5, 101, 1.0, later);
            assert!(matches!(blocked, Err(SchedulerError::Store(_))));
            tracker.advance(previous, 5, 101, 0.9, later)
        })
        .unwrap();
    assert_eq!(record.repetition_level, 2);

    // retried after the commit, it builds on our event instead of overwriting it
    let retried = planner
        .record_study_event(&mut theirs, 5, 101, 1.0, later)
        .unwrap();
    assert_eq!(retried.repetition_level, 3);
    assert_eq!(ours.get(5, 101).unwrap().unwrap().repetition_level, 3);
}
