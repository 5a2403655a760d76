// src/repository.rs

//! SQLite persistence for the store traits.
//!
//! Timestamps are stored as unix seconds, dates as `YYYY-MM-DD` and slot
//! times as `HH:MM:SS` with an optional fraction.

use crate::database;
use crate::error::{Result as EngineResult, StoreError, StoreResult};
use crate::models::{
    Day, Difficulty, LearnerId, Plan, PlanId, RepetitionRecord, Slot, SlotType, StoredPlan,
    StudyStat, Topic, TopicId,
};
use crate::repetition::RepetitionTracker;
use crate::store::{PlanStore, RepetitionStore, StudyStatsSource, TopicCatalog};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Wraps an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> StoreResult<Self> {
        database::init_db(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        info!("Database path: {:?}", path);
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn seed_catalog(&mut self, data: &str) -> StoreResult<usize> {
        database::seed_catalog(&mut self.conn, data)
    }

    /// Records a raw study session; the statistics read aggregates these.
    #[allow(clippy::too_many_arguments)]
    pub fn log_study_session(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
        correct: u32,
        wrong: u32,
        empty: u32,
        duration_minutes: u32,
        studied_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO study_sessions (learner_id, topic_id, correct, wrong, empty, duration_minutes, studied_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![learner_id, topic_id, correct, wrong, empty, duration_minutes, studied_at.timestamp()],
        )?;
        Ok(())
    }

    /// Applies one study event as a single read-modify-write transaction.
    pub fn record_study_event(
        &mut self,
        tracker: &RepetitionTracker,
        learner_id: LearnerId,
        topic_id: TopicId,
        performance_score: f64,
        now: DateTime<Utc>,
    ) -> EngineResult<RepetitionRecord> {
        tracker.record_study_event_at(self, learner_id, topic_id, performance_score, now)
    }
}

// --- Repetition Records ---

/// Fetches the repetition record for a (learner, topic) pair, if one exists.
pub fn get_repetition_record(
    conn: &Connection,
    learner_id: LearnerId,
    topic_id: TopicId,
) -> StoreResult<Option<RepetitionRecord>> {
    conn.query_row(
        "SELECT learner_id, topic_id, last_studied_at, next_review_at, repetition_level, consecutive_correct, easiness_factor
         FROM repetition_records WHERE learner_id = ? AND topic_id = ?",
        params![learner_id, topic_id],
        read_record_row,
    )
    .optional()?
    .transpose()
}

pub fn save_repetition_record(conn: &Connection, record: &RepetitionRecord) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO repetition_records (learner_id, topic_id, last_studied_at, next_review_at, repetition_level, consecutive_correct, easiness_factor) VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            record.learner_id,
            record.topic_id,
            record.last_studied_at.timestamp(),
            record.next_review_at.timestamp(),
            record.repetition_level,
            record.consecutive_correct,
            record.easiness_factor
        ],
    )?;
    Ok(())
}

fn read_record_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<RepetitionRecord>> {
    let last: i64 = row.get(2)?;
    let next: i64 = row.get(3)?;
    let learner_id = row.get(0)?;
    let topic_id = row.get(1)?;
    let repetition_level = row.get(4)?;
    let consecutive_correct = row.get(5)?;
    let easiness_factor = row.get(6)?;
    Ok(timestamp("repetition_records", last).and_then(|last_studied_at| {
        Ok(RepetitionRecord {
            learner_id,
            topic_id,
            last_studied_at,
            next_review_at: timestamp("repetition_records", next)?,
            repetition_level,
            consecutive_correct,
            easiness_factor,
        })
    }))
}

// --- Plans ---

fn insert_plan(conn: &Connection, plan: &Plan) -> StoreResult<PlanId> {
    conn.execute(
        "INSERT INTO study_plans (learner_id, start_date, end_date, is_active, created_at) VALUES (?, ?, ?, 1, ?)",
        params![
            plan.learner_id,
            plan.start_date.format(DATE_FORMAT).to_string(),
            plan.end_date.format(DATE_FORMAT).to_string(),
            Utc::now().timestamp()
        ],
    )?;
    let plan_id = conn.last_insert_rowid();

    let mut day_stmt = conn
        .prepare("INSERT INTO plan_days (plan_id, date, daily_goal_minutes) VALUES (?, ?, ?)")?;
    let mut slot_stmt = conn.prepare(
        "INSERT INTO plan_slots (day_id, position, subject_id, topic_id, start_time, end_time, duration_minutes, slot_type, priority) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;

    for day in &plan.days {
        day_stmt.execute(params![
            plan_id,
            day.date.format(DATE_FORMAT).to_string(),
            day.daily_goal_minutes
        ])?;
        let day_id = conn.last_insert_rowid();
        for (position, slot) in day.slots.iter().enumerate() {
            slot_stmt.execute(params![
                day_id,
                position as i64,
                slot.subject_id,
                slot.topic_id,
                slot.start_time.format(TIME_FORMAT).to_string(),
                slot.end_time.format(TIME_FORMAT).to_string(),
                slot.duration_minutes,
                slot.slot_type.as_str(),
                slot.priority
            ])?;
        }
    }
    Ok(plan_id)
}

fn load_days(conn: &Connection, plan_id: PlanId) -> StoreResult<Vec<Day>> {
    let mut day_stmt = conn.prepare(
        "SELECT id, date, daily_goal_minutes FROM plan_days WHERE plan_id = ? ORDER BY date ASC",
    )?;
    let rows = day_stmt
        .query_map([plan_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut slot_stmt = conn.prepare(
        "SELECT subject_id, topic_id, start_time, end_time, duration_minutes, slot_type, priority
         FROM plan_slots WHERE day_id = ? ORDER BY position ASC",
    )?;

    let mut days = Vec::with_capacity(rows.len());
    for (day_id, date, daily_goal_minutes) in rows {
        let raw_slots = slot_stmt
            .query_map([day_id], |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, u8>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let slots = raw_slots
            .into_iter()
            .map(
                |(subject_id, topic_id, start, end, duration_minutes, kind, priority)| -> StoreResult<Slot> {
                    Ok(Slot {
                        subject_id,
                        topic_id,
                        start_time: parse_time(&start)?,
                        end_time: parse_time(&end)?,
                        duration_minutes,
                        slot_type: kind.parse::<SlotType>().map_err(|detail| {
                            StoreError::Corrupt {
                                table: "plan_slots",
                                detail,
                            }
                        })?,
                        priority,
                    })
                },
            )
            .collect::<StoreResult<Vec<Slot>>>()?;

        days.push(Day {
            date: parse_date("plan_days", &date)?,
            slots,
            daily_goal_minutes,
        });
    }
    Ok(days)
}

// --- Conversions ---

fn timestamp(table: &'static str, secs: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| StoreError::Corrupt {
        table,
        detail: format!("timestamp out of range: {secs}"),
    })
}

fn parse_date(table: &'static str, raw: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| StoreError::Corrupt {
        table,
        detail: format!("bad date {raw:?}: {e}"),
    })
}

fn parse_time(raw: &str) -> StoreResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT).map_err(|e| StoreError::Corrupt {
        table: "plan_slots",
        detail: format!("bad time {raw:?}: {e}"),
    })
}

// --- Trait Implementations ---

impl TopicCatalog for SqliteStore {
    fn list_accessible_topics(&self, exam_track: &str) -> StoreResult<Vec<Topic>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.subject_id, t.name, t.difficulty, t.exam_weight
             FROM topics t
             JOIN subjects s ON t.subject_id = s.id
             WHERE s.exam_track = ?
             ORDER BY t.id ASC",
        )?;

        let topics = stmt
            .query_map([exam_track], |row| {
                let difficulty: Option<String> = row.get(3)?;
                Ok(Topic {
                    id: row.get(0)?,
                    subject_id: row.get(1)?,
                    name: row.get(2)?,
                    difficulty: difficulty
                        .and_then(|d| d.parse().ok())
                        .unwrap_or(Difficulty::Medium),
                    exam_weight: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<Topic>>>()?;

        debug!("[DB] {} topics on track {}", topics.len(), exam_track);
        Ok(topics)
    }
}

impl StudyStatsSource for SqliteStore {
    fn get_topic_stats(&self, learner_id: LearnerId) -> StoreResult<Vec<StudyStat>> {
        let mut stmt = self.conn.prepare(
            "SELECT topic_id,
                    COUNT(*),
                    COALESCE(SUM(correct), 0),
                    COALESCE(SUM(wrong), 0),
                    COALESCE(SUM(empty), 0),
                    COALESCE(SUM(duration_minutes), 0),
                    MAX(studied_at)
             FROM study_sessions
             WHERE learner_id = ?
             GROUP BY topic_id
             ORDER BY topic_id ASC",
        )?;

        let rows = stmt
            .query_map([learner_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(topic_id, sessions, correct, wrong, empty, duration, last)| -> StoreResult<StudyStat> {
                    let answered = correct + wrong + empty;
                    let success_rate = if answered == 0 {
                        0.0
                    } else {
                        correct as f64 / answered as f64
                    };
                    Ok(StudyStat {
                        topic_id,
                        success_rate,
                        total_sessions: sessions,
                        total_questions: answered,
                        total_duration_minutes: duration,
                        last_studied_at: last
                            .map(|secs| timestamp("study_sessions", secs))
                            .transpose()?,
                    })
                },
            )
            .collect()
    }
}

impl RepetitionStore for SqliteStore {
    fn get(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> StoreResult<Option<RepetitionRecord>> {
        get_repetition_record(&self.conn, learner_id, topic_id)
    }

    fn upsert(&mut self, record: &RepetitionRecord) -> StoreResult<()> {
        save_repetition_record(&self.conn, record)
    }

    /// The write lock is taken before the record is read, so a writer on
    /// another connection waits until this event is committed.
    fn update_with<F>(
        &mut self,
        learner_id: LearnerId,
        topic_id: TopicId,
        f: F,
    ) -> EngineResult<RepetitionRecord>
    where
        F: FnOnce(Option<&RepetitionRecord>) -> EngineResult<RepetitionRecord>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let previous = get_repetition_record(&tx, learner_id, topic_id)?;
        let updated = f(previous.as_ref())?;
        save_repetition_record(&tx, &updated)?;
        tx.commit().map_err(StoreError::from)?;
        debug!(
            "[DB] Stored repetition record for topic {} (level {})",
            topic_id, updated.repetition_level
        );
        Ok(updated)
    }

    fn list_due(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<RepetitionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT learner_id, topic_id, last_studied_at, next_review_at, repetition_level, consecutive_correct, easiness_factor
             FROM repetition_records
             WHERE learner_id = ? AND next_review_at <= ?
             ORDER BY next_review_at ASC, topic_id ASC
             LIMIT ?",
        )?;
        let rows = stmt
            .query_map(
                params![learner_id, now.timestamp(), limit as i64],
                read_record_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().collect()
    }
}

impl PlanStore for SqliteStore {
    fn deactivate_all_plans(&mut self, learner_id: LearnerId) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE study_plans SET is_active = 0 WHERE learner_id = ? AND is_active = 1",
            [learner_id],
        )?;
        Ok(())
    }

    fn create_plan(&mut self, plan: &Plan) -> StoreResult<PlanId> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let active: i64 = tx.query_row(
            "SELECT COUNT(*) FROM study_plans WHERE learner_id = ? AND is_active = 1",
            [plan.learner_id],
            |row| row.get(0),
        )?;
        if active > 0 {
            return Err(StoreError::ActivePlanExists(plan.learner_id));
        }
        let plan_id = insert_plan(&tx, plan)?;
        tx.commit()?;
        Ok(plan_id)
    }

    fn replace_active_plan(&mut self, plan: &Plan) -> StoreResult<PlanId> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deactivated = tx.execute(
            "UPDATE study_plans SET is_active = 0 WHERE learner_id = ? AND is_active = 1",
            [plan.learner_id],
        )?;
        let plan_id = insert_plan(&tx, plan)?;
        tx.commit()?;
        info!(
            "[DB] Plan {} active for learner {} ({} previous deactivated, {} days)",
            plan_id,
            plan.learner_id,
            deactivated,
            plan.days.len()
        );
        Ok(plan_id)
    }

    fn get_active_plan(&self, learner_id: LearnerId) -> StoreResult<Option<StoredPlan>> {
        let header = self
            .conn
            .query_row(
                "SELECT id, start_date, end_date, created_at FROM study_plans
                 WHERE learner_id = ? AND is_active = 1
                 ORDER BY id DESC LIMIT 1",
                [learner_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, start, end, created_at)) = header else {
            return Ok(None);
        };

        Ok(Some(StoredPlan {
            id,
            is_active: true,
            created_at: timestamp("study_plans", created_at)?,
            plan: Plan {
                learner_id,
                start_date: parse_date("study_plans", &start)?,
                end_date: parse_date("study_plans", &end)?,
                days: load_days(&self.conn, id)?,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedulerError;
    use chrono::{Duration, TimeZone};

    const CATALOG: &str = r##"[
        {"id": 1, "name": "Math", "color": "#3366ff", "exam_track": "science",
         "topics": [
            {"id": 10, "name": "Derivatives", "difficulty": "Hard", "exam_weight": 4.0},
            {"id": 11, "name": "Limits", "difficulty": "medium", "exam_weight": 2.5}
         ]},
        {"id": 2, "name": "Literature", "exam_track": "verbal",
         "topics": [{"id": 20, "name": "Poetry", "difficulty": "Easy"}]}
    ]"##;

    fn store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.seed_catalog(CATALOG).unwrap(), 3);
        store
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn catalog_is_filtered_by_track() {
        let store = store();
        let topics = store.list_accessible_topics("science").unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].difficulty, Difficulty::Hard);
        assert_eq!(topics[1].difficulty, Difficulty::Medium);
        assert_eq!(store.list_accessible_topics("verbal").unwrap()[0].exam_weight, 0.0);
    }

    #[test]
    fn stats_aggregate_logged_sessions() {
        let store = store();
        store.log_study_session(1, 10, 6, 3, 1, 40, at(10, 9)).unwrap();
        store.log_study_session(1, 10, 2, 0, 0, 20, at(12, 9)).unwrap();
        store.log_study_session(1, 11, 0, 0, 0, 15, at(11, 9)).unwrap();
        store.log_study_session(2, 10, 9, 0, 0, 30, at(11, 9)).unwrap();

        let stats = store.get_topic_stats(1).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].topic_id, 10);
        assert_eq!(stats[0].total_sessions, 2);
        assert_eq!(stats[0].total_questions, 12);
        assert!((stats[0].success_rate - 8.0 / 12.0).abs() < 1e-9);
        assert_eq!(stats[0].total_duration_minutes, 60);
        assert_eq!(stats[0].last_studied_at, Some(at(12, 9)));
        assert_eq!(stats[1].success_rate, 0.0);
    }

    #[test]
    fn repetition_records_round_trip_through_the_table() {
        let mut store = store();
        let tracker = RepetitionTracker::default();
        let first = store.record_study_event(&tracker, 1, 10, 0.9, at(10, 8)).unwrap();
        assert_eq!(store.get(1, 10).unwrap(), Some(first.clone()));

        let second = store.record_study_event(&tracker, 1, 10, 0.8, at(11, 7)).unwrap();
        assert_eq!(second.repetition_level, 2);
        assert_eq!(second.next_review_at, at(11, 7) + Duration::days(7));

        let due = store.list_due(1, at(20, 0), 10).unwrap();
        assert_eq!(due, vec![second]);
        assert!(store.list_due(1, at(12, 0), 10).unwrap().is_empty());
    }

    #[test]
    fn invalid_score_leaves_the_table_untouched() {
        let mut store = store();
        let tracker = RepetitionTracker::default();
        assert!(store.record_study_event(&tracker, 1, 10, 1.5, at(10, 8)).is_err());
        assert!(store.get(1, 10).unwrap().is_none());
    }

    fn sample_plan(start: NaiveTime) -> Plan {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let study_end = start + Duration::minutes(75);
        Plan {
            learner_id: 1,
            start_date: date,
            end_date: date + Duration::days(1),
            days: vec![Day {
                date,
                slots: vec![
                    Slot {
                        subject_id: Some(1),
                        topic_id: Some(10),
                        start_time: start,
                        end_time: study_end,
                        duration_minutes: 75,
                        slot_type: SlotType::Study,
                        priority: 4,
                    },
                    Slot {
                        subject_id: None,
                        topic_id: None,
                        start_time: study_end,
                        end_time: study_end + Duration::minutes(15),
                        duration_minutes: 15,
                        slot_type: SlotType::Break,
                        priority: 1,
                    },
                ],
                daily_goal_minutes: 75,
            }],
        }
    }

    #[test]
    fn plans_round_trip_and_only_one_stays_active() {
        let mut store = store();
        let plan = sample_plan(NaiveTime::from_hms_opt(9, 0, 0).unwrap());

        let first = store.replace_active_plan(&plan).unwrap();
        let second = store.replace_active_plan(&plan).unwrap();
        assert_ne!(first, second);

        let active = store.get_active_plan(1).unwrap().unwrap();
        assert_eq!(active.id, second);
        assert_eq!(active.plan, plan);

        assert!(matches!(
            store.create_plan(&plan),
            Err(StoreError::ActivePlanExists(1))
        ));
        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM study_plans", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);

        store.deactivate_all_plans(1).unwrap();
        assert!(store.get_active_plan(1).unwrap().is_none());
        assert!(store.create_plan(&plan).is_ok());
    }

    #[test]
    fn slot_times_keep_seconds() {
        let mut store = store();
        let plan = sample_plan(NaiveTime::from_hms_milli_opt(8, 59, 30, 250).unwrap());
        store.replace_active_plan(&plan).unwrap();

        let stored = store.get_active_plan(1).unwrap().unwrap();
        assert_eq!(stored.plan, plan);
        assert_eq!(
            stored.plan.days[0].slots[0].end_time,
            NaiveTime::from_hms_milli_opt(10, 14, 30, 250).unwrap()
        );
    }

    #[test]
    fn update_with_failure_writes_nothing() {
        let mut store = store();
        let result = store.update_with(1, 10, |_| Err(SchedulerError::NoEligibleTopics));
        assert!(matches!(result, Err(SchedulerError::NoEligibleTopics)));
        assert!(store.get(1, 10).unwrap().is_none());
    }
}
