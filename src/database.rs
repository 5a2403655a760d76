// src/database.rs

use crate::error::StoreResult;
use crate::models::{Difficulty, JsonSubject};
use log::debug;
use rusqlite::{params, Connection, Result};

pub fn init_db(conn: &Connection) -> Result<()> {
    debug!("[DB] init_db: Checking database schema...");

    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS subjects (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            color TEXT NOT NULL,
            exam_track TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY,
            subject_id INTEGER NOT NULL REFERENCES subjects(id),
            name TEXT NOT NULL,
            difficulty TEXT CHECK (difficulty IN ('Easy','Medium','Hard')),
            exam_weight REAL NOT NULL DEFAULT 0.0
        );
        CREATE TABLE IF NOT EXISTS study_sessions (
            id INTEGER PRIMARY KEY,
            learner_id INTEGER NOT NULL,
            topic_id INTEGER NOT NULL REFERENCES topics(id),
            correct INTEGER NOT NULL DEFAULT 0,
            wrong INTEGER NOT NULL DEFAULT 0,
            empty INTEGER NOT NULL DEFAULT 0,
            duration_minutes INTEGER NOT NULL DEFAULT 0,
            studied_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_learner
            ON study_sessions (learner_id, topic_id);
        CREATE TABLE IF NOT EXISTS repetition_records (
            learner_id INTEGER NOT NULL,
            topic_id INTEGER NOT NULL,
            last_studied_at INTEGER NOT NULL,
            next_review_at INTEGER NOT NULL,
            repetition_level INTEGER NOT NULL CHECK (repetition_level BETWEEN 0 AND 5),
            consecutive_correct INTEGER NOT NULL DEFAULT 0,
            easiness_factor REAL NOT NULL DEFAULT 2.5,
            PRIMARY KEY (learner_id, topic_id)
        );
        CREATE INDEX IF NOT EXISTS idx_repetition_due
            ON repetition_records (learner_id, next_review_at);
        CREATE TABLE IF NOT EXISTS study_plans (
            id INTEGER PRIMARY KEY,
            learner_id INTEGER NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );
        -- At most one active plan per learner
        CREATE UNIQUE INDEX IF NOT EXISTS idx_plans_one_active
            ON study_plans (learner_id) WHERE is_active = 1;
        CREATE TABLE IF NOT EXISTS plan_days (
            id INTEGER PRIMARY KEY,
            plan_id INTEGER NOT NULL REFERENCES study_plans(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            daily_goal_minutes INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS plan_slots (
            id INTEGER PRIMARY KEY,
            day_id INTEGER NOT NULL REFERENCES plan_days(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            subject_id INTEGER,
            topic_id INTEGER,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            slot_type TEXT CHECK (slot_type IN ('study','review','practice','break')),
            priority INTEGER NOT NULL CHECK (priority BETWEEN 1 AND 5)
        );
        ",
    )?;

    Ok(())
}

/// Loads subjects and their topics from a JSON array. Existing rows with the
/// same ids are replaced. Returns the number of topics written.
pub fn seed_catalog(conn: &mut Connection, data: &str) -> StoreResult<usize> {
    let subjects: Vec<JsonSubject> = serde_json::from_str(data)?;

    let tx = conn.transaction()?;
    let mut topic_count = 0;
    {
        let mut s_stmt = tx.prepare(
            "INSERT OR REPLACE INTO subjects (id, name, color, exam_track) VALUES (?, ?, ?, ?)",
        )?;
        let mut t_stmt = tx.prepare(
            "INSERT OR REPLACE INTO topics (id, subject_id, name, difficulty, exam_weight) VALUES (?, ?, ?, ?, ?)",
        )?;

        for s in &subjects {
            s_stmt.execute(params![s.id, s.name, s.color, s.exam_track])?;
            for t in &s.topics {
                let difficulty = t
                    .difficulty
                    .parse::<Difficulty>()
                    .unwrap_or(Difficulty::Medium);
                t_stmt.execute(params![t.id, s.id, t.name, difficulty.as_str(), t.exam_weight])?;
                topic_count += 1;
            }
        }
    }
    tx.commit()?;

    debug!(
        "[DB] Seeded {} subjects and {} topics",
        subjects.len(),
        topic_count
    );
    Ok(topic_count)
}
