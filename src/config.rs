// src/config.rs

//! Tunable parameters for every stage of the engine.
//!
//! Each section falls back to the values in [`crate::constants`] for any key
//! that is missing, so a TOML override only needs to name what it changes.

use crate::constants::*;
use crate::error::{Result, SchedulerError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub repetition: RepetitionConfig,
    pub priority: PriorityConfig,
    pub allocation: AllocationConfig,
    pub schedule: ScheduleConfig,
}

impl EngineConfig {
    /// Parses a TOML document and validates the result.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(raw).map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.repetition;
        if r.interval_table_days.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "interval table must not be empty".into(),
            ));
        }
        if !(r.ease_factor_min <= r.ease_factor_default && r.ease_factor_default <= r.ease_factor_max)
        {
            return Err(SchedulerError::InvalidConfig(format!(
                "easiness bounds out of order: {} <= {} <= {}",
                r.ease_factor_min, r.ease_factor_default, r.ease_factor_max
            )));
        }
        if !(0.0..=1.0).contains(&r.success_threshold) {
            return Err(SchedulerError::InvalidConfig(format!(
                "success threshold {} is outside [0, 1]",
                r.success_threshold
            )));
        }

        let sum = self.priority.weights.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(SchedulerError::InvalidConfig(format!(
                "priority weights must sum to 1.0, got {sum:.4}"
            )));
        }

        let a = &self.allocation;
        if a.min_topic_minutes == 0 || a.min_topic_minutes > a.max_topic_minutes {
            return Err(SchedulerError::InvalidConfig(format!(
                "topic minute bounds invalid: [{}, {}]",
                a.min_topic_minutes, a.max_topic_minutes
            )));
        }
        if a.min_topics_per_subject > a.max_topics_per_subject || a.session_length_minutes == 0 {
            return Err(SchedulerError::InvalidConfig(
                "per-subject topic bounds or session length invalid".into(),
            ));
        }

        let s = &self.schedule;
        if s.min_slot_minutes == 0 || s.min_slot_minutes > s.max_slot_minutes || s.max_slots_per_day == 0
        {
            return Err(SchedulerError::InvalidConfig("slot bounds invalid".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepetitionConfig {
    pub success_threshold: f64,
    pub first_review_days: i64,
    pub max_level: u8,
    /// Review interval per repetition level; the last entry covers every higher level.
    pub interval_table_days: Vec<i64>,
    pub ease_factor_min: f64,
    pub ease_factor_max: f64,
    pub ease_factor_default: f64,
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            success_threshold: SUCCESS_THRESHOLD,
            first_review_days: FIRST_REVIEW_DAYS,
            max_level: MAX_REPETITION_LEVEL,
            interval_table_days: INTERVAL_TABLE_DAYS.to_vec(),
            ease_factor_min: EASE_FACTOR_MIN,
            ease_factor_max: EASE_FACTOR_MAX,
            ease_factor_default: EASE_FACTOR_DEFAULT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub exam: f64,
    pub weakness: f64,
    pub overdue: f64,
    pub neglect: f64,
}

impl PriorityWeights {
    pub fn sum(&self) -> f64 {
        self.exam + self.weakness + self.overdue + self.neglect
    }
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            exam: WEIGHT_EXAM,
            weakness: WEIGHT_WEAKNESS,
            overdue: WEIGHT_OVERDUE,
            neglect: WEIGHT_NEGLECT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    pub weights: PriorityWeights,
    pub weakness_threshold: f64,
    pub weakness_min_questions: u32,
    pub overdue_horizon_days: f64,
    pub progress_saturation_sessions: f64,
    pub high_exam_score: f64,
    pub max_reasons: usize,
    pub due_scan_limit: usize,
    pub base_recommended_minutes: f64,
    pub weak_minutes_multiplier: f64,
    pub exam_minutes_bonus: f64,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            weights: PriorityWeights::default(),
            weakness_threshold: WEAKNESS_THRESHOLD,
            weakness_min_questions: WEAKNESS_MIN_QUESTIONS,
            overdue_horizon_days: OVERDUE_HORIZON_DAYS,
            progress_saturation_sessions: PROGRESS_SATURATION_SESSIONS,
            high_exam_score: HIGH_EXAM_SCORE,
            max_reasons: MAX_REASONS,
            due_scan_limit: DUE_SCAN_LIMIT,
            base_recommended_minutes: BASE_RECOMMENDED_MINUTES,
            weak_minutes_multiplier: WEAK_MINUTES_MULTIPLIER,
            exam_minutes_bonus: EXAM_MINUTES_BONUS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub max_selected_topics: usize,
    pub min_topics_per_subject: usize,
    pub max_topics_per_subject: usize,
    pub min_topic_minutes: u32,
    pub max_topic_minutes: u32,
    pub session_length_minutes: u32,
    pub weak_focus_multiplier: f64,
    /// Success rates strictly between 0 and this value get the weak-focus boost.
    pub weak_focus_ceiling: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_selected_topics: MAX_SELECTED_TOPICS,
            min_topics_per_subject: MIN_TOPICS_PER_SUBJECT,
            max_topics_per_subject: MAX_TOPICS_PER_SUBJECT,
            min_topic_minutes: MIN_TOPIC_MINUTES,
            max_topic_minutes: MAX_TOPIC_MINUTES,
            session_length_minutes: SESSION_LENGTH_MINUTES,
            weak_focus_multiplier: WEAK_FOCUS_MULTIPLIER,
            weak_focus_ceiling: WEAKNESS_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub weekend_load_factor: f64,
    pub max_slots_per_day: usize,
    pub min_slot_minutes: u32,
    pub max_slot_minutes: u32,
    pub morning_end_hour: u32,
    pub afternoon_end_hour: u32,
    pub review_tail_slots: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekend_load_factor: WEEKEND_LOAD_FACTOR,
            max_slots_per_day: MAX_SLOTS_PER_DAY,
            min_slot_minutes: MIN_SLOT_MINUTES,
            max_slot_minutes: MAX_SLOT_MINUTES,
            morning_end_hour: MORNING_END_HOUR,
            afternoon_end_hour: AFTERNOON_END_HOUR,
            review_tail_slots: REVIEW_TAIL_SLOTS,
        }
    }
}
