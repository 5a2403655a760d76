// src/repetition.rs

//! Per-topic memory decay.
//!
//! Each (learner, topic) pair carries a [`RepetitionRecord`] holding a mastery
//! level in `0..=max_level` and an easiness factor. A study event moves the
//! level one step up or down depending on the performance score, and the
//! level alone picks the next review interval from a fixed table. The
//! easiness factor follows the SM-2 quality update and only feeds later
//! easiness updates.

use crate::config::RepetitionConfig;
use crate::constants::DAY_SECONDS;
use crate::error::{Result, SchedulerError};
use crate::models::{DueTopic, LearnerId, RepetitionRecord, TopicId};
use crate::store::RepetitionStore;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct RepetitionTracker {
    config: RepetitionConfig,
}

impl RepetitionTracker {
    pub fn new(config: RepetitionConfig) -> Self {
        RepetitionTracker { config }
    }

    pub fn config(&self) -> &RepetitionConfig {
        &self.config
    }

    /// SM-2 easiness update on a 0-5 quality scale derived from `score`.
    pub fn update_easiness(&self, easiness_factor: f64, score: f64) -> f64 {
        let quality = (score * 5.0).round();
        let miss = 5.0 - quality;
        let updated = easiness_factor + (0.1 - miss * (0.08 + miss * 0.02));
        updated.clamp(self.config.ease_factor_min, self.config.ease_factor_max)
    }

    /// Review interval in days for a repetition level.
    ///
    /// The easiness factor does not scale the table; levels past the end of
    /// the table reuse its last entry.
    pub fn next_interval(&self, level: u8, _easiness_factor: f64) -> i64 {
        let table = &self.config.interval_table_days;
        let idx = (level as usize).min(table.len().saturating_sub(1));
        table.get(idx).copied().unwrap_or(self.config.first_review_days)
    }

    /// Computes the record that results from one study event.
    ///
    /// Pure: `previous` is the stored record, if any, and nothing is written.
    pub fn advance(
        &self,
        previous: Option<&RepetitionRecord>,
        learner_id: LearnerId,
        topic_id: TopicId,
        performance_score: f64,
        now: DateTime<Utc>,
    ) -> Result<RepetitionRecord> {
        validate_score(performance_score)?;
        let success = performance_score >= self.config.success_threshold;

        let Some(prev) = previous else {
            let level = u8::from(success);
            debug!(
                "[Repetition Input] First touch: learner {}, topic {}, score {:.2}",
                learner_id, topic_id, performance_score
            );
            return Ok(RepetitionRecord {
                learner_id,
                topic_id,
                last_studied_at: now,
                next_review_at: now + Duration::days(self.config.first_review_days),
                repetition_level: level,
                consecutive_correct: u32::from(level),
                easiness_factor: self
                    .update_easiness(self.config.ease_factor_default, performance_score),
            });
        };

        let on_time = now <= prev.next_review_at;
        debug!(
            "[Repetition Input] Level: {}, OnTime: {}, Score: {:.2}, Ease: {:.2}",
            prev.repetition_level, on_time, performance_score, prev.easiness_factor
        );

        let (level, consecutive_correct) = if success {
            let streak = if on_time { prev.consecutive_correct + 1 } else { 1 };
            (
                prev.repetition_level
                    .saturating_add(1)
                    .min(self.config.max_level),
                streak,
            )
        } else {
            (prev.repetition_level.saturating_sub(1), 0)
        };

        let easiness_factor = self.update_easiness(prev.easiness_factor, performance_score);
        let interval = self.next_interval(level, easiness_factor);

        Ok(RepetitionRecord {
            learner_id,
            topic_id,
            last_studied_at: now,
            next_review_at: now + Duration::days(interval),
            repetition_level: level,
            consecutive_correct,
            easiness_factor,
        })
    }

    pub fn record_study_event<S: RepetitionStore>(
        &self,
        store: &mut S,
        learner_id: LearnerId,
        topic_id: TopicId,
        performance_score: f64,
    ) -> Result<RepetitionRecord> {
        self.record_study_event_at(store, learner_id, topic_id, performance_score, Utc::now())
    }

    /// Reads, advances and writes back the record for one study event.
    ///
    /// The read and the write go through [`RepetitionStore::update_with`], so
    /// a store shared between connections applies them atomically.
    pub fn record_study_event_at<S: RepetitionStore>(
        &self,
        store: &mut S,
        learner_id: LearnerId,
        topic_id: TopicId,
        performance_score: f64,
        now: DateTime<Utc>,
    ) -> Result<RepetitionRecord> {
        validate_score(performance_score)?;
        store.update_with(learner_id, topic_id, |previous| {
            let updated = self.advance(previous, learner_id, topic_id, performance_score, now)?;
            match previous {
                Some(prev) => info!(
                    "[Repetition Result] Topic {}: Level {} -> {}, Ease {:.2} -> {:.2}, Next review {}",
                    topic_id,
                    prev.repetition_level,
                    updated.repetition_level,
                    prev.easiness_factor,
                    updated.easiness_factor,
                    updated.next_review_at
                ),
                None => info!(
                    "[Repetition Result] Topic {}: created at level {}, next review {}",
                    topic_id, updated.repetition_level, updated.next_review_at
                ),
            }
            Ok(updated)
        })
    }

    pub fn list_due<S: RepetitionStore>(
        &self,
        store: &S,
        learner_id: LearnerId,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<DueTopic>> {
        let due = store
            .list_due(learner_id, now, limit)?
            .into_iter()
            .map(|record| annotate_due(record, now))
            .collect::<Vec<_>>();
        debug!("[Repetition] {} topics due for learner {}", due.len(), learner_id);
        Ok(due)
    }
}

pub fn annotate_due(record: RepetitionRecord, now: DateTime<Utc>) -> DueTopic {
    DueTopic {
        days_overdue: whole_days_between(record.next_review_at, now),
        days_since_last_study: whole_days_between(record.last_studied_at, now),
        record,
    }
}

fn whole_days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds().div_euclid(DAY_SECONDS)
}

fn validate_score(score: f64) -> Result<()> {
    if (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(SchedulerError::InvalidPerformanceScore(score))
    }
}
