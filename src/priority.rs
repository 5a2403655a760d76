// src/priority.rs

use crate::config::PriorityConfig;
use crate::error::Result;
use crate::models::{DueTopic, LearnerId, PriorityResult, StudyStat, Topic, TopicId};
use crate::repetition::annotate_due;
use crate::store::{RepetitionStore, StudyStatsSource, TopicCatalog};
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashMap;

/// Ranks every accessible topic, including ones the learner never touched.
#[derive(Debug, Clone, Default)]
pub struct PriorityScorer {
    config: PriorityConfig,
}

/// The four normalized signals behind one priority score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub exam: f64,
    pub weakness: f64,
    pub overdue: f64,
    pub progress: f64,
}

impl PriorityScorer {
    pub fn new(config: PriorityConfig) -> Self {
        PriorityScorer { config }
    }

    pub fn config(&self) -> &PriorityConfig {
        &self.config
    }

    /// Fetches the learner's catalog, statistics and due reviews, then scores.
    pub fn rank_topics<S>(
        &self,
        store: &S,
        learner_id: LearnerId,
        exam_track: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PriorityResult>>
    where
        S: TopicCatalog + StudyStatsSource + RepetitionStore,
    {
        let topics = store.list_accessible_topics(exam_track)?;
        let stats = store.get_topic_stats(learner_id)?;
        let due: Vec<DueTopic> = store
            .list_due(learner_id, now, self.config.due_scan_limit)?
            .into_iter()
            .map(|r| annotate_due(r, now))
            .collect();

        let ranked = self.score_topics(&topics, &stats, &due);
        info!(
            "[Priority] Ranked {} topics for learner {} on track {}",
            ranked.len(),
            learner_id,
            exam_track
        );
        Ok(ranked)
    }

    /// Scores `topics` and returns them best first; equal scores keep catalog order.
    pub fn score_topics(
        &self,
        topics: &[Topic],
        stats: &[StudyStat],
        due: &[DueTopic],
    ) -> Vec<PriorityResult> {
        let stats_by_topic: HashMap<TopicId, &StudyStat> =
            stats.iter().map(|s| (s.topic_id, s)).collect();
        let due_by_topic: HashMap<TopicId, &DueTopic> =
            due.iter().map(|d| (d.record.topic_id, d)).collect();
        let max_exam_weight = topics
            .iter()
            .map(|t| t.exam_weight)
            .fold(1.0_f64, f64::max);

        let mut results: Vec<PriorityResult> = topics
            .iter()
            .map(|topic| {
                let empty = StudyStat::empty(topic.id);
                let stat = stats_by_topic.get(&topic.id).copied().unwrap_or(&empty);
                let due = due_by_topic.get(&topic.id).copied();
                self.score_one(topic, stat, due, max_exam_weight)
            })
            .collect();

        results.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
        results
    }

    pub fn breakdown(
        &self,
        topic: &Topic,
        stat: &StudyStat,
        due: Option<&DueTopic>,
        max_exam_weight: f64,
    ) -> ScoreBreakdown {
        let c = &self.config;
        let exam = (topic.exam_weight.max(0.0) / max_exam_weight.max(1.0)).min(1.0);
        let weakness = if stat.success_rate < c.weakness_threshold
            && stat.total_questions >= c.weakness_min_questions
        {
            (1.0 - stat.success_rate).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let overdue = due
            .map(|d| (d.days_overdue.max(0) as f64 / c.overdue_horizon_days).min(1.0))
            .unwrap_or(0.0);
        let progress = (stat.total_sessions as f64 / c.progress_saturation_sessions).min(1.0);
        ScoreBreakdown {
            exam,
            weakness,
            overdue,
            progress,
        }
    }

    fn score_one(
        &self,
        topic: &Topic,
        stat: &StudyStat,
        due: Option<&DueTopic>,
        max_exam_weight: f64,
    ) -> PriorityResult {
        let c = &self.config;
        let w = &c.weights;
        let b = self.breakdown(topic, stat, due, max_exam_weight);

        let score = w.exam * b.exam
            + w.weakness * b.weakness
            + w.overdue * b.overdue
            + w.neglect * (1.0 - b.progress);
        let is_weak = b.weakness > 0.0;

        let weak_mult = if is_weak { c.weak_minutes_multiplier } else { 1.0 };
        let recommended_minutes = (c.base_recommended_minutes
            * weak_mult
            * (1.0 + b.exam * c.exam_minutes_bonus))
            .round() as u32;

        let mut reasons = Vec::new();
        if b.exam >= c.high_exam_score {
            reasons.push(format!(
                "High exam weight (~{:.1} questions per exam)",
                topic.exam_weight
            ));
        }
        if is_weak {
            reasons.push(format!(
                "Weak performance ({:.0}% success)",
                stat.success_rate * 100.0
            ));
        }
        if let Some(d) = due.filter(|d| d.days_overdue > 0) {
            reasons.push(format!("Review overdue by {} days", d.days_overdue));
        }
        if stat.total_sessions == 0 {
            reasons.push("Never studied".to_string());
        }
        reasons.truncate(c.max_reasons);

        debug!(
            "[Priority] Topic {}: exam {:.2}, weak {:.2}, overdue {:.2}, progress {:.2} => {:.3}",
            topic.id, b.exam, b.weakness, b.overdue, b.progress, score
        );

        PriorityResult {
            topic_id: topic.id,
            subject_id: topic.subject_id,
            priority_score: score.clamp(0.0, 1.0),
            recommended_minutes,
            reasons,
            success_rate: stat.success_rate,
            is_weak,
        }
    }
}
