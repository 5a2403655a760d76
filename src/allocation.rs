// src/allocation.rs

use crate::config::AllocationConfig;
use crate::error::{Result, SchedulerError};
use crate::models::{Allocation, AllocationOptions, PriorityResult, SubjectId, TopicId};
use log::{debug, info, warn};

/// Splits a study budget across ranked topics.
#[derive(Debug, Clone, Default)]
pub struct Allocator {
    config: AllocationConfig,
}

impl Allocator {
    pub fn new(config: AllocationConfig) -> Self {
        Allocator { config }
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    /// Turns a ranked topic list into per-topic minute budgets.
    ///
    /// The result is ordered by priority, best first, and its total never
    /// exceeds `total_net_study_minutes`.
    pub fn allocate(
        &self,
        ranked: &[PriorityResult],
        total_net_study_minutes: u32,
        options: &AllocationOptions,
    ) -> Result<Vec<Allocation>> {
        let selected = self.select_topics(ranked, options);
        if selected.is_empty() {
            warn!("[Allocation] No eligible topics after filtering");
            return Err(SchedulerError::NoEligibleTopics);
        }
        if total_net_study_minutes < self.config.min_topic_minutes {
            return Err(SchedulerError::InsufficientBudget {
                available: total_net_study_minutes,
                minimum: self.config.min_topic_minutes,
            });
        }

        let total_priority: f64 = selected.iter().map(|r| r.priority_score).sum();
        let budget = total_net_study_minutes as f64;
        let equal_share = budget / selected.len() as f64;

        let raw: Vec<Allocation> = selected
            .iter()
            .map(|r| {
                let share = if total_priority > 0.0 {
                    r.priority_score / total_priority * budget
                } else {
                    equal_share
                };
                let boosted = if options.focus_on_weak_topics && self.is_boostable(r) {
                    share * self.config.weak_focus_multiplier
                } else {
                    share
                };
                self.build(r.topic_id, r.subject_id, r.priority_score, boosted.round() as u32)
            })
            .collect();

        let allocations = self.normalize(raw, total_net_study_minutes);
        info!(
            "[Allocation] {} topics, {} of {} minutes allocated",
            allocations.len(),
            allocations.iter().map(|a| a.allocated_minutes).sum::<u32>(),
            total_net_study_minutes
        );
        Ok(allocations)
    }

    /// Applies the subject filter and the per-subject quota, returning the
    /// chosen topics best first.
    pub fn select_topics<'a>(
        &self,
        ranked: &'a [PriorityResult],
        options: &AllocationOptions,
    ) -> Vec<&'a PriorityResult> {
        let filtered: Vec<&PriorityResult> = if options.priority_subjects.is_empty() {
            ranked.iter().collect()
        } else {
            ranked
                .iter()
                .filter(|r| options.priority_subjects.contains(&r.subject_id))
                .collect()
        };
        let pool = if filtered.is_empty() {
            if !options.priority_subjects.is_empty() {
                debug!("[Allocation] Subject filter matched nothing, using all topics");
            }
            ranked.iter().collect()
        } else {
            filtered
        };

        let groups = group_by_subject(&pool);
        if groups.is_empty() {
            return Vec::new();
        }
        let per_subject = (self.config.max_selected_topics / groups.len()).clamp(
            self.config.min_topics_per_subject,
            self.config.max_topics_per_subject,
        );
        debug!(
            "[Allocation] {} subjects, up to {} topics each",
            groups.len(),
            per_subject
        );

        let mut selected: Vec<&PriorityResult> = groups
            .into_iter()
            .flat_map(|(_, topics)| topics.into_iter().take(per_subject))
            .collect();
        selected.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
        selected.truncate(self.config.max_selected_topics);
        selected
    }

    /// Scales allocations down so their sum fits `budget`.
    ///
    /// Already-fitting input is returned unchanged, so a second pass is a
    /// no-op. When the per-topic floor alone overruns the budget, the
    /// lowest-priority allocations are dropped.
    pub fn normalize(&self, allocations: Vec<Allocation>, budget: u32) -> Vec<Allocation> {
        let total: u32 = allocations.iter().map(|a| a.allocated_minutes).sum();
        if total <= budget {
            return allocations;
        }

        let factor = budget as f64 / total as f64;
        debug!(
            "[Allocation] {} minutes over a budget of {}, scaling by {:.3}",
            total, budget, factor
        );
        let mut scaled: Vec<Allocation> = allocations
            .into_iter()
            .map(|a| {
                let minutes = (a.allocated_minutes as f64 * factor).floor() as u32;
                self.build(a.topic_id, a.subject_id, a.priority_score, minutes)
            })
            .collect();
        scaled.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));

        while scaled.len() > 1 && scaled.iter().map(|a| a.allocated_minutes).sum::<u32>() > budget {
            if let Some(dropped) = scaled.pop() {
                debug!(
                    "[Allocation] Dropping topic {} to stay within budget",
                    dropped.topic_id
                );
            }
        }
        scaled
    }

    fn is_boostable(&self, r: &PriorityResult) -> bool {
        r.success_rate > 0.0 && r.success_rate < self.config.weak_focus_ceiling
    }

    fn build(
        &self,
        topic_id: TopicId,
        subject_id: SubjectId,
        priority_score: f64,
        minutes: u32,
    ) -> Allocation {
        let allocated_minutes =
            minutes.clamp(self.config.min_topic_minutes, self.config.max_topic_minutes);
        Allocation {
            topic_id,
            subject_id,
            priority_score,
            allocated_minutes,
            session_count: allocated_minutes.div_ceil(self.config.session_length_minutes),
        }
    }
}

/// Groups topics by subject, keeping subjects and topics in input order.
fn group_by_subject<'a>(
    topics: &[&'a PriorityResult],
) -> Vec<(SubjectId, Vec<&'a PriorityResult>)> {
    let init: Vec<(SubjectId, Vec<&'a PriorityResult>)> = Vec::new();
    topics.iter().fold(init, |mut groups, &r| {
        match groups.iter_mut().find(|(id, _)| *id == r.subject_id) {
            Some((_, members)) => members.push(r),
            None => groups.push((r.subject_id, vec![r])),
        }
        groups
    })
}
