// src/schedule.rs

//! Day-by-day timetable construction.
//!
//! Topics are drawn round-robin across subjects, with day `d` starting at
//! subject `d mod subject_count`. Each subject hands out its topics in
//! priority order, rotating past topics already used that day and topics
//! whose sessions are spent. Slots are laid out from the preferred start
//! time and the clock only moves forward, so a day's slots never overlap.

use crate::config::ScheduleConfig;
use crate::error::{Result, SchedulerError};
use crate::models::{
    Allocation, CalendarWindow, DailyConstraints, Day, LearnerId, Plan, Slot, SlotType, SubjectId,
    TimeOfDay, TopicId,
};
use chrono::{Duration, NaiveDate, NaiveTime};
use log::{debug, info};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct DayScheduler {
    config: ScheduleConfig,
}

/// Per-subject topic rotation with remaining session counts.
struct SubjectQueue<'a> {
    subject_id: SubjectId,
    topics: Vec<&'a Allocation>,
    remaining: Vec<u32>,
    cursor: usize,
}

impl<'a> SubjectQueue<'a> {
    fn new(subject_id: SubjectId, topics: Vec<&'a Allocation>) -> Self {
        let remaining = topics.iter().map(|a| a.session_count.max(1)).collect();
        SubjectQueue {
            subject_id,
            topics,
            remaining,
            cursor: 0,
        }
    }

    /// Next topic with sessions left that was not used today.
    ///
    /// A subject whose sessions are all spent starts a new cycle.
    fn next_topic(&mut self, used_today: &HashSet<TopicId>) -> Option<&'a Allocation> {
        if self.remaining.iter().all(|&r| r == 0) {
            debug!("[Schedule] Subject {} cycled, refilling sessions", self.subject_id);
            for (slot, topic) in self.remaining.iter_mut().zip(&self.topics) {
                *slot = topic.session_count.max(1);
            }
        }

        let len = self.topics.len();
        for step in 0..len {
            let idx = (self.cursor + step) % len;
            let topic = self.topics[idx];
            if self.remaining[idx] > 0 && !used_today.contains(&topic.topic_id) {
                self.remaining[idx] -= 1;
                self.cursor = (idx + 1) % len;
                return Some(topic);
            }
        }
        None
    }
}

impl DayScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        DayScheduler { config }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Lays the allocations out over every day of `window`, both ends included.
    pub fn generate_schedule(
        &self,
        learner_id: LearnerId,
        allocations: &[Allocation],
        window: &CalendarWindow,
        constraints: &DailyConstraints,
    ) -> Result<Plan> {
        if window.start_date >= window.end_date {
            return Err(SchedulerError::InvalidDateRange {
                start: window.start_date,
                end: window.end_date,
            });
        }
        if allocations.is_empty() {
            return Err(SchedulerError::NoEligibleTopics);
        }

        let mut queues = build_queues(allocations);
        let days: Vec<Day> = (0..window.total_days())
            .map(|offset| {
                let date = window.start_date + Duration::days(offset);
                self.plan_day(&mut queues, offset as usize, date, constraints)
            })
            .collect();

        let plan = Plan {
            learner_id,
            start_date: window.start_date,
            end_date: window.end_date,
            days,
        };
        info!(
            "[Schedule] Plan for learner {}: {} days, {} study minutes across {} subjects",
            learner_id,
            plan.days.len(),
            plan.total_study_minutes(),
            queues.len()
        );
        Ok(plan)
    }

    /// Length of one slot for `allocation` before the window is considered.
    pub fn slot_length(&self, allocation: &Allocation) -> u32 {
        allocation
            .session_minutes()
            .clamp(self.config.min_slot_minutes, self.config.max_slot_minutes)
    }

    fn plan_day(
        &self,
        queues: &mut [SubjectQueue<'_>],
        day_index: usize,
        date: NaiveDate,
        constraints: &DailyConstraints,
    ) -> Day {
        let target = constraints.target_minutes_for(date, self.config.weekend_load_factor);
        if constraints.window_minutes() < target {
            debug!(
                "[Schedule] {}: window of {} min cannot hold the {} min target, slots will be clipped",
                date,
                constraints.window_minutes(),
                target
            );
        }
        let candidates = self.pick_candidates(queues, day_index, target);
        let slots = self.lay_out(&candidates, constraints, target);
        let daily_goal_minutes = slots
            .iter()
            .filter(|s| !s.is_break())
            .map(|s| s.duration_minutes)
            .sum();

        debug!(
            "[Schedule] {}: target {} min, {} candidates, {} slots, {} min planned",
            date,
            target,
            candidates.len(),
            slots.len(),
            daily_goal_minutes
        );
        Day {
            date,
            slots,
            daily_goal_minutes,
        }
    }

    /// Round-robin topic selection for one day.
    ///
    /// Every pass over the subjects either picks a topic or marks a subject
    /// exhausted for the day, so at most `max_slots + subject_count` passes
    /// can happen before one of the stop conditions holds.
    fn pick_candidates<'a>(
        &self,
        queues: &mut [SubjectQueue<'a>],
        day_index: usize,
        target: u32,
    ) -> Vec<&'a Allocation> {
        let subject_count = queues.len();
        let max_slots = self.config.max_slots_per_day;
        let mut offset = day_index % subject_count;
        let mut exhausted = vec![false; subject_count];
        let mut used_today = HashSet::new();
        let mut picked: Vec<&'a Allocation> = Vec::new();
        let mut planned = 0u32;

        for _ in 0..subject_count * (max_slots + subject_count) {
            if picked.len() >= max_slots || planned >= target || exhausted.iter().all(|&e| e) {
                break;
            }
            if !exhausted[offset] {
                match queues[offset].next_topic(&used_today) {
                    Some(allocation) => {
                        used_today.insert(allocation.topic_id);
                        planned += self.slot_length(allocation);
                        picked.push(allocation);
                    }
                    None => exhausted[offset] = true,
                }
            }
            offset = (offset + 1) % subject_count;
        }
        picked
    }

    fn lay_out(
        &self,
        candidates: &[&Allocation],
        constraints: &DailyConstraints,
        target: u32,
    ) -> Vec<Slot> {
        let end = constraints.preferred_end_time;
        let mut clock = constraints.preferred_start_time;
        let mut studied = 0u32;
        let mut slots = Vec::new();

        for (i, allocation) in candidates.iter().enumerate() {
            let window_left = minutes_between(clock, end);
            if window_left == 0 || studied >= target {
                break;
            }

            let duration = self.slot_length(allocation).min(window_left);
            let time_of_day = TimeOfDay::classify(
                clock,
                self.config.morning_end_hour,
                self.config.afternoon_end_hour,
            );
            let in_tail = i + self.config.review_tail_slots >= candidates.len();
            let slot_type = if constraints.include_review_sessions
                && time_of_day == TimeOfDay::Evening
                && in_tail
            {
                SlotType::Review
            } else {
                SlotType::Study
            };

            let slot_end = clock + Duration::minutes(duration as i64);
            slots.push(Slot {
                subject_id: Some(allocation.subject_id),
                topic_id: Some(allocation.topic_id),
                start_time: clock,
                end_time: slot_end,
                duration_minutes: duration,
                slot_type,
                priority: slot_priority(allocation.priority_score),
            });
            clock = slot_end;
            studied += duration;

            let is_final = i + 1 == candidates.len();
            let pause = constraints.break_duration_minutes;
            if !is_final && studied < target && pause > 0 && minutes_between(clock, end) > pause {
                let break_end = clock + Duration::minutes(pause as i64);
                slots.push(Slot {
                    subject_id: None,
                    topic_id: None,
                    start_time: clock,
                    end_time: break_end,
                    duration_minutes: pause,
                    slot_type: SlotType::Break,
                    priority: 1,
                });
                clock = break_end;
            }
        }
        slots
    }
}

fn build_queues(allocations: &[Allocation]) -> Vec<SubjectQueue<'_>> {
    let mut grouped: Vec<(SubjectId, Vec<&Allocation>)> = Vec::new();
    for allocation in allocations {
        match grouped.iter_mut().find(|(id, _)| *id == allocation.subject_id) {
            Some((_, topics)) => topics.push(allocation),
            None => grouped.push((allocation.subject_id, vec![allocation])),
        }
    }
    grouped
        .into_iter()
        .map(|(subject_id, topics)| SubjectQueue::new(subject_id, topics))
        .collect()
}

fn minutes_between(from: NaiveTime, to: NaiveTime) -> u32 {
    (to - from).num_minutes().max(0) as u32
}

/// Maps a priority score in [0, 1] onto the 1-5 slot priority scale.
fn slot_priority(score: f64) -> u8 {
    (1.0 + (score.clamp(0.0, 1.0) * 4.0).round()) as u8
}
