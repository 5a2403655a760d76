// src/planner.rs

use crate::allocation::Allocator;
use crate::config::EngineConfig;
use crate::error::{Result, SchedulerError};
use crate::models::{
    AllocationOptions, CalendarWindow, DailyConstraints, DueTopic, LearnerId, Plan, PlanId,
    PriorityResult, RepetitionRecord, StoredPlan, TopicId,
};
use crate::priority::PriorityScorer;
use crate::repetition::RepetitionTracker;
use crate::schedule::DayScheduler;
use crate::store::{PlanStore, RepetitionStore, StudyStatsSource, TopicCatalog};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};

/// Everything a caller needs to build a plan for one learner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub learner_id: LearnerId,
    pub exam_track: String,
    pub window: CalendarWindow,
    pub constraints: DailyConstraints,
    pub options: AllocationOptions,
}

/// Runs the whole pipeline: rank, allocate, schedule, persist.
#[derive(Debug, Clone, Default)]
pub struct StudyPlanner {
    tracker: RepetitionTracker,
    scorer: PriorityScorer,
    allocator: Allocator,
    scheduler: DayScheduler,
    config: EngineConfig,
}

impl StudyPlanner {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(StudyPlanner {
            tracker: RepetitionTracker::new(config.repetition.clone()),
            scorer: PriorityScorer::new(config.priority.clone()),
            allocator: Allocator::new(config.allocation.clone()),
            scheduler: DayScheduler::new(config.schedule.clone()),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &RepetitionTracker {
        &self.tracker
    }

    pub fn record_study_event<S: RepetitionStore>(
        &self,
        store: &mut S,
        learner_id: LearnerId,
        topic_id: TopicId,
        performance_score: f64,
        now: DateTime<Utc>,
    ) -> Result<RepetitionRecord> {
        self.tracker
            .record_study_event_at(store, learner_id, topic_id, performance_score, now)
    }

    pub fn due_topics<S: RepetitionStore>(
        &self,
        store: &S,
        learner_id: LearnerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DueTopic>> {
        self.tracker
            .list_due(store, learner_id, self.config.priority.due_scan_limit, now)
    }

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
        self.scorer.rank_topics(store, learner_id, exam_track, now)
    }

    /// Net study minutes the window holds, weekend days scaled down.
    pub fn study_budget(&self, window: &CalendarWindow, constraints: &DailyConstraints) -> u32 {
        (0..window.total_days().max(0))
            .map(|offset| {
                constraints.target_minutes_for(
                    window.start_date + Duration::days(offset),
                    self.config.schedule.weekend_load_factor,
                )
            })
            .sum()
    }

    /// Builds a plan without persisting it.
    pub fn build_plan<S>(&self, store: &S, request: &PlanRequest, now: DateTime<Utc>) -> Result<Plan>
    where
        S: TopicCatalog + StudyStatsSource + RepetitionStore,
    {
        let window = &request.window;
        if window.start_date >= window.end_date {
            return Err(SchedulerError::InvalidDateRange {
                start: window.start_date,
                end: window.end_date,
            });
        }

        let ranked = self.rank_topics(store, request.learner_id, &request.exam_track, now)?;
        let budget = self.study_budget(window, &request.constraints);
        debug!(
            "[Planner] Learner {}: {} ranked topics, budget {} minutes over {} days",
            request.learner_id,
            ranked.len(),
            budget,
            window.total_days()
        );

        let allocations = self.allocator.allocate(&ranked, budget, &request.options)?;
        self.scheduler.generate_schedule(
            request.learner_id,
            &allocations,
            window,
            &request.constraints,
        )
    }

    /// Builds a plan and makes it the learner's only active plan.
    ///
    /// Nothing is written if any stage fails.
    pub fn generate_and_activate<S>(
        &self,
        store: &mut S,
        request: &PlanRequest,
        now: DateTime<Utc>,
    ) -> Result<(PlanId, Plan)>
    where
        S: TopicCatalog + StudyStatsSource + RepetitionStore + PlanStore,
    {
        let plan = self.build_plan(store, request, now)?;
        let plan_id = store.replace_active_plan(&plan)?;
        info!(
            "[Planner] Activated plan {} for learner {} ({} to {})",
            plan_id, request.learner_id, plan.start_date, plan.end_date
        );
        Ok((plan_id, plan))
    }

    pub fn active_plan<S: PlanStore>(
        &self,
        store: &S,
        learner_id: LearnerId,
    ) -> Result<Option<StoredPlan>> {
        Ok(store.get_active_plan(learner_id)?)
    }
}
