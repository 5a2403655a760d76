// src/store.rs

//! Boundaries between the engine and whatever persists its inputs and outputs.
//!
//! Writes take `&mut self`, so a single store value can never interleave two
//! read-modify-write cycles. Adapters that share state across processes (see
//! [`crate::repository::SqliteStore`]) must provide the same guarantee with
//! transactions.

use crate::error::{Result, StoreError, StoreResult};
use crate::models::{
    LearnerId, Plan, PlanId, RepetitionRecord, StoredPlan, StudyStat, Subject, Topic, TopicId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub trait TopicCatalog {
    /// Topics whose subject belongs to `exam_track`, in catalog order.
    fn list_accessible_topics(&self, exam_track: &str) -> StoreResult<Vec<Topic>>;
}

pub trait StudyStatsSource {
    fn get_topic_stats(&self, learner_id: LearnerId) -> StoreResult<Vec<StudyStat>>;
}

pub trait RepetitionStore {
    fn get(&self, learner_id: LearnerId, topic_id: TopicId)
        -> StoreResult<Option<RepetitionRecord>>;

    fn upsert(&mut self, record: &RepetitionRecord) -> StoreResult<()>;

    /// Reads the current record, hands it to `f` and stores what `f` returns
    /// as one unit. Nothing is written when `f` fails.
    ///
    /// Stores shared between connections override this so no other writer
    /// can land between the read and the write.
    fn update_with<F>(
        &mut self,
        learner_id: LearnerId,
        topic_id: TopicId,
        f: F,
    ) -> Result<RepetitionRecord>
    where
        F: FnOnce(Option<&RepetitionRecord>) -> Result<RepetitionRecord>,
    {
        let previous = self.get(learner_id, topic_id)?;
        let updated = f(previous.as_ref())?;
        self.upsert(&updated)?;
        Ok(updated)
    }

    /// Records with `next_review_at <= now`, most overdue first.
    fn list_due(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<RepetitionRecord>>;
}

pub trait PlanStore {
    fn deactivate_all_plans(&mut self, learner_id: LearnerId) -> StoreResult<()>;

    /// Inserts the plan with its days and slots as one unit, flagged active.
    /// Fails with [`StoreError::ActivePlanExists`] if the learner already has
    /// an active plan.
    fn create_plan(&mut self, plan: &Plan) -> StoreResult<PlanId>;

    /// Deactivates every plan of the learner and creates `plan` in the same unit
    /// of work. Either both happen or neither does.
    fn replace_active_plan(&mut self, plan: &Plan) -> StoreResult<PlanId>;

    fn get_active_plan(&self, learner_id: LearnerId) -> StoreResult<Option<StoredPlan>>;
}

/// Process-local store backing every trait with plain collections.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    subjects: Vec<Subject>,
    topics: Vec<Topic>,
    stats: HashMap<LearnerId, Vec<StudyStat>>,
    records: HashMap<(LearnerId, TopicId), RepetitionRecord>,
    plans: Vec<StoredPlan>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(subjects: Vec<Subject>, topics: Vec<Topic>) -> Self {
        InMemoryStore {
            subjects,
            topics,
            ..Self::default()
        }
    }

    pub fn set_stats(&mut self, learner_id: LearnerId, stats: Vec<StudyStat>) {
        self.stats.insert(learner_id, stats);
    }

    pub fn plans(&self) -> &[StoredPlan] {
        &self.plans
    }
}

impl TopicCatalog for InMemoryStore {
    fn list_accessible_topics(&self, exam_track: &str) -> StoreResult<Vec<Topic>> {
        Ok(self
            .topics
            .iter()
            .filter(|t| {
                self.subjects
                    .iter()
                    .any(|s| s.id == t.subject_id && s.exam_track == exam_track)
            })
            .cloned()
            .collect())
    }
}

impl StudyStatsSource for InMemoryStore {
    fn get_topic_stats(&self, learner_id: LearnerId) -> StoreResult<Vec<StudyStat>> {
        Ok(self.stats.get(&learner_id).cloned().unwrap_or_default())
    }
}

impl RepetitionStore for InMemoryStore {
    fn get(
        &self,
        learner_id: LearnerId,
        topic_id: TopicId,
    ) -> StoreResult<Option<RepetitionRecord>> {
        Ok(self.records.get(&(learner_id, topic_id)).cloned())
    }

    fn upsert(&mut self, record: &RepetitionRecord) -> StoreResult<()> {
        self.records
            .insert((record.learner_id, record.topic_id), record.clone());
        Ok(())
    }

    fn list_due(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<RepetitionRecord>> {
        let mut due: Vec<RepetitionRecord> = self
            .records
            .values()
            .filter(|r| r.learner_id == learner_id && r.next_review_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|r| (r.next_review_at, r.topic_id));
        due.truncate(limit);
        Ok(due)
    }
}

impl PlanStore for InMemoryStore {
    fn deactivate_all_plans(&mut self, learner_id: LearnerId) -> StoreResult<()> {
        self.plans
            .iter_mut()
            .filter(|p| p.plan.learner_id == learner_id)
            .for_each(|p| p.is_active = false);
        Ok(())
    }

    fn create_plan(&mut self, plan: &Plan) -> StoreResult<PlanId> {
        if self
            .plans
            .iter()
            .any(|p| p.plan.learner_id == plan.learner_id && p.is_active)
        {
            return Err(StoreError::ActivePlanExists(plan.learner_id));
        }
        let id = self.plans.len() as PlanId + 1;
        self.plans.push(StoredPlan {
            id,
            is_active: true,
            created_at: Utc::now(),
            plan: plan.clone(),
        });
        Ok(id)
    }

    fn replace_active_plan(&mut self, plan: &Plan) -> StoreResult<PlanId> {
        self.deactivate_all_plans(plan.learner_id)?;
        self.create_plan(plan)
    }

    fn get_active_plan(&self, learner_id: LearnerId) -> StoreResult<Option<StoredPlan>> {
        Ok(self
            .plans
            .iter()
            .rev()
            .find(|p| p.plan.learner_id == learner_id && p.is_active)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn record(topic_id: TopicId, next_review_at: DateTime<Utc>) -> RepetitionRecord {
        RepetitionRecord {
            learner_id: 7,
            topic_id,
            last_studied_at: next_review_at - Duration::days(3),
            next_review_at,
            repetition_level: 1,
            consecutive_correct: 1,
            easiness_factor: 2.5,
        }
    }

    #[test]
    fn list_due_orders_most_overdue_first() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let mut store = InMemoryStore::new();
        store.upsert(&record(1, now - Duration::days(1))).unwrap();
        store.upsert(&record(2, now - Duration::days(5))).unwrap();
        store.upsert(&record(3, now + Duration::days(2))).unwrap();

        let due = store.list_due(7, now, 10).unwrap();
        let ids: Vec<TopicId> = due.iter().map(|r| r.topic_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(store.list_due(7, now, 1).unwrap().len(), 1);
        assert!(store.list_due(8, now, 10).unwrap().is_empty());
    }

    #[test]
    fn catalog_filters_by_exam_track() {
        let subjects = vec![
            Subject {
                id: 1,
                name: "Math".into(),
                color: "#f00".into(),
                exam_track: "science".into(),
            },
            Subject {
                id: 2,
                name: "History".into(),
                color: "#0f0".into(),
                exam_track: "humanities".into(),
            },
        ];
        let topic = |id, subject_id| Topic {
            id,
            subject_id,
            name: format!("topic {id}"),
            difficulty: Difficulty::Medium,
            exam_weight: 1.0,
        };
        let store = InMemoryStore::with_catalog(subjects, vec![topic(10, 1), topic(20, 2), topic(11, 1)]);
        let ids: Vec<TopicId> = store
            .list_accessible_topics("science")
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[test]
    fn replacing_the_active_plan_keeps_only_one_active() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let plan = Plan {
            learner_id: 3,
            start_date: date,
            end_date: date + Duration::days(6),
            days: Vec::new(),
        };
        let mut store = InMemoryStore::new();
        let first = store.replace_active_plan(&plan).unwrap();
        let second = store.replace_active_plan(&plan).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.plans().iter().filter(|p| p.is_active).count(), 1);
        assert_eq!(store.get_active_plan(3).unwrap().unwrap().id, second);
    }

    #[test]
    fn create_plan_refuses_a_second_active_plan() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let plan = Plan {
            learner_id: 3,
            start_date: date,
            end_date: date + Duration::days(6),
            days: Vec::new(),
        };
        let mut store = InMemoryStore::new();
        let first = store.create_plan(&plan).unwrap();
        assert!(matches!(
            store.create_plan(&plan),
            Err(StoreError::ActivePlanExists(3))
        ));
        assert_eq!(store.plans().len(), 1);
        assert_eq!(store.get_active_plan(3).unwrap().unwrap().id, first);

        store.deactivate_all_plans(3).unwrap();
        assert!(store.create_plan(&plan).is_ok());
    }

    #[test]
    fn update_with_skips_the_write_on_error() {
        let mut store = InMemoryStore::new();
        let result = store.update_with(7, 1, |previous| {
            assert!(previous.is_none());
            Err(crate::error::SchedulerError::NoEligibleTopics)
        });
        assert!(result.is_err());
        assert!(store.get(7, 1).unwrap().is_none());
    }
}
