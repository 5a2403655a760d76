// src/lib.rs

//! Adaptive study scheduling.
//!
//! Four stages turn a learner's history into a dated timetable:
//!
//! 1. [`RepetitionTracker`] keeps one spaced-repetition record per topic.
//! 2. [`PriorityScorer`] ranks topics from exam weight, weakness, overdue
//!    reviews and neglect.
//! 3. [`Allocator`] splits the window's study minutes across the ranking.
//! 4. [`DayScheduler`] lays the minutes out as slots on each calendar day.
//!
//! [`StudyPlanner`] chains them against any store implementing the traits in
//! [`store`]; [`SqliteStore`] is the bundled persistent one.

pub mod allocation;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod models;
pub mod planner;
pub mod priority;
pub mod repetition;
pub mod repository;
pub mod schedule;
pub mod store;

pub use allocation::Allocator;
pub use config::EngineConfig;
pub use error::{Result, SchedulerError, StoreError};
pub use planner::{PlanRequest, StudyPlanner};
pub use priority::PriorityScorer;
pub use repetition::RepetitionTracker;
pub use repository::SqliteStore;
pub use schedule::DayScheduler;
pub use store::InMemoryStore;
