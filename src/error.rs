// src/error.rs

use chrono::NaiveDate;
use thiserror::Error;

/// Failures raised by the storage adapters behind the store traits.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("catalog data could not be parsed: {0}")]
    Catalog(#[from] serde_json::Error),
    #[error("learner {0} already has an active plan")]
    ActivePlanExists(i64),
    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures raised by the scheduling engine.
///
/// Every operation either returns a complete result or fails with one of these
/// before any state is written.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no eligible topics to schedule")]
    NoEligibleTopics,
    #[error("invalid date range: end {end} must be after start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("performance score {0} is outside [0, 1]")]
    InvalidPerformanceScore(f64),
    #[error("study budget of {available} minutes cannot hold a {minimum}-minute allocation")]
    InsufficientBudget { available: u32, minimum: u32 },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
