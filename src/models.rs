// src/models.rs

use crate::constants::MINUTES_PER_HOUR;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub type LearnerId = i64;
pub type SubjectId = i64;
pub type TopicId = i64;
pub type PlanId = i64;

// --- Reference Data ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy = 1,
    Medium = 2,
    Hard = 3,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub color: String,
    pub exam_track: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub subject_id: SubjectId,
    pub name: String,
    pub difficulty: Difficulty,
    /// Historical average number of exam questions drawn from this topic.
    pub exam_weight: f64,
}

// --- Learner Statistics ---

/// Aggregated session statistics for one topic, as read from the study log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyStat {
    pub topic_id: TopicId,
    /// correct / (correct + wrong + empty); 0 when nothing was answered.
    pub success_rate: f64,
    pub total_sessions: u32,
    pub total_questions: u32,
    pub total_duration_minutes: u32,
    pub last_studied_at: Option<DateTime<Utc>>,
}

impl StudyStat {
    pub fn empty(topic_id: TopicId) -> Self {
        StudyStat {
            topic_id,
            success_rate: 0.0,
            total_sessions: 0,
            total_questions: 0,
            total_duration_minutes: 0,
            last_studied_at: None,
        }
    }
}

// --- Repetition State ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionRecord {
    pub learner_id: LearnerId,
    pub topic_id: TopicId,
    pub last_studied_at: DateTime<Utc>,
    pub next_review_at: DateTime<Utc>,
    pub repetition_level: u8,
    pub consecutive_correct: u32,
    pub easiness_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueTopic {
    pub record: RepetitionRecord,
    pub days_overdue: i64,
    pub days_since_last_study: i64,
}

// --- Derived Planning Data ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityResult {
    pub topic_id: TopicId,
    pub subject_id: SubjectId,
    pub priority_score: f64,
    pub recommended_minutes: u32,
    pub reasons: Vec<String>,
    pub success_rate: f64,
    pub is_weak: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationOptions {
    pub focus_on_weak_topics: bool,
    /// Restrict allocation to these subjects; empty means all.
    pub priority_subjects: Vec<SubjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub topic_id: TopicId,
    pub subject_id: SubjectId,
    pub priority_score: f64,
    pub allocated_minutes: u32,
    pub session_count: u32,
}

impl Allocation {
    /// Average length of one session of this topic.
    pub fn session_minutes(&self) -> u32 {
        if self.session_count == 0 {
            return self.allocated_minutes;
        }
        (self.allocated_minutes as f64 / self.session_count as f64).round() as u32
    }
}

// --- Timetable ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    Study,
    Review,
    Practice,
    Break,
}

impl SlotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotType::Study => "study",
            SlotType::Review => "review",
            SlotType::Practice => "practice",
            SlotType::Break => "break",
        }
    }
}

impl FromStr for SlotType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "study" => Ok(SlotType::Study),
            "review" => Ok(SlotType::Review),
            "practice" => Ok(SlotType::Practice),
            "break" => Ok(SlotType::Break),
            other => Err(format!("unknown slot type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn classify(time: NaiveTime, morning_end_hour: u32, afternoon_end_hour: u32) -> Self {
        if time.hour() < morning_end_hour {
            TimeOfDay::Morning
        } else if time.hour() < afternoon_end_hour {
            TimeOfDay::Afternoon
        } else {
            TimeOfDay::Evening
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub subject_id: Option<SubjectId>,
    pub topic_id: Option<TopicId>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
    pub slot_type: SlotType,
    pub priority: u8,
}

impl Slot {
    pub fn is_break(&self) -> bool {
        self.slot_type == SlotType::Break
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
    pub daily_goal_minutes: u32,
}

impl Day {
    pub fn study_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| !s.is_break())
    }

    /// Subject of the first non-break slot.
    pub fn leading_subject(&self) -> Option<SubjectId> {
        self.study_slots().next().and_then(|s| s.subject_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub learner_id: LearnerId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<Day>,
}

impl Plan {
    pub fn total_study_minutes(&self) -> u32 {
        self.days.iter().map(|d| d.daily_goal_minutes).sum()
    }

    /// Scheduled non-break minutes per subject, in order of first appearance.
    pub fn subject_minutes(&self) -> Vec<(SubjectId, u32)> {
        self.days
            .iter()
            .flat_map(|d| d.study_slots())
            .filter_map(|s| s.subject_id.map(|id| (id, s.duration_minutes)))
            .fold(Vec::new(), |mut acc: Vec<(SubjectId, u32)>, (id, minutes)| {
                match acc.iter_mut().find(|(sid, _)| *sid == id) {
                    Some(entry) => entry.1 += minutes,
                    None => acc.push((id, minutes)),
                }
                acc
            })
    }
}

/// A plan as it was persisted, with its storage identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPlan {
    pub id: PlanId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub plan: Plan,
}

// --- Planning Inputs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarWindow {
    pub start_date: NaiveDate,
    /// Inclusive last day of the plan.
    pub end_date: NaiveDate,
}

impl CalendarWindow {
    pub fn total_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyConstraints {
    pub daily_study_hours: f64,
    pub preferred_start_time: NaiveTime,
    pub preferred_end_time: NaiveTime,
    pub break_duration_minutes: u32,
    pub include_review_sessions: bool,
}

impl DailyConstraints {
    /// Study minutes per weekday once the breaks are taken out of the hours.
    pub fn net_minutes_per_day(&self) -> u32 {
        let gross = (self.daily_study_hours * MINUTES_PER_HOUR as f64).round().max(0.0) as u32;
        let breaks = (self.daily_study_hours / 2.0).floor().max(0.0) as u32;
        gross.saturating_sub(breaks * self.break_duration_minutes)
    }

    pub fn target_minutes_for(&self, date: NaiveDate, weekend_load_factor: f64) -> u32 {
        let net = self.net_minutes_per_day();
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => (net as f64 * weekend_load_factor).round() as u32,
            _ => net,
        }
    }

    /// Minutes between the preferred start and end times.
    pub fn window_minutes(&self) -> u32 {
        (self.preferred_end_time - self.preferred_start_time)
            .num_minutes()
            .max(0) as u32
    }
}

// Used for seeding the catalog
#[derive(Deserialize)]
pub struct JsonSubject {
    pub id: SubjectId,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub exam_track: String,
    #[serde(default)]
    pub topics: Vec<JsonTopic>,
}

#[derive(Deserialize)]
pub struct JsonTopic {
    pub id: TopicId,
    pub name: String,
    pub difficulty: String,
    #[serde(default)]
    pub exam_weight: f64,
}

fn default_color() -> String {
    "#808080".to_string()
}
