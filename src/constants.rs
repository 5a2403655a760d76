// src/constants.rs

// --- Time Constants ---
pub const DAY_SECONDS: i64 = 86400;
pub const MINUTES_PER_HOUR: u32 = 60;

// --- Spaced Repetition Parameters ---
pub const SUCCESS_THRESHOLD: f64 = 0.7; // Performance score counted as a correct recall
pub const FIRST_REVIEW_DAYS: i64 = 1;
pub const MAX_REPETITION_LEVEL: u8 = 5;
pub const INTERVAL_TABLE_DAYS: [i64; 5] = [1, 3, 7, 14, 30]; // Levels 0..=3, then >= 4

pub const EASE_FACTOR_MIN: f64 = 1.3;
pub const EASE_FACTOR_MAX: f64 = 2.5;
pub const EASE_FACTOR_DEFAULT: f64 = 2.5;

// --- Priority Weights (sum to 1.0) ---
pub const WEIGHT_EXAM: f64 = 0.4;
pub const WEIGHT_WEAKNESS: f64 = 0.3;
pub const WEIGHT_OVERDUE: f64 = 0.2;
pub const WEIGHT_NEGLECT: f64 = 0.1;

// --- Priority Thresholds ---
pub const WEAKNESS_THRESHOLD: f64 = 0.6; // Success rate below this counts as weak
pub const WEAKNESS_MIN_QUESTIONS: u32 = 5;
pub const OVERDUE_HORIZON_DAYS: f64 = 7.0;
pub const PROGRESS_SATURATION_SESSIONS: f64 = 5.0;
pub const HIGH_EXAM_SCORE: f64 = 0.7;
pub const MAX_REASONS: usize = 3;
pub const DUE_SCAN_LIMIT: usize = 200;

pub const BASE_RECOMMENDED_MINUTES: f64 = 60.0;
pub const WEAK_MINUTES_MULTIPLIER: f64 = 1.5;
pub const EXAM_MINUTES_BONUS: f64 = 0.5;

// --- Allocation ---
pub const MAX_SELECTED_TOPICS: usize = 30;
pub const MIN_TOPICS_PER_SUBJECT: usize = 3;
pub const MAX_TOPICS_PER_SUBJECT: usize = 8;
pub const MIN_TOPIC_MINUTES: u32 = 30;
pub const MAX_TOPIC_MINUTES: u32 = 600;
pub const SESSION_LENGTH_MINUTES: u32 = 75;
pub const WEAK_FOCUS_MULTIPLIER: f64 = 1.2;

// --- Day Scheduling ---
pub const WEEKEND_LOAD_FACTOR: f64 = 0.7;
pub const MAX_SLOTS_PER_DAY: usize = 6;
pub const MIN_SLOT_MINUTES: u32 = 60;
pub const MAX_SLOT_MINUTES: u32 = 120;
pub const MORNING_END_HOUR: u32 = 12;
pub const AFTERNOON_END_HOUR: u32 = 18;
pub const REVIEW_TAIL_SLOTS: usize = 2;
