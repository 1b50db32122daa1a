//! Common Types and Constants
//!
//! Shared data structures used across the scheduling and ML modules.

use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Feature dimension shared by the feature builder and the retention predictor
pub const FEATURE_DIMENSION: usize = 12;

/// Default ease factor for a fresh item
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Upper bound of the ease factor in every mode
pub const MAX_EASE_FACTOR: f64 = 3.0;

/// Ease factor floor when scheduling from ratings
pub const MIN_EASE_FACTOR_RATING: f64 = 1.3;

/// Ease factor floor when scheduling from spelling outcomes
pub const MIN_EASE_FACTOR_SPELLING: f64 = 1.1;

/// Ease penalty applied on a lapse
pub const LAPSE_EASE_PENALTY: f64 = 0.2;

/// Maximum feature absolute value accepted by the predictor
pub const MAX_FEATURE_ABS: f64 = 100.0;

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-9;

/// Feature vector layout: see [`crate::features`]
pub type FeatureVector = [f64; FEATURE_DIMENSION];

// ==================== Progress ====================

/// Learning status of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    #[default]
    New,
    Learning,
    Mastered,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::New => "NEW",
            ProgressStatus::Learning => "LEARNING",
            ProgressStatus::Mastered => "MASTERED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NEW" => Some(ProgressStatus::New),
            "LEARNING" => Some(ProgressStatus::Learning),
            "MASTERED" => Some(ProgressStatus::Mastered),
            _ => None,
        }
    }
}

/// Per-item scheduling record, shared across every wordbook the item belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub status: ProgressStatus,
    /// Successful passes since the last lapse
    pub repetitions: i32,
    /// Last committed interval (0 = still inside the learning phase)
    pub interval_days: i32,
    pub ease_factor: f64,
    /// Epoch milliseconds
    pub next_review_time: i64,
    /// Lifetime evaluated reviews, never reset
    pub review_count: i32,
    #[serde(default)]
    pub lapse_count: i32,
    #[serde(default)]
    pub consecutive_correct: i32,
    #[serde(default)]
    pub spelling_correct_count: i32,
    #[serde(default)]
    pub spelling_attempt_count: i32,
    #[serde(default)]
    pub last_review_time: Option<i64>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            status: ProgressStatus::New,
            repetitions: 0,
            interval_days: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            next_review_time: 0,
            review_count: 0,
            lapse_count: 0,
            consecutive_correct: 0,
            spelling_correct_count: 0,
            spelling_attempt_count: 0,
            last_review_time: None,
        }
    }
}

impl Progress {
    pub fn new_item() -> Self {
        Self::default()
    }

    /// No interval has been established yet
    pub fn is_learning_phase(&self) -> bool {
        self.interval_days <= 0
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.status == ProgressStatus::New || self.next_review_time <= now_ms
    }

    /// Copy with malformed counters clamped instead of rejected
    pub fn sanitized(&self) -> Self {
        let ease_factor = if self.ease_factor.is_finite() {
            self.ease_factor.clamp(MIN_EASE_FACTOR_SPELLING, MAX_EASE_FACTOR)
        } else {
            DEFAULT_EASE_FACTOR
        };
        Self {
            status: self.status,
            repetitions: self.repetitions.max(0),
            interval_days: self.interval_days.max(0),
            ease_factor,
            next_review_time: self.next_review_time.max(0),
            review_count: self.review_count.max(0),
            lapse_count: self.lapse_count.max(0),
            consecutive_correct: self.consecutive_correct.max(0),
            spelling_correct_count: self.spelling_correct_count.max(0),
            spelling_attempt_count: self.spelling_attempt_count.max(0),
            last_review_time: self.last_review_time.map(|t| t.max(0)),
        }
    }
}

// ==================== Outcomes ====================

/// Self-assessed rating from flashcard review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rating {
    Again,
    Hard,
    Good,
}

impl Rating {
    /// Wrong answers lapse, hesitant correct answers count as hard
    pub fn from_answer(is_correct: bool, response_time_ms: i64, slow_threshold_ms: f64) -> Self {
        if !is_correct {
            return Self::Again;
        }
        if response_time_ms as f64 > slow_threshold_ms {
            Self::Hard
        } else {
            Self::Good
        }
    }
}

/// Result of a spelling attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpellingOutcome {
    Failed,
    RetrySuccess,
    Hinted,
    Perfect,
}

/// Canonical outcome consumed by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum StudyOutcome {
    Rating(Rating),
    Spelling(SpellingOutcome),
}

impl StudyOutcome {
    pub fn is_lapse(&self) -> bool {
        matches!(
            self,
            StudyOutcome::Rating(Rating::Again) | StudyOutcome::Spelling(SpellingOutcome::Failed)
        )
    }

    pub fn is_spelling(&self) -> bool {
        matches!(self, StudyOutcome::Spelling(_))
    }

    /// SM-2 quality (0-5)
    pub fn quality(&self) -> u8 {
        match self {
            StudyOutcome::Rating(Rating::Again) => 0,
            StudyOutcome::Rating(Rating::Hard) => 3,
            StudyOutcome::Rating(Rating::Good) => 4,
            StudyOutcome::Spelling(SpellingOutcome::Failed) => 0,
            StudyOutcome::Spelling(SpellingOutcome::RetrySuccess) => 3,
            StudyOutcome::Spelling(SpellingOutcome::Hinted) => 4,
            StudyOutcome::Spelling(SpellingOutcome::Perfect) => 5,
        }
    }

    /// Predictor label: 0 = remembered, 1 = forgotten
    pub fn label(&self) -> f64 {
        if self.is_lapse() {
            1.0
        } else {
            0.0
        }
    }

    pub fn min_ease_factor(&self) -> f64 {
        if self.is_spelling() {
            MIN_EASE_FACTOR_SPELLING
        } else {
            MIN_EASE_FACTOR_RATING
        }
    }
}

impl From<Rating> for StudyOutcome {
    fn from(rating: Rating) -> Self {
        StudyOutcome::Rating(rating)
    }
}

impl From<SpellingOutcome> for StudyOutcome {
    fn from(outcome: SpellingOutcome) -> Self {
        StudyOutcome::Spelling(outcome)
    }
}

// ==================== Training Types ====================

/// Append-only record of one observed outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSample {
    pub features: Vec<f64>,
    /// 0 = remembered, 1 = forgotten
    pub label: f64,
    pub timestamp: i64,
    pub prediction_error: f64,
}

/// Diagnostic result for model health
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResult {
    pub is_healthy: bool,
    pub has_nan: bool,
    pub has_inf: bool,
    pub max_abs_weight: f64,
    pub max_accumulator: f64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_mapping() {
        assert_eq!(StudyOutcome::from(Rating::Hard).quality(), 3);
        assert_eq!(StudyOutcome::from(Rating::Good).quality(), 4);
        assert_eq!(StudyOutcome::from(SpellingOutcome::Perfect).quality(), 5);
        assert!(StudyOutcome::from(SpellingOutcome::Failed).is_lapse());
        assert!(!StudyOutcome::from(SpellingOutcome::Hinted).is_lapse());
    }

    #[test]
    fn test_rating_from_answer() {
        assert_eq!(Rating::from_answer(false, 1000, 6000.0), Rating::Again);
        assert_eq!(Rating::from_answer(true, 7000, 6000.0), Rating::Hard);
        assert_eq!(Rating::from_answer(true, 2000, 6000.0), Rating::Good);
    }

    #[test]
    fn test_sanitized_clamps_counters() {
        let progress = Progress {
            repetitions: -3,
            interval_days: -1,
            ease_factor: f64::NAN,
            review_count: -7,
            ..Default::default()
        };
        let clean = progress.sanitized();
        assert_eq!(clean.repetitions, 0);
        assert_eq!(clean.interval_days, 0);
        assert_eq!(clean.review_count, 0);
        assert_eq!(clean.ease_factor, DEFAULT_EASE_FACTOR);
    }

    #[test]
    fn test_status_round_trip_str() {
        for status in [ProgressStatus::New, ProgressStatus::Learning, ProgressStatus::Mastered] {
            assert_eq!(ProgressStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ProgressStatus::from_str("unknown"), None);
    }
}
