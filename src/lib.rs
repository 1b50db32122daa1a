//! # danci-srs - Adaptive spaced-repetition scheduling core
//!
//! Pure Rust scheduling and retention-modeling library for vocabulary learning:
//!
//! - **SM-2 Scheduler** - deterministic interval / ease / mastery state machine
//! - **Retention Predictor** - FTRL-Proximal online logistic regression over
//!   per-item features
//! - **Ease / Interval adjusters** - bounded corrections of the SM-2 base from
//!   the predicted forget probability
//! - **Spelling Evaluator** - exact-match and edit-distance-tolerant grading
//! - **Response-time threshold** - per-user "slow answer" cutoff
//!
//! ## Modules
//!
//! - [`scheduler`] - SM-2 variant, learning-day due dates, mastery rule
//! - [`predictor`] - retention model, shared single-writer handle, training log
//! - [`features`] - feature vector layout and builder
//! - [`ease`] / [`interval`] - ML refinements of the base schedule
//! - [`threshold`] - adaptive response-time threshold and rolling stats
//! - [`spelling`] - spelling outcome evaluator, bounded edit distance
//! - [`retry`] - in-session retry placement
//! - [`engine`] - per-profile orchestrator wiring everything together
//! - [`calendar`], [`sanitize`], [`config`], [`error`], [`types`]
//!
//! The crate only emits `tracing` events; installing a subscriber is left to
//! the host.
//!
//! ## Example
//!
//! ```rust
//! use danci_srs::{EngineConfig, ItemStats, Rating, ReviewRequest, SchedulingEngine, StudyAction};
//!
//! let engine = SchedulingEngine::new(EngineConfig::default()).unwrap();
//! let outcome = engine.review(ReviewRequest {
//!     previous: None,
//!     action: StudyAction::Rating { rating: Rating::Good },
//!     stats: ItemStats::default(),
//!     now_ms: 1_700_000_000_000,
//! });
//! assert_eq!(outcome.progress.interval_days, 1);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod calendar;
pub mod config;
pub mod ease;
pub mod engine;
pub mod error;
pub mod features;
pub mod interval;
pub mod predictor;
pub mod retry;
pub mod sanitize;
pub mod scheduler;
pub mod spelling;
pub mod threshold;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use calendar::LearningCalendar;
pub use config::{EngineConfig, FeatureConfig, MlConfig, SchedulerConfig};
pub use ease::AdaptiveEaseCalculator;
pub use engine::{ReviewOutcome, ReviewRequest, SchedulingEngine, StudyAction};
pub use error::{SrsError, SrsResult};
pub use features::{FeatureBuilder, ItemStats};
pub use interval::{IntervalAdjustment, IntervalOptimizer};
pub use predictor::{ModelState, RetentionPredictor, SharedPredictor, TrainingLog};
pub use retry::RetryQueuePlanner;
pub use scheduler::{MlAdjustment, MlInputs, SchedulePreview, ScheduleResult, Scheduler};
pub use spelling::{bounded_edit_distance, evaluate, SpellingEvaluation, SpellingMode};
pub use threshold::{compute_threshold, ResponseTimeStats};
