//! Deterministic Scheduler (SM-2 variant)
//!
//! State machine driven by a rating or spelling outcome:
//! - Lapse (AGAIN / FAILED): EF - 0.2, repetitions and interval reset, re-shown
//!   within minutes
//! - Learning phase (no interval yet): HARD / RETRY_SUCCESS repeat in-session,
//!   GOOD / HINTED / PERFECT graduate to 1 day
//! - Established phase: EF' = EF - 0.8 + 0.28q - 0.02q², then
//!   - conservative: min(I × 1.2, I × EF)
//!   - standard: min(I × EF, I × 2.5)
//!   - perfect: standard × 1.1
//!
//! Status is re-derived from the mastery rule on every committed schedule and
//! nowhere else. When model inputs are supplied, the SM-2 numbers become the base
//! for the ease calculator and interval optimizer.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::LearningCalendar;
use crate::config::SchedulerConfig;
use crate::ease::AdaptiveEaseCalculator;
use crate::interval::{round_half_up, IntervalOptimizer};
use crate::sanitize::unit_interval;
use crate::types::{
    Progress, ProgressStatus, Rating, SpellingOutcome, StudyOutcome, EPSILON, LAPSE_EASE_PENALTY,
    MAX_EASE_FACTOR,
};

/// Conservative growth multiplier
const HARD_GROWTH: f64 = 1.2;

/// Cap on standard growth regardless of EF
const MAX_GROWTH: f64 = 2.5;

/// Extra multiplier for a perfect spelling answer
const PERFECT_BONUS: f64 = 1.1;

// ==================== Data Structures ====================

/// Model outputs consulted for one schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlInputs {
    /// Forget probability before this review
    pub forget_probability: f64,
    /// Forget probability for the state being committed
    pub next_forget_probability: f64,
    pub confidence: f64,
}

/// What the ML layer changed, for observability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlAdjustment {
    pub forget_probability: f64,
    pub next_forget_probability: f64,
    pub confidence: f64,
    pub base_interval_days: i32,
    pub base_ease_factor: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResult {
    pub progress: Progress,
    pub ml: Option<MlAdjustment>,
}

/// Intervals each rating would commit, without touching state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePreview {
    pub again: i32,
    pub hard: i32,
    pub good: i32,
}

#[derive(Debug, Clone, Copy)]
struct Sm2Step {
    repetitions: i32,
    interval_days: i32,
    ease_factor: f64,
}

// ==================== Scheduler ====================

#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    calendar: LearningCalendar,
    ease: AdaptiveEaseCalculator,
    optimizer: IntervalOptimizer,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let calendar = LearningCalendar::from_config(&config);
        Self {
            config,
            calendar,
            ease: AdaptiveEaseCalculator::default(),
            optimizer: IntervalOptimizer::new(),
        }
    }

    pub fn calendar(&self) -> &LearningCalendar {
        &self.calendar
    }

    pub fn ease_calculator(&self) -> &AdaptiveEaseCalculator {
        &self.ease
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Plain SM-2 schedule, ML layer off
    pub fn schedule(
        &self,
        previous: Option<&Progress>,
        outcome: StudyOutcome,
        now_ms: i64,
    ) -> ScheduleResult {
        self.schedule_with_ml(previous, outcome, now_ms, None)
    }

    pub fn schedule_with_ml(
        &self,
        previous: Option<&Progress>,
        outcome: StudyOutcome,
        now_ms: i64,
        ml: Option<&MlInputs>,
    ) -> ScheduleResult {
        let mut prev = previous.map(Progress::sanitized).unwrap_or_default();

        let ml = ml.map(|inputs| MlInputs {
            forget_probability: unit_interval(inputs.forget_probability, 0.5),
            next_forget_probability: unit_interval(inputs.next_forget_probability, 0.5),
            confidence: unit_interval(inputs.confidence, 0.0),
        });

        if let Some(inputs) = ml.as_ref().filter(|i| i.confidence > 0.0) {
            if prev.status == ProgressStatus::New && prev.review_count == 0 {
                prev.ease_factor = quantize_ease(
                    self.ease
                        .predict_initial_ef(inputs.forget_probability, inputs.confidence),
                );
            }
        }

        let base = self.sm2_step(&prev, outcome);
        let mut interval_days = base.interval_days;
        let mut ease_factor = base.ease_factor;

        let adjustment = ml.map(|inputs| {
            if inputs.confidence > 0.0 {
                ease_factor = quantize_ease(self.ease.adjust_ef(
                    base.ease_factor,
                    inputs.forget_probability,
                    outcome.label(),
                    inputs.confidence,
                ));
                interval_days = self
                    .optimizer
                    .optimize(
                        base.interval_days,
                        inputs.next_forget_probability,
                        inputs.confidence,
                    )
                    .min(self.config.max_interval_days);
            }
            let reason = self
                .optimizer
                .compute_adjustment(
                    base.interval_days,
                    base.ease_factor,
                    inputs.next_forget_probability,
                    inputs.confidence,
                )
                .reason;
            MlAdjustment {
                forget_probability: inputs.forget_probability,
                next_forget_probability: inputs.next_forget_probability,
                confidence: inputs.confidence,
                base_interval_days: base.interval_days,
                base_ease_factor: base.ease_factor,
                reason,
            }
        });

        let progress = self.commit(
            &prev,
            outcome,
            base.repetitions,
            interval_days,
            ease_factor,
            now_ms,
        );

        debug!(
            outcome = ?outcome,
            interval_days = progress.interval_days,
            ease_factor = progress.ease_factor,
            repetitions = progress.repetitions,
            status = progress.status.as_str(),
            ml_applied = adjustment.is_some(),
            "schedule committed"
        );

        ScheduleResult {
            progress,
            ml: adjustment,
        }
    }

    fn sm2_step(&self, prev: &Progress, outcome: StudyOutcome) -> Sm2Step {
        let floor = outcome.min_ease_factor();
        let ease = prev.ease_factor.clamp(floor, MAX_EASE_FACTOR);

        if outcome.is_lapse() {
            return Sm2Step {
                repetitions: 0,
                interval_days: 0,
                ease_factor: quantize_ease((ease - LAPSE_EASE_PENALTY).max(floor)),
            };
        }

        if prev.is_learning_phase() {
            let (repetitions, interval_days) = match outcome {
                StudyOutcome::Rating(Rating::Hard)
                | StudyOutcome::Spelling(SpellingOutcome::RetrySuccess) => (prev.repetitions, 0),
                _ => (prev.repetitions.saturating_add(1), 1),
            };
            return Sm2Step {
                repetitions,
                interval_days,
                ease_factor: quantize_ease(ease),
            };
        }

        let q = outcome.quality() as f64;
        let ease =
            quantize_ease((ease - 0.8 + 0.28 * q - 0.02 * q * q).clamp(floor, MAX_EASE_FACTOR));
        let old = prev.interval_days as f64;

        let raw = match outcome {
            StudyOutcome::Rating(Rating::Hard)
            | StudyOutcome::Spelling(SpellingOutcome::RetrySuccess) => {
                (old * HARD_GROWTH).min(old * ease)
            }
            StudyOutcome::Rating(Rating::Good)
            | StudyOutcome::Spelling(SpellingOutcome::Hinted) => (old * ease).min(old * MAX_GROWTH),
            StudyOutcome::Spelling(SpellingOutcome::Perfect) => {
                (old * ease).min(old * MAX_GROWTH) * PERFECT_BONUS
            }
            StudyOutcome::Rating(Rating::Again)
            | StudyOutcome::Spelling(SpellingOutcome::Failed) => 0.0,
        };

        let max_days = self.config.max_interval_days.max(1) as i64;
        let interval_days = round_half_up(raw).clamp(1, max_days) as i32;

        Sm2Step {
            repetitions: prev.repetitions.saturating_add(1),
            interval_days,
            ease_factor: ease,
        }
    }

    fn commit(
        &self,
        prev: &Progress,
        outcome: StudyOutcome,
        repetitions: i32,
        interval_days: i32,
        ease_factor: f64,
        now_ms: i64,
    ) -> Progress {
        let lapse = outcome.is_lapse();
        let review_count = prev.review_count.saturating_add(1);

        let next_review_time = if interval_days > 0 {
            self.calendar.due_after_days(now_ms, interval_days)
        } else if lapse {
            self.calendar
                .due_after_minutes(now_ms, self.config.lapse_delay_minutes)
        } else {
            self.calendar
                .due_after_minutes(now_ms, self.config.learning_delay_minutes)
        };

        let (spelling_attempt_count, spelling_correct_count) = if outcome.is_spelling() {
            (
                prev.spelling_attempt_count.saturating_add(1),
                prev.spelling_correct_count.saturating_add(i32::from(!lapse)),
            )
        } else {
            (prev.spelling_attempt_count, prev.spelling_correct_count)
        };

        Progress {
            status: self.derive_status(interval_days, review_count, ease_factor),
            repetitions,
            interval_days,
            ease_factor,
            next_review_time,
            review_count,
            lapse_count: prev.lapse_count.saturating_add(i32::from(lapse)),
            consecutive_correct: if lapse {
                0
            } else {
                prev.consecutive_correct.saturating_add(1)
            },
            spelling_correct_count,
            spelling_attempt_count,
            last_review_time: Some(now_ms),
        }
    }

    /// Mastery rule, boundaries inclusive
    pub fn is_mastered(&self, interval_days: i32, review_count: i32, ease_factor: f64) -> bool {
        interval_days >= self.config.mastery_interval_days
            && review_count >= self.config.mastery_review_count
            && ease_factor + EPSILON >= self.config.mastery_ease_factor
    }

    pub fn derive_status(
        &self,
        interval_days: i32,
        review_count: i32,
        ease_factor: f64,
    ) -> ProgressStatus {
        if self.is_mastered(interval_days, review_count, ease_factor) {
            ProgressStatus::Mastered
        } else {
            ProgressStatus::Learning
        }
    }

    pub fn preview(&self, progress: &Progress, now_ms: i64) -> SchedulePreview {
        let interval = |rating: Rating| {
            self.schedule(Some(progress), rating.into(), now_ms)
                .progress
                .interval_days
        };
        SchedulePreview {
            again: interval(Rating::Again),
            hard: interval(Rating::Hard),
            good: interval(Rating::Good),
        }
    }
}

/// EF kept at 3 decimals so threshold comparisons stay stable
fn quantize_ease(ease: f64) -> f64 {
    (ease * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_EASE_FACTOR;

    const NOW: i64 = 1_700_000_000_000;
    const MINUTE_MS: i64 = 60_000;

    fn established(interval_days: i32, ease_factor: f64) -> Progress {
        Progress {
            status: ProgressStatus::Learning,
            repetitions: 2,
            interval_days,
            ease_factor,
            review_count: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_item_good_graduates() {
        let scheduler = Scheduler::default();
        let result = scheduler.schedule(None, Rating::Good.into(), NOW);
        let p = result.progress;
        assert_eq!(p.interval_days, 1);
        assert_eq!(p.repetitions, 1);
        assert_eq!(p.review_count, 1);
        assert_eq!(p.ease_factor, DEFAULT_EASE_FACTOR);
        assert_eq!(p.status, ProgressStatus::Learning);
        assert!(result.ml.is_none());
    }

    #[test]
    fn test_learning_hard_stays_in_session() {
        let scheduler = Scheduler::default();
        let p = scheduler.schedule(None, Rating::Hard.into(), NOW).progress;
        assert_eq!(p.interval_days, 0);
        assert_eq!(p.repetitions, 0);
        assert_eq!(p.next_review_time, NOW + 10 * MINUTE_MS);

        let s = scheduler
            .schedule(None, SpellingOutcome::RetrySuccess.into(), NOW)
            .progress;
        assert_eq!(s.interval_days, 0);
        assert_eq!(s.spelling_attempt_count, 1);
        assert_eq!(s.spelling_correct_count, 1);
    }

    #[test]
    fn test_lapse_resets() {
        let scheduler = Scheduler::default();
        let prev = Progress {
            status: ProgressStatus::Mastered,
            repetitions: 6,
            interval_days: 40,
            ease_factor: 2.6,
            review_count: 9,
            ..Default::default()
        };
        let p = scheduler.schedule(Some(&prev), Rating::Again.into(), NOW).progress;
        assert_eq!(p.repetitions, 0);
        assert_eq!(p.interval_days, 0);
        assert_eq!(p.status, ProgressStatus::Learning);
        assert_eq!(p.ease_factor, 2.4);
        assert_eq!(p.lapse_count, 1);
        assert_eq!(p.consecutive_correct, 0);
        assert_eq!(p.review_count, 10);
        assert_eq!(p.next_review_time, NOW + MINUTE_MS);
    }

    #[test]
    fn test_lapse_ease_floors() {
        let scheduler = Scheduler::default();
        let rating = scheduler
            .schedule(Some(&established(5, 1.35)), Rating::Again.into(), NOW)
            .progress;
        assert_eq!(rating.ease_factor, 1.3);

        let spelling = scheduler
            .schedule(Some(&established(5, 1.2)), SpellingOutcome::Failed.into(), NOW)
            .progress;
        assert_eq!(spelling.ease_factor, 1.1);
    }

    #[test]
    fn test_established_growth() {
        let scheduler = Scheduler::default();
        let good = |interval, ease| {
            scheduler
                .schedule(Some(&established(interval, ease)), Rating::Good.into(), NOW)
                .progress
                .interval_days
        };
        assert_eq!(good(1, 2.5), 3);
        assert_eq!(good(3, 2.5), 8);
        assert_eq!(good(4, 3.0), 10);
    }

    #[test]
    fn test_perfect_bonus() {
        let scheduler = Scheduler::default();
        let p = scheduler
            .schedule(Some(&established(10, 2.5)), SpellingOutcome::Perfect.into(), NOW)
            .progress;
        assert_eq!(p.ease_factor, 2.6);
        assert_eq!(p.interval_days, 28);
    }

    #[test]
    fn test_mastery_boundary() {
        let scheduler = Scheduler::default();
        assert!(scheduler.is_mastered(21, 2, 2.3));
        assert!(!scheduler.is_mastered(20, 2, 2.3));
        assert!(!scheduler.is_mastered(21, 1, 2.3));
        assert!(!scheduler.is_mastered(21, 2, 2.29));
    }

    #[test]
    fn test_mastery_transition_on_good() {
        let scheduler = Scheduler::default();
        let prev = Progress {
            status: ProgressStatus::Learning,
            repetitions: 1,
            interval_days: 9,
            ease_factor: 2.3,
            review_count: 1,
            ..Default::default()
        };
        let p = scheduler.schedule(Some(&prev), Rating::Good.into(), NOW).progress;
        assert_eq!(p.interval_days, 21);
        assert_eq!(p.review_count, 2);
        assert_eq!(p.ease_factor, 2.3);
        assert_eq!(p.status, ProgressStatus::Mastered);
    }

    #[test]
    fn test_due_time_on_day_boundary() {
        let scheduler = Scheduler::default();
        let p = scheduler
            .schedule(Some(&established(3, 2.5)), Rating::Good.into(), NOW)
            .progress;
        let cal = scheduler.calendar();
        let expected_day = cal.learning_day(NOW) + chrono::Days::new(8);
        assert_eq!(p.next_review_time, cal.day_start_ms(expected_day));
    }

    #[test]
    fn test_malformed_progress_is_clamped() {
        let scheduler = Scheduler::default();
        let prev = Progress {
            repetitions: -5,
            interval_days: -2,
            ease_factor: f64::NAN,
            review_count: -1,
            ..Default::default()
        };
        let p = scheduler.schedule(Some(&prev), Rating::Good.into(), NOW).progress;
        assert_eq!(p.interval_days, 1);
        assert_eq!(p.repetitions, 1);
        assert_eq!(p.review_count, 1);
        assert_eq!(p.ease_factor, DEFAULT_EASE_FACTOR);
    }

    #[test]
    fn test_saturated_counters_do_not_overflow() {
        let scheduler = Scheduler::default();
        let saturated = Progress {
            repetitions: i32::MAX,
            review_count: i32::MAX,
            lapse_count: i32::MAX,
            consecutive_correct: i32::MAX,
            spelling_correct_count: i32::MAX,
            spelling_attempt_count: i32::MAX,
            ..established(10, 2.5)
        };

        let good = scheduler
            .schedule(Some(&saturated), Rating::Good.into(), NOW)
            .progress;
        assert_eq!(good.repetitions, i32::MAX);
        assert_eq!(good.review_count, i32::MAX);
        assert_eq!(good.consecutive_correct, i32::MAX);

        let again = scheduler
            .schedule(Some(&saturated), Rating::Again.into(), NOW)
            .progress;
        assert_eq!(again.lapse_count, i32::MAX);
        assert_eq!(again.repetitions, 0);

        let perfect = scheduler
            .schedule(Some(&saturated), SpellingOutcome::Perfect.into(), NOW)
            .progress;
        assert_eq!(perfect.spelling_correct_count, i32::MAX);
        assert_eq!(perfect.spelling_attempt_count, i32::MAX);

        let learning = Progress {
            interval_days: 0,
            ..saturated
        };
        let graduated = scheduler
            .schedule(Some(&learning), Rating::Good.into(), NOW)
            .progress;
        assert_eq!(graduated.repetitions, i32::MAX);
        assert_eq!(graduated.interval_days, 1);
    }

    #[test]
    fn test_max_interval_cap() {
        let config = SchedulerConfig {
            max_interval_days: 30,
            ..Default::default()
        };
        let scheduler = Scheduler::new(config);
        let p = scheduler
            .schedule(Some(&established(20, 2.5)), Rating::Good.into(), NOW)
            .progress;
        assert_eq!(p.interval_days, 30);
    }

    #[test]
    fn test_zero_confidence_ml_is_noop() {
        let scheduler = Scheduler::default();
        let inputs = MlInputs {
            forget_probability: 0.9,
            next_forget_probability: 0.9,
            confidence: 0.0,
        };
        let plain = scheduler.schedule(Some(&established(10, 2.5)), Rating::Good.into(), NOW);
        let with_ml = scheduler.schedule_with_ml(
            Some(&established(10, 2.5)),
            Rating::Good.into(),
            NOW,
            Some(&inputs),
        );
        assert_eq!(plain.progress, with_ml.progress);
        let ml = with_ml.ml.expect("adjustment reported");
        assert_eq!(ml.base_interval_days, 25);
        assert!(ml.reason.contains("confidence too low"));
    }

    #[test]
    fn test_ml_shortens_risky_interval() {
        let scheduler = Scheduler::default();
        let inputs = MlInputs {
            forget_probability: 0.2,
            next_forget_probability: 0.9,
            confidence: 0.8,
        };
        let result = scheduler.schedule_with_ml(
            Some(&established(10, 2.5)),
            Rating::Good.into(),
            NOW,
            Some(&inputs),
        );
        let ml = result.ml.expect("adjustment reported");
        assert_eq!(ml.base_interval_days, 25);
        assert!(result.progress.interval_days < 25);
        assert!(result.progress.interval_days >= 13);
        // predicted low risk and remembered: small EF gain
        assert!(result.progress.ease_factor > ml.base_ease_factor);
    }

    #[test]
    fn test_ml_initial_ef_for_new_item() {
        let scheduler = Scheduler::default();
        let inputs = MlInputs {
            forget_probability: 0.9,
            next_forget_probability: 0.9,
            confidence: 0.8,
        };
        let result = scheduler.schedule_with_ml(None, Rating::Good.into(), NOW, Some(&inputs));
        let ml = result.ml.expect("adjustment reported");
        assert!(ml.base_ease_factor < DEFAULT_EASE_FACTOR);
        assert_eq!(result.progress.interval_days, 1);
    }

    #[test]
    fn test_preview() {
        let scheduler = Scheduler::default();
        let preview = scheduler.preview(&established(10, 2.5), NOW);
        assert_eq!(
            preview,
            SchedulePreview {
                again: 0,
                hard: 12,
                good: 25
            }
        );
    }
}
