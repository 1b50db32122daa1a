//! Feature Vector Builder
//!
//! Normalizes raw per-item statistics into the fixed-length vector consumed by
//! the retention predictor. The slot order below is shared with
//! [`crate::predictor`]; changing it invalidates every persisted model state.
//!
//! | slot | feature                                              |
//! |------|------------------------------------------------------|
//! | 0    | bias (always 1.0)                                    |
//! | 1    | response-time z-score against the user baseline, /3 |
//! | 2    | log-scaled response time                             |
//! | 3    | recent accuracy                                      |
//! | 4    | log-scaled interval                                  |
//! | 5    | repetitions, saturating at 10                        |
//! | 6    | log-scaled lifetime review count                     |
//! | 7    | ease factor mapped to [0, 1]                         |
//! | 8    | lapse rate                                           |
//! | 9    | overdue ratio (elapsed / interval), saturating at 3  |
//! | 10   | hint used                                            |
//! | 11   | extra attempts, saturating at 3                      |

use serde::{Deserialize, Serialize};

use crate::calendar::LearningCalendar;
use crate::config::{FeatureConfig, NormalizationStat};
use crate::sanitize::{sanitize_feature_vector, unit_interval};
use crate::types::{
    FeatureVector, Progress, FEATURE_DIMENSION, MAX_EASE_FACTOR, MIN_EASE_FACTOR_SPELLING,
};

pub mod idx {
    pub const BIAS: usize = 0;
    pub const RT_ZSCORE: usize = 1;
    pub const RT_LOG: usize = 2;
    pub const ACCURACY: usize = 3;
    pub const INTERVAL_LOG: usize = 4;
    pub const REPETITIONS: usize = 5;
    pub const REVIEW_COUNT_LOG: usize = 6;
    pub const EASE: usize = 7;
    pub const LAPSE_RATE: usize = 8;
    pub const OVERDUE: usize = 9;
    pub const HINT: usize = 10;
    pub const EXTRA_ATTEMPTS: usize = 11;
}

const MAX_Z_SCORE: f64 = 3.0;
const INTERVAL_LOG_SCALE_DAYS: f64 = 365.0;
const REVIEW_LOG_SCALE: f64 = 100.0;
const MAX_REPETITIONS: f64 = 10.0;
const MAX_OVERDUE_RATIO: f64 = 3.0;
const MAX_EXTRA_ATTEMPTS: f64 = 3.0;

/// Raw per-answer statistics supplied by the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStats {
    pub response_time_ms: Option<i64>,
    pub recent_accuracy: Option<f64>,
    #[serde(default)]
    pub hint_used: bool,
    #[serde(default)]
    pub attempt_count: i32,
    /// Per-user response-time baseline; falls back to the configured default
    pub user_rt_mean: Option<f64>,
    pub user_rt_std: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: FeatureConfig,
    calendar: LearningCalendar,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::new(FeatureConfig::default(), LearningCalendar::default())
    }
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig, calendar: LearningCalendar) -> Self {
        Self { config, calendar }
    }

    pub fn build(&self, progress: &Progress, stats: &ItemStats, now_ms: i64) -> FeatureVector {
        let progress = progress.sanitized();
        let mut x = [0.0; FEATURE_DIMENSION];

        x[idx::BIAS] = 1.0;

        if let Some(rt) = stats.response_time_ms {
            let rt = rt.clamp(0, self.config.max_response_time) as f64;
            let baseline = self.baseline(stats);
            let z = (rt - baseline.mean) / baseline.std_dev;
            x[idx::RT_ZSCORE] = z.clamp(-MAX_Z_SCORE, MAX_Z_SCORE) / MAX_Z_SCORE;
            x[idx::RT_LOG] = log_scale(rt / 1000.0, self.config.max_response_time as f64 / 1000.0);
        }

        x[idx::ACCURACY] = match stats.recent_accuracy {
            Some(acc) => unit_interval(acc, 0.5),
            None if progress.review_count > 0 => {
                1.0 - progress.lapse_count as f64 / progress.review_count as f64
            }
            None => 0.5,
        }
        .clamp(0.0, 1.0);

        x[idx::INTERVAL_LOG] = log_scale(progress.interval_days as f64, INTERVAL_LOG_SCALE_DAYS);
        x[idx::REPETITIONS] = (progress.repetitions as f64).min(MAX_REPETITIONS) / MAX_REPETITIONS;
        x[idx::REVIEW_COUNT_LOG] = log_scale(progress.review_count as f64, REVIEW_LOG_SCALE);
        x[idx::EASE] = (progress.ease_factor - MIN_EASE_FACTOR_SPELLING)
            / (MAX_EASE_FACTOR - MIN_EASE_FACTOR_SPELLING);
        x[idx::LAPSE_RATE] = if progress.review_count > 0 {
            (progress.lapse_count as f64 / progress.review_count as f64).min(1.0)
        } else {
            0.0
        };

        x[idx::OVERDUE] = match progress.last_review_time {
            Some(last) if progress.interval_days > 0 => {
                let elapsed = self.calendar.days_between(last, now_ms) as f64;
                (elapsed / progress.interval_days as f64).min(MAX_OVERDUE_RATIO) / MAX_OVERDUE_RATIO
            }
            _ => 0.0,
        };

        x[idx::HINT] = if stats.hint_used { 1.0 } else { 0.0 };
        x[idx::EXTRA_ATTEMPTS] =
            ((stats.attempt_count.max(1) - 1) as f64).min(MAX_EXTRA_ATTEMPTS) / MAX_EXTRA_ATTEMPTS;

        sanitize_feature_vector(&mut x);
        x
    }

    fn baseline(&self, stats: &ItemStats) -> NormalizationStat {
        let mean = stats
            .user_rt_mean
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(self.config.rt.mean);
        let std_dev = stats
            .user_rt_std
            .filter(|s| s.is_finite() && *s > 1.0)
            .unwrap_or(self.config.rt.std_dev)
            .max(1.0);
        NormalizationStat { mean, std_dev }
    }
}

/// ln(1 + v) / ln(1 + scale), 0 for non-positive input
fn log_scale(value: f64, scale: f64) -> f64 {
    if value.is_nan() || value <= 0.0 {
        return 0.0;
    }
    value.ln_1p() / scale.max(1.0).ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProgressStatus;

    const NOW: i64 = 1_700_000_000_000;
    const DAY_MS: i64 = 86_400_000;

    fn established() -> Progress {
        Progress {
            status: ProgressStatus::Learning,
            repetitions: 3,
            interval_days: 4,
            ease_factor: 2.5,
            review_count: 5,
            lapse_count: 1,
            last_review_time: Some(NOW - 8 * DAY_MS),
            ..Default::default()
        }
    }

    #[test]
    fn test_layout_and_bias() {
        let builder = FeatureBuilder::default();
        let x = builder.build(&Progress::new_item(), &ItemStats::default(), NOW);
        assert_eq!(x.len(), FEATURE_DIMENSION);
        assert_eq!(x[idx::BIAS], 1.0);
        assert_eq!(x[idx::ACCURACY], 0.5);
        assert_eq!(x[idx::INTERVAL_LOG], 0.0);
        assert_eq!(x[idx::OVERDUE], 0.0);
    }

    #[test]
    fn test_slow_answer_has_positive_zscore() {
        let builder = FeatureBuilder::default();
        let stats = ItemStats {
            response_time_ms: Some(9000),
            user_rt_mean: Some(3000.0),
            user_rt_std: Some(1000.0),
            ..Default::default()
        };
        let x = builder.build(&established(), &stats, NOW);
        assert_eq!(x[idx::RT_ZSCORE], 1.0);

        let fast = ItemStats {
            response_time_ms: Some(2000),
            ..stats
        };
        let y = builder.build(&established(), &fast, NOW);
        assert!(y[idx::RT_ZSCORE] < 0.0);
        assert!(y[idx::RT_LOG] < x[idx::RT_LOG]);
    }

    #[test]
    fn test_overdue_and_lapse_rate() {
        let builder = FeatureBuilder::default();
        let x = builder.build(&established(), &ItemStats::default(), NOW);
        // 8 elapsed days on a 4-day interval
        assert!((x[idx::OVERDUE] - 2.0 / 3.0).abs() < 1e-9);
        assert!((x[idx::LAPSE_RATE] - 0.2).abs() < 1e-9);
        assert!((x[idx::ACCURACY] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_attempts_and_hint() {
        let builder = FeatureBuilder::default();
        let stats = ItemStats {
            hint_used: true,
            attempt_count: 10,
            ..Default::default()
        };
        let x = builder.build(&established(), &stats, NOW);
        assert_eq!(x[idx::HINT], 1.0);
        assert_eq!(x[idx::EXTRA_ATTEMPTS], 1.0);

        let negative = ItemStats {
            attempt_count: -4,
            ..Default::default()
        };
        let y = builder.build(&established(), &negative, NOW);
        assert_eq!(y[idx::EXTRA_ATTEMPTS], 0.0);
    }

    #[test]
    fn test_malformed_input_stays_finite() {
        let builder = FeatureBuilder::default();
        let progress = Progress {
            ease_factor: f64::NAN,
            review_count: -3,
            ..established()
        };
        let stats = ItemStats {
            response_time_ms: Some(-500),
            recent_accuracy: Some(f64::INFINITY),
            user_rt_std: Some(0.0),
            ..Default::default()
        };
        let x = builder.build(&progress, &stats, NOW);
        assert!(x.iter().all(|v| v.is_finite()));
    }
}
