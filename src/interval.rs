//! Interval Optimizer
//!
//! Rescales a base interval by `1 + confidence × (0.5 - p)`, then clamps to
//! `[ceil(base/2), floor(base×3/2)]` and at least one day. A base of 0 marks an
//! item still inside the learning phase and passes through untouched.

use serde::{Deserialize, Serialize};

use crate::sanitize::{clamp_finite, unit_interval};
use crate::types::{MAX_EASE_FACTOR, MIN_EASE_FACTOR_RATING};

/// EF nudge per unit of `(0.5 - p)` at full confidence
const EASE_NUDGE: f64 = 0.3;

/// Below this confidence the justification reports the model as ignored
const NEGLIGIBLE_CONFIDENCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalAdjustment {
    pub adjusted_interval_days: i32,
    pub adjusted_ease_factor: f64,
    pub forget_probability: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct IntervalOptimizer;

impl IntervalOptimizer {
    pub fn new() -> Self {
        Self
    }

    pub fn optimize(&self, base_interval_days: i32, forget_prob: f64, confidence: f64) -> i32 {
        if base_interval_days <= 0 {
            return 0;
        }
        let confidence = unit_interval(confidence, 0.0);
        if confidence == 0.0 {
            return base_interval_days;
        }
        let p = unit_interval(forget_prob, 0.5);
        let factor = 1.0 + confidence * (0.5 - p);
        let scaled = round_half_up(base_interval_days as f64 * factor);

        let lower = (base_interval_days as i64 + 1) / 2;
        let upper = base_interval_days as i64 * 3 / 2;
        scaled.clamp(lower, upper).max(1) as i32
    }

    pub fn optimize_ease(&self, base_ease_factor: f64, forget_prob: f64, confidence: f64) -> f64 {
        let base = clamp_finite(
            base_ease_factor,
            MIN_EASE_FACTOR_RATING,
            MAX_EASE_FACTOR,
            2.5,
        );
        let confidence = unit_interval(confidence, 0.0);
        let p = unit_interval(forget_prob, 0.5);
        (base + confidence * (0.5 - p) * EASE_NUDGE).clamp(MIN_EASE_FACTOR_RATING, MAX_EASE_FACTOR)
    }

    pub fn compute_adjustment(
        &self,
        base_interval_days: i32,
        base_ease_factor: f64,
        forget_prob: f64,
        confidence: f64,
    ) -> IntervalAdjustment {
        let adjusted_interval_days = self.optimize(base_interval_days, forget_prob, confidence);
        let adjusted_ease_factor = self.optimize_ease(base_ease_factor, forget_prob, confidence);
        let forget_probability = unit_interval(forget_prob, 0.5);
        let confidence = unit_interval(confidence, 0.0);

        let reason = if base_interval_days <= 0 {
            "learning phase: interval not yet scheduled".to_string()
        } else if confidence < NEGLIGIBLE_CONFIDENCE {
            "model confidence too low: base schedule kept".to_string()
        } else if adjusted_interval_days < base_interval_days {
            format!(
                "high forget risk ({forget_probability:.2}): interval shortened {base_interval_days}d -> {adjusted_interval_days}d"
            )
        } else if adjusted_interval_days > base_interval_days {
            format!(
                "low forget risk ({forget_probability:.2}): interval extended {base_interval_days}d -> {adjusted_interval_days}d"
            )
        } else {
            format!("forget risk {forget_probability:.2}: interval unchanged at {base_interval_days}d")
        };

        IntervalAdjustment {
            adjusted_interval_days,
            adjusted_ease_factor,
            forget_probability,
            reason,
        }
    }
}

/// Round half up for non-negative values, tolerant of float noise at .5
pub fn round_half_up(value: f64) -> i64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    (value + 0.5 + 1e-9).floor() as i64
}
