//! Adaptive Ease-Factor Calculator
//!
//! Turns the predictor's forget probability into a difficulty factor:
//! - initial EF for a fresh item: 2.5 shifted by `confidence × (0.5 - p) × spread`
//! - adjustment after a review: moves EF against the prediction surprise
//!   `(label - p)`, scaled by confidence
//!
//! Output is always inside [1.3, 3.0]; zero confidence means "ignore the model".

use crate::sanitize::{clamp_finite, unit_interval};
use crate::types::{DEFAULT_EASE_FACTOR, MAX_EASE_FACTOR, MIN_EASE_FACTOR_RATING};

#[derive(Debug, Clone)]
pub struct AdaptiveEaseCalculator {
    /// EF distance between p = 0 and p = 1 at full confidence
    spread: f64,
    /// EF change per unit of surprise at full confidence
    adjust_rate: f64,
}

impl Default for AdaptiveEaseCalculator {
    fn default() -> Self {
        Self::new(2.0, 0.3)
    }
}

impl AdaptiveEaseCalculator {
    pub fn new(spread: f64, adjust_rate: f64) -> Self {
        Self {
            spread: clamp_finite(spread, 0.0, 10.0, 2.0),
            adjust_rate: clamp_finite(adjust_rate, 0.0, 2.0, 0.3),
        }
    }

    pub fn predict_initial_ef(&self, forget_prob: f64, confidence: f64) -> f64 {
        let confidence = unit_interval(confidence, 0.0);
        if confidence == 0.0 {
            return DEFAULT_EASE_FACTOR;
        }
        let p = unit_interval(forget_prob, 0.5);
        let ef = DEFAULT_EASE_FACTOR + confidence * (0.5 - p) * self.spread;
        ef.clamp(MIN_EASE_FACTOR_RATING, MAX_EASE_FACTOR)
    }

    /// `actual_outcome`: 0 = remembered, 1 = forgotten
    pub fn adjust_ef(
        &self,
        current_ef: f64,
        forget_prob: f64,
        actual_outcome: f64,
        confidence: f64,
    ) -> f64 {
        let current = clamp_finite(
            current_ef,
            MIN_EASE_FACTOR_RATING,
            MAX_EASE_FACTOR,
            DEFAULT_EASE_FACTOR,
        );
        let p = unit_interval(forget_prob, 0.5);
        let y = unit_interval(actual_outcome, 0.0);
        let confidence = unit_interval(confidence, 0.0);

        let surprise = y - p;
        let ef = current - surprise * confidence * self.adjust_rate;
        ef.clamp(MIN_EASE_FACTOR_RATING, MAX_EASE_FACTOR)
    }
}
