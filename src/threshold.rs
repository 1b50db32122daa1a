//! Adaptive Response-Time Threshold
//!
//! Per-user "slow answer" cutoff: `mean + 1.5 × std`, clamped to
//! [3000, 15000] ms. Falls back to a fixed 6000 ms when the ML layer is off or
//! there is no history yet.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD_MS: f64 = 6000.0;
pub const MIN_THRESHOLD_MS: f64 = 3000.0;
pub const MAX_THRESHOLD_MS: f64 = 15000.0;
const STD_MULTIPLIER: f64 = 1.5;

pub fn compute_threshold(avg_response_time: f64, std_response_time: f64, ml_enabled: bool) -> f64 {
    if !ml_enabled || avg_response_time == 0.0 || avg_response_time.is_nan() {
        return DEFAULT_THRESHOLD_MS;
    }
    let std = if std_response_time.is_finite() {
        std_response_time.max(0.0)
    } else {
        0.0
    };
    (avg_response_time + STD_MULTIPLIER * std).clamp(MIN_THRESHOLD_MS, MAX_THRESHOLD_MS)
}

/// Correct but slower than the cutoff
pub fn is_hesitant(is_correct: bool, response_time_ms: i64, threshold_ms: f64) -> bool {
    is_correct && response_time_ms as f64 > threshold_ms
}

/// Rolling window of response times
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTimeStats {
    window: VecDeque<f64>,
    capacity: usize,
}

impl Default for ResponseTimeStats {
    fn default() -> Self {
        Self::new(50)
    }
}

impl ResponseTimeStats {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Non-positive samples are ignored
    pub fn record(&mut self, response_time_ms: i64) {
        if response_time_ms <= 0 {
            return;
        }
        self.window.push_back(response_time_ms as f64);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> f64 {
        if self.window.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.window.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / self.window.len() as f64;
        var.sqrt()
    }

    pub fn threshold(&self, ml_enabled: bool) -> f64 {
        compute_threshold(self.mean(), self.std_dev(), ml_enabled)
    }
}
