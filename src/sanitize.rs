//! Data Sanitization
//!
//! Numerical stability utilities.
//!
//! Functions:
//! - Feature vector sanitization
//! - Probability / confidence saturation
//! - Model health diagnostics

use crate::types::{DiagnosticResult, MAX_FEATURE_ABS};

/// Largest weight magnitude still considered healthy
const HEALTHY_WEIGHT_ABS: f64 = 50.0;

/// True if any value is NaN or infinite
pub fn has_invalid_values(arr: &[f64]) -> bool {
    arr.iter().any(|&x| x.is_nan() || x.is_infinite())
}

/// Zeroes non-finite entries and clamps the rest to ±MAX_FEATURE_ABS
pub fn sanitize_feature_vector(x: &mut [f64]) {
    for val in x.iter_mut() {
        if val.is_nan() || val.is_infinite() {
            *val = 0.0;
        } else if *val > MAX_FEATURE_ABS {
            *val = MAX_FEATURE_ABS;
        } else if *val < -MAX_FEATURE_ABS {
            *val = -MAX_FEATURE_ABS;
        }
    }
}

/// Saturate to `[0, 1]`, mapping NaN to `fallback`
pub fn unit_interval(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Saturate to `[lo, hi]`, mapping NaN to `fallback`
pub fn clamp_finite(value: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(lo, hi)
    }
}

/// Health check over accumulators and weights
pub fn diagnose_model(n: &[f64], z: &[f64], weights: &[f64]) -> DiagnosticResult {
    let all = || n.iter().chain(z.iter()).chain(weights.iter());
    let has_nan = all().any(|v| v.is_nan());
    let has_inf = all().any(|v| v.is_infinite());

    let max_abs_weight = weights
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let max_accumulator = n
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, |acc, v| acc.max(*v));
    let negative_accumulator = n.iter().any(|v| *v < 0.0);

    let is_healthy =
        !has_nan && !has_inf && !negative_accumulator && max_abs_weight <= HEALTHY_WEIGHT_ABS;

    let message = if is_healthy {
        "Model is healthy".to_string()
    } else if has_nan {
        "Model contains NaN values".to_string()
    } else if has_inf {
        "Model contains infinite values".to_string()
    } else if negative_accumulator {
        "Model has negative squared-gradient accumulators".to_string()
    } else {
        format!("Model has oversized weights: {:.2e}", max_abs_weight)
    };

    DiagnosticResult {
        is_healthy,
        has_nan,
        has_inf,
        max_abs_weight,
        max_accumulator,
        message,
    }
}
