//! Personal Retention Predictor
//!
//! Online logistic regression estimating the probability that the learner has
//! forgotten an item, trained after every review with FTRL-Proximal
//! (per-coordinate adaptive learning rates).
//!
//! Mathematical formulas:
//! - Prediction: p = σ(w · x), logit clamped to ±[`MAX_LOGIT`] before `exp`
//! - Gradient: g_i = (p - y) · x_i
//! - σ_i = (√(n_i + g_i²) - √n_i) / α
//! - z_i ← z_i + g_i - σ_i · w_i,  n_i ← n_i + g_i²
//! - w_i = 0 if |z_i| ≤ λ1, else -(z_i - sgn(z_i)·λ1) / ((β + √n_i)/α + λ2)
//!
//! `z` and `n` are authoritative for training; `weights` is the cached
//! closed-form solution used for prediction and is persisted alongside them so a
//! restored model reproduces its predictions exactly.
//!
//! References:
//! - McMahan et al. (2013). Ad Click Prediction: a View from the Trenches.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{MlConfig, DEFAULT_TRAINING_LOG_CAPACITY};
use crate::error::{SrsError, SrsResult};
use crate::sanitize::{diagnose_model, has_invalid_values, sanitize_feature_vector, unit_interval};
use crate::types::{DiagnosticResult, FeatureVector, TrainingSample, FEATURE_DIMENSION};

// ==================== Constants ====================

/// Logit clamp applied before exponentiation
pub const MAX_LOGIT: f64 = 35.0;

/// Weight magnitude cap
const MAX_WEIGHT: f64 = 30.0;

/// Accumulator cap, keeps `z` finite under adversarial streams
const MAX_ACCUMULATOR: f64 = 1e12;

// ==================== Model State ====================

/// Serializable snapshot of the predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelState {
    pub n: Vec<f64>,
    pub z: Vec<f64>,
    pub weights: Vec<f64>,
    pub version: u64,
    pub sample_count: u64,
}

impl Default for ModelState {
    fn default() -> Self {
        Self {
            n: vec![0.0; FEATURE_DIMENSION],
            z: vec![0.0; FEATURE_DIMENSION],
            weights: vec![0.0; FEATURE_DIMENSION],
            version: 0,
            sample_count: 0,
        }
    }
}

impl ModelState {
    pub fn to_json(&self) -> SrsResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SrsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ==================== Predictor ====================

#[derive(Debug, Clone)]
pub struct RetentionPredictor {
    alpha: f64,
    beta: f64,
    l1: f64,
    l2: f64,
    confidence_warmup_samples: u64,
    max_confidence: f64,
    n: [f64; FEATURE_DIMENSION],
    z: [f64; FEATURE_DIMENSION],
    weights: [f64; FEATURE_DIMENSION],
    version: u64,
    sample_count: u64,
}

impl Default for RetentionPredictor {
    fn default() -> Self {
        Self::new(&MlConfig::default())
    }
}

impl RetentionPredictor {
    pub fn new(config: &MlConfig) -> Self {
        Self {
            alpha: if config.alpha > 0.0 { config.alpha } else { 0.1 },
            beta: config.beta.max(0.0),
            l1: config.l1.max(0.0),
            l2: config.l2.max(0.0),
            confidence_warmup_samples: config.confidence_warmup_samples.max(1),
            max_confidence: unit_interval(config.max_confidence, 0.0),
            n: [0.0; FEATURE_DIMENSION],
            z: [0.0; FEATURE_DIMENSION],
            weights: [0.0; FEATURE_DIMENSION],
            version: 0,
            sample_count: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Forget probability in [0, 1]; never NaN
    pub fn predict_forget_probability(&self, features: &[f64]) -> f64 {
        let x = prepare_features(features);
        self.predict_prepared(&x)
    }

    /// Parallel prediction over many items
    pub fn predict_batch(&self, features: &[FeatureVector]) -> Vec<f64> {
        features
            .par_iter()
            .map(|x| self.predict_forget_probability(x))
            .collect()
    }

    fn predict_prepared(&self, x: &FeatureVector) -> f64 {
        let logit: f64 = self.weights.iter().zip(x.iter()).map(|(w, v)| w * v).sum();
        let logit = if logit.is_nan() {
            0.0
        } else {
            logit.clamp(-MAX_LOGIT, MAX_LOGIT)
        };
        unit_interval(sigmoid(logit), 0.5)
    }

    /// How much the host should trust predictions, ramping up with samples seen
    pub fn confidence(&self) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        let ramp = (self.sample_count as f64 / self.confidence_warmup_samples as f64).min(1.0);
        ramp * self.max_confidence
    }

    /// One FTRL step. `label`: 0 = remembered, 1 = forgotten.
    /// Returns |prediction - label| measured before the step.
    pub fn update_online(&mut self, features: &[f64], label: f64) -> f64 {
        if has_invalid_values(features) {
            warn!("non-finite features replaced before online update");
        }
        let x = prepare_features(features);
        let y = unit_interval(label, 0.0);

        for i in 0..FEATURE_DIMENSION {
            self.weights[i] = self.solve_weight(i);
        }
        let p = self.predict_prepared(&x);
        let residual = p - y;

        for i in 0..FEATURE_DIMENSION {
            if x[i] == 0.0 {
                continue;
            }
            let g = residual * x[i];
            let n_next = (self.n[i] + g * g).min(MAX_ACCUMULATOR);
            let sigma = (n_next.sqrt() - self.n[i].sqrt()) / self.alpha;
            self.z[i] = (self.z[i] + g - sigma * self.weights[i])
                .clamp(-MAX_ACCUMULATOR, MAX_ACCUMULATOR);
            self.n[i] = n_next;
            self.weights[i] = self.solve_weight(i);
        }

        self.sample_count += 1;
        self.version += 1;

        let error = residual.abs();
        debug!(
            version = self.version,
            sample_count = self.sample_count,
            prediction = p,
            label = y,
            error,
            "retention model updated"
        );
        error
    }

    fn solve_weight(&self, i: usize) -> f64 {
        let z = self.z[i];
        if z.abs() <= self.l1 {
            return 0.0;
        }
        let denom = (self.beta + self.n[i].sqrt()) / self.alpha + self.l2;
        (-(z - z.signum() * self.l1) / denom).clamp(-MAX_WEIGHT, MAX_WEIGHT)
    }

    /// Seeds weights from a population prior. `n` and `sample_count` are kept;
    /// `z` is back-solved so the next update continues from the prior.
    pub fn init_from_prior(&mut self, weights: &[f64]) -> SrsResult<()> {
        check_dimension("weights", weights)?;
        check_finite("weights", weights)?;

        for (i, &w) in weights.iter().enumerate() {
            let w = w.clamp(-MAX_WEIGHT, MAX_WEIGHT);
            let denom = (self.beta + self.n[i].sqrt()) / self.alpha + self.l2;
            self.z[i] = if w == 0.0 {
                0.0
            } else {
                -w * denom - w.signum() * self.l1
            };
            self.weights[i] = w;
        }
        self.version += 1;

        info!(version = self.version, "retention model seeded from prior");
        Ok(())
    }

    pub fn restore(
        &mut self,
        n: &[f64],
        z: &[f64],
        weights: &[f64],
        version: u64,
        sample_count: u64,
    ) -> SrsResult<()> {
        check_dimension("n", n)?;
        check_dimension("z", z)?;
        check_dimension("weights", weights)?;
        check_finite("n", n)?;
        check_finite("z", z)?;
        check_finite("weights", weights)?;

        self.n.copy_from_slice(n);
        self.z.copy_from_slice(z);
        self.weights.copy_from_slice(weights);
        self.version = version;
        self.sample_count = sample_count;

        info!(version, sample_count, "retention model restored");
        Ok(())
    }

    pub fn restore_state(&mut self, state: &ModelState) -> SrsResult<()> {
        self.restore(
            &state.n,
            &state.z,
            &state.weights,
            state.version,
            state.sample_count,
        )
    }

    pub fn snapshot(&self) -> ModelState {
        ModelState {
            n: self.n.to_vec(),
            z: self.z.to_vec(),
            weights: self.weights.to_vec(),
            version: self.version,
            sample_count: self.sample_count,
        }
    }

    pub fn reset(&mut self) {
        self.n = [0.0; FEATURE_DIMENSION];
        self.z = [0.0; FEATURE_DIMENSION];
        self.weights = [0.0; FEATURE_DIMENSION];
        self.version = 0;
        self.sample_count = 0;
        info!("retention model reset");
    }

    pub fn diagnose(&self) -> DiagnosticResult {
        diagnose_model(&self.n, &self.z, &self.weights)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Copies into a fixed-size vector: missing slots are 0, extra slots dropped
fn prepare_features(features: &[f64]) -> FeatureVector {
    let mut x = [0.0; FEATURE_DIMENSION];
    for (slot, value) in x.iter_mut().zip(features.iter()) {
        *slot = *value;
    }
    sanitize_feature_vector(&mut x);
    x
}

fn check_dimension(field: &'static str, values: &[f64]) -> SrsResult<()> {
    if values.len() != FEATURE_DIMENSION {
        warn!(field, actual = values.len(), "rejected model state with wrong dimension");
        return Err(SrsError::DimensionMismatch {
            field,
            expected: FEATURE_DIMENSION,
            actual: values.len(),
        });
    }
    Ok(())
}

fn check_finite(field: &'static str, values: &[f64]) -> SrsResult<()> {
    if has_invalid_values(values) {
        warn!(field, "rejected model state with non-finite values");
        return Err(SrsError::NonFiniteState { field });
    }
    Ok(())
}

// ==================== Shared Predictor ====================

/// Single-writer handle: concurrent reads, exclusive `update_online`
#[derive(Debug, Clone, Default)]
pub struct SharedPredictor {
    inner: Arc<RwLock<RetentionPredictor>>,
}

impl SharedPredictor {
    pub fn new(predictor: RetentionPredictor) -> Self {
        Self {
            inner: Arc::new(RwLock::new(predictor)),
        }
    }

    pub fn predict_forget_probability(&self, features: &[f64]) -> f64 {
        self.inner.read().predict_forget_probability(features)
    }

    pub fn confidence(&self) -> f64 {
        self.inner.read().confidence()
    }

    pub fn update_online(&self, features: &[f64], label: f64) -> f64 {
        self.inner.write().update_online(features, label)
    }

    /// Runs `f` under the write lock so predict-then-update is atomic
    pub fn with_write<R>(&self, f: impl FnOnce(&mut RetentionPredictor) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn with_read<R>(&self, f: impl FnOnce(&RetentionPredictor) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn snapshot(&self) -> ModelState {
        self.inner.read().snapshot()
    }

    pub fn restore_state(&self, state: &ModelState) -> SrsResult<()> {
        self.inner.write().restore_state(state)
    }

    pub fn init_from_prior(&self, weights: &[f64]) -> SrsResult<()> {
        self.inner.write().init_from_prior(weights)
    }

    pub fn reset(&self) {
        self.inner.write().reset()
    }
}

// ==================== Training Log ====================

/// Bounded sample log for offline diagnostics and re-training.
///
/// Holds at most `capacity` samples; appending to a full log evicts the oldest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingLog {
    samples: VecDeque<TrainingSample>,
    capacity: usize,
    #[serde(default)]
    evicted: u64,
}

impl Default for TrainingLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRAINING_LOG_CAPACITY)
    }
}

impl TrainingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            evicted: 0,
        }
    }

    pub fn append(&mut self, sample: TrainingSample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
            self.evicted += 1;
        }
        self.samples.push_back(sample);
    }

    /// Shrinks or grows the cap; shrinking drops the oldest samples
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
            self.evicted += 1;
        }
    }

    /// Removes and returns every buffered sample, oldest first
    pub fn drain(&mut self) -> Vec<TrainingSample> {
        self.samples.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainingSample> {
        self.samples.iter()
    }

    pub fn to_vec(&self) -> Vec<TrainingSample> {
        self.samples.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples dropped because the log was full
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Mean prediction error recorded at sample time
    pub fn mean_error(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.prediction_error).sum::<f64>() / self.samples.len() as f64
    }

    /// Replays every sample in order; returns the mean replay error
    pub fn replay_into(&self, predictor: &mut RetentionPredictor) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .samples
            .iter()
            .map(|s| predictor.update_online(&s.features, s.label))
            .sum();
        total / self.samples.len() as f64
    }
}
