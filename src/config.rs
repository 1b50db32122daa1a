//! Engine Configuration
//!
//! Nested serde-default sections for the scheduler, the retention model and
//! feature normalization. [`EngineConfig::from_env`] overlays `SRS_*` variables
//! on the defaults; [`EngineConfig::validate`] runs once at engine creation.

use serde::{Deserialize, Serialize};

use crate::error::{SrsError, SrsResult};

/// Samples kept in the in-memory training log before the oldest are evicted
pub const DEFAULT_TRAINING_LOG_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationStat {
    pub mean: f64,
    pub std_dev: f64,
}

impl Default for NormalizationStat {
    fn default() -> Self {
        Self {
            mean: 0.5,
            std_dev: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Local hour at which a new learning day starts
    pub day_boundary_hour: u32,
    /// Offset of the learner's local time from UTC
    pub utc_offset_minutes: i32,
    pub lapse_delay_minutes: i64,
    pub learning_delay_minutes: i64,
    pub max_interval_days: i32,
    pub mastery_interval_days: i32,
    pub mastery_review_count: i32,
    pub mastery_ease_factor: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            day_boundary_hour: 4,
            utc_offset_minutes: 0,
            lapse_delay_minutes: 1,
            learning_delay_minutes: 10,
            max_interval_days: 36500,
            mastery_interval_days: 21,
            mastery_review_count: 2,
            mastery_ease_factor: 2.3,
        }
    }
}

/// FTRL-Proximal hyper-parameters and ML layer switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MlConfig {
    pub enabled: bool,
    /// Keep training while enabled; predictions still apply when false
    pub online_learning: bool,
    pub alpha: f64,
    pub beta: f64,
    pub l1: f64,
    pub l2: f64,
    pub confidence_warmup_samples: u64,
    pub max_confidence: f64,
    /// Cap on buffered training samples
    pub max_training_samples: usize,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            online_learning: true,
            alpha: 0.1,
            beta: 1.0,
            l1: 0.001,
            l2: 0.01,
            confidence_warmup_samples: 50,
            max_confidence: 0.8,
            max_training_samples: DEFAULT_TRAINING_LOG_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub rt: NormalizationStat,
    pub max_response_time: i64,
    pub response_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rt: NormalizationStat {
                mean: 3000.0,
                std_dev: 1500.0,
            },
            max_response_time: 60000,
            response_window: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub ml: MlConfig,
    pub features: FeatureConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(enabled) = env_parse::<String>("SRS_ML_ENABLED") {
            config.ml.enabled = enabled == "true" || enabled == "1";
        }
        if let Some(hour) = env_parse::<u32>("SRS_DAY_BOUNDARY_HOUR") {
            config.scheduler.day_boundary_hour = hour;
        }
        if let Some(offset) = env_parse::<i32>("SRS_UTC_OFFSET_MINUTES") {
            config.scheduler.utc_offset_minutes = offset;
        }
        if let Some(max_days) = env_parse::<i32>("SRS_MAX_INTERVAL_DAYS") {
            config.scheduler.max_interval_days = max_days;
        }
        if let Some(max_samples) = env_parse::<usize>("SRS_MAX_TRAINING_SAMPLES") {
            config.ml.max_training_samples = max_samples;
        }

        config
    }

    pub fn validate(&self) -> SrsResult<()> {
        if self.scheduler.day_boundary_hour > 23 {
            return Err(SrsError::InvalidConfig(format!(
                "day_boundary_hour must be 0-23, got {}",
                self.scheduler.day_boundary_hour
            )));
        }
        if self.scheduler.utc_offset_minutes.abs() > 14 * 60 {
            return Err(SrsError::InvalidConfig(format!(
                "utc_offset_minutes out of range: {}",
                self.scheduler.utc_offset_minutes
            )));
        }
        if self.scheduler.max_interval_days < 1 {
            return Err(SrsError::InvalidConfig(
                "max_interval_days must be at least 1".to_string(),
            ));
        }
        if self.ml.alpha.is_nan() || self.ml.alpha <= 0.0 || self.ml.beta.is_nan() || self.ml.beta < 0.0 {
            return Err(SrsError::InvalidConfig(
                "FTRL alpha must be positive and beta non-negative".to_string(),
            ));
        }
        if self.ml.l1.is_nan() || self.ml.l1 < 0.0 || self.ml.l2.is_nan() || self.ml.l2 < 0.0 {
            return Err(SrsError::InvalidConfig(
                "FTRL regularization must be non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ml.max_confidence) {
            return Err(SrsError::InvalidConfig(format!(
                "max_confidence must be within [0, 1], got {}",
                self.ml.max_confidence
            )));
        }
        if self.ml.max_training_samples == 0 {
            return Err(SrsError::InvalidConfig(
                "max_training_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.parse::<T>().ok())
}
