//! Scheduling Engine
//!
//! Per-profile orchestrator. One `review` call:
//! 1. turns the study action into a canonical outcome (spelling evaluation,
//!    hesitation check against the adaptive threshold)
//! 2. builds the feature vector for the pre-review state
//! 3. predicts and trains the retention model under its write lock
//! 4. schedules with the SM-2 rules, refined by the model when enabled
//! 5. appends the observation to the training log
//!
//! The engine owns the only mutable shared state (model, response-time window,
//! training log); scheduling itself stays pure.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::SrsResult;
use crate::features::{FeatureBuilder, ItemStats};
use crate::predictor::{ModelState, RetentionPredictor, SharedPredictor, TrainingLog};
use crate::retry::RetryQueuePlanner;
use crate::scheduler::{MlAdjustment, MlInputs, SchedulePreview, ScheduleResult, Scheduler};
use crate::spelling::{evaluate_detailed, SpellingEvaluation, SpellingMode};
use crate::threshold::{is_hesitant, ResponseTimeStats};
use crate::types::{DiagnosticResult, Progress, Rating, StudyOutcome, TrainingSample};

// ==================== Requests ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StudyAction {
    /// Explicit self-assessment
    Rating { rating: Rating },
    /// Right/wrong answer; the rating is derived from response time
    Answer { is_correct: bool },
    #[serde(rename_all = "camelCase")]
    Spelling {
        input: String,
        correct_answer: String,
        #[serde(default)]
        mode: SpellingMode,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub previous: Option<Progress>,
    pub action: StudyAction,
    #[serde(default)]
    pub stats: ItemStats,
    pub now_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub progress: Progress,
    pub outcome: StudyOutcome,
    pub spelling: Option<SpellingEvaluation>,
    /// Correct but slower than the adaptive threshold
    pub hesitant: bool,
    pub response_threshold_ms: f64,
    pub ml: Option<MlAdjustment>,
    /// |p - y| before the online step, when the model was trained
    pub prediction_error: Option<f64>,
    pub model_version: u64,
}

// ==================== Engine ====================

pub struct SchedulingEngine {
    config: RwLock<EngineConfig>,
    scheduler: Scheduler,
    features: FeatureBuilder,
    predictor: SharedPredictor,
    response_times: Mutex<ResponseTimeStats>,
    training_log: Mutex<TrainingLog>,
    retry: RetryQueuePlanner,
}

impl SchedulingEngine {
    pub fn new(config: EngineConfig) -> SrsResult<Self> {
        config.validate()?;
        let scheduler = Scheduler::new(config.scheduler.clone());
        let features = FeatureBuilder::new(config.features.clone(), *scheduler.calendar());
        let predictor = SharedPredictor::new(RetentionPredictor::new(&config.ml));
        let response_times = ResponseTimeStats::new(config.features.response_window);
        let training_log = TrainingLog::with_capacity(config.ml.max_training_samples);

        info!(
            ml_enabled = config.ml.enabled,
            day_boundary_hour = config.scheduler.day_boundary_hour,
            "scheduling engine created"
        );

        Ok(Self {
            config: RwLock::new(config),
            scheduler,
            features,
            predictor,
            response_times: Mutex::new(response_times),
            training_log: Mutex::new(training_log),
            retry: RetryQueuePlanner::default(),
        })
    }

    pub fn from_env() -> SrsResult<Self> {
        Self::new(EngineConfig::from_env())
    }

    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    pub fn ml_enabled(&self) -> bool {
        self.config.read().ml.enabled
    }

    /// Takes effect from the next review; past schedules are left alone
    pub fn set_ml_enabled(&self, enabled: bool) {
        let mut config = self.config.write();
        if config.ml.enabled != enabled {
            config.ml.enabled = enabled;
            info!(ml_enabled = enabled, "ML layer toggled");
        }
    }

    pub fn set_online_learning(&self, enabled: bool) {
        self.config.write().ml.online_learning = enabled;
        info!(online_learning = enabled, "online learning toggled");
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn retry_planner(&self) -> &RetryQueuePlanner {
        &self.retry
    }

    pub fn response_threshold(&self) -> f64 {
        let ml_enabled = self.ml_enabled();
        self.response_times.lock().threshold(ml_enabled)
    }

    pub fn review(&self, request: ReviewRequest) -> ReviewOutcome {
        let (ml_enabled, online_learning) = {
            let config = self.config.read();
            (config.ml.enabled, config.ml.online_learning)
        };
        let ReviewRequest {
            previous,
            action,
            mut stats,
            now_ms,
        } = request;

        // Threshold and baseline come from the window before this answer is recorded
        let (threshold, rt_mean, rt_std) = {
            let mut window = self.response_times.lock();
            let snapshot = (window.threshold(ml_enabled), window.mean(), window.std_dev());
            if let Some(rt) = stats.response_time_ms {
                window.record(rt);
            }
            snapshot
        };

        let response_time_ms = stats.response_time_ms.unwrap_or(0);
        let mut spelling = None;
        let outcome: StudyOutcome = match &action {
            StudyAction::Rating { rating } => (*rating).into(),
            StudyAction::Answer { is_correct } => {
                Rating::from_answer(*is_correct, response_time_ms, threshold).into()
            }
            StudyAction::Spelling {
                input,
                correct_answer,
                mode,
            } => {
                let eval = evaluate_detailed(
                    input,
                    correct_answer,
                    stats.hint_used,
                    stats.attempt_count,
                    *mode,
                );
                spelling = Some(eval);
                eval.outcome.into()
            }
        };
        let hesitant = stats.response_time_ms.is_some()
            && is_hesitant(!outcome.is_lapse(), response_time_ms, threshold);

        if stats.user_rt_mean.is_none() && rt_mean > 0.0 {
            stats.user_rt_mean = Some(rt_mean);
            stats.user_rt_std = Some(rt_std);
        }

        let (result, prediction_error) = if ml_enabled {
            self.schedule_with_model(previous.as_ref(), outcome, &stats, now_ms, online_learning)
        } else {
            (
                self.scheduler.schedule(previous.as_ref(), outcome, now_ms),
                None,
            )
        };

        let model_version = self.predictor.with_read(|p| p.version());

        debug!(
            outcome = ?outcome,
            hesitant,
            interval_days = result.progress.interval_days,
            status = result.progress.status.as_str(),
            model_version,
            "review processed"
        );

        ReviewOutcome {
            progress: result.progress,
            outcome,
            spelling,
            hesitant,
            response_threshold_ms: threshold,
            ml: result.ml,
            prediction_error,
            model_version,
        }
    }

    fn schedule_with_model(
        &self,
        previous: Option<&Progress>,
        outcome: StudyOutcome,
        stats: &ItemStats,
        now_ms: i64,
        online_learning: bool,
    ) -> (ScheduleResult, Option<f64>) {
        let prev = previous.cloned().unwrap_or_default();
        let x = self.features.build(&prev, stats, now_ms);
        let label = outcome.label();

        let (forget_probability, confidence, error) = self.predictor.with_write(|model| {
            let p = model.predict_forget_probability(&x);
            let confidence = model.confidence();
            let error = online_learning.then(|| model.update_online(&x, label));
            (p, confidence, error)
        });

        if let Some(prediction_error) = error {
            self.training_log.lock().append(TrainingSample {
                features: x.to_vec(),
                label,
                timestamp: now_ms,
                prediction_error,
            });
        }

        let base = self.scheduler.schedule(previous, outcome, now_ms);
        let next_stats = ItemStats {
            recent_accuracy: stats.recent_accuracy,
            user_rt_mean: stats.user_rt_mean,
            user_rt_std: stats.user_rt_std,
            ..Default::default()
        };
        let next_x = self.features.build(&base.progress, &next_stats, now_ms);
        let next_forget_probability = self.predictor.predict_forget_probability(&next_x);

        let inputs = MlInputs {
            forget_probability,
            next_forget_probability,
            confidence,
        };
        (
            self.scheduler
                .schedule_with_ml(previous, outcome, now_ms, Some(&inputs)),
            error,
        )
    }

    /// Forget probability for an item as it stands now, without training
    pub fn predict_forget_probability(
        &self,
        progress: &Progress,
        stats: &ItemStats,
        now_ms: i64,
    ) -> f64 {
        let x = self.features.build(progress, stats, now_ms);
        self.predictor.predict_forget_probability(&x)
    }

    /// Batch prediction across a study queue
    pub fn predict_queue(&self, items: &[(Progress, ItemStats)], now_ms: i64) -> Vec<f64> {
        let xs: Vec<_> = items
            .iter()
            .map(|(progress, stats)| self.features.build(progress, stats, now_ms))
            .collect();
        self.predictor.with_read(|model| model.predict_batch(&xs))
    }

    pub fn preview(&self, progress: &Progress, now_ms: i64) -> SchedulePreview {
        self.scheduler.preview(progress, now_ms)
    }

    // ==================== Model State ====================

    pub fn model_snapshot(&self) -> ModelState {
        self.predictor.snapshot()
    }

    pub fn model_confidence(&self) -> f64 {
        self.predictor.confidence()
    }

    pub fn restore_model(&self, state: &ModelState) -> SrsResult<()> {
        self.predictor.restore_state(state)
    }

    pub fn restore_model_json(&self, json: &str) -> SrsResult<()> {
        let state = ModelState::from_json(json)?;
        self.restore_model(&state)
    }

    pub fn init_model_from_prior(&self, weights: &[f64]) -> SrsResult<()> {
        self.predictor.init_from_prior(weights)
    }

    /// Clears the model; the training log is kept for re-training
    pub fn reset_model(&self) {
        self.predictor.reset();
    }

    pub fn diagnose_model(&self) -> DiagnosticResult {
        self.predictor.with_read(|model| model.diagnose())
    }

    /// Copy of the buffered samples, oldest first
    pub fn training_samples(&self) -> Vec<TrainingSample> {
        self.training_log.lock().to_vec()
    }

    /// Hands the buffered samples to the host and empties the log
    pub fn drain_training_samples(&self) -> Vec<TrainingSample> {
        let drained = self.training_log.lock().drain();
        debug!(samples = drained.len(), "training log drained");
        drained
    }

    pub fn training_log_len(&self) -> usize {
        self.training_log.lock().len()
    }

    /// Resets the model and replays the training log; returns the mean replay error
    pub fn retrain_from_log(&self) -> f64 {
        let log = self.training_log.lock();
        let error = self.predictor.with_write(|model| {
            model.reset();
            log.replay_into(model)
        });
        info!(samples = log.len(), mean_error = error, "retention model retrained");
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProgressStatus, SpellingOutcome};

    const NOW: i64 = 1_700_000_000_000;

    fn engine(ml_enabled: bool) -> SchedulingEngine {
        let mut config = EngineConfig::default();
        config.ml.enabled = ml_enabled;
        SchedulingEngine::new(config).expect("valid config")
    }

    fn rating_request(previous: Option<Progress>, rating: Rating) -> ReviewRequest {
        ReviewRequest {
            previous,
            action: StudyAction::Rating { rating },
            stats: ItemStats::default(),
            now_ms: NOW,
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.scheduler.max_interval_days = 0;
        assert!(SchedulingEngine::new(config).is_err());
    }

    #[test]
    fn test_ml_disabled_leaves_model_untouched() {
        let engine = engine(false);
        let outcome = engine.review(rating_request(None, Rating::Good));
        assert_eq!(outcome.progress.interval_days, 1);
        assert!(outcome.ml.is_none());
        assert!(outcome.prediction_error.is_none());
        assert_eq!(engine.model_snapshot().sample_count, 0);
        assert!(engine.training_samples().is_empty());
    }

    #[test]
    fn test_ml_enabled_trains_and_logs() {
        let engine = engine(true);
        let outcome = engine.review(rating_request(None, Rating::Again));
        assert!(outcome.ml.is_some());
        assert!(outcome.prediction_error.is_some());
        assert_eq!(outcome.model_version, 1);
        assert_eq!(engine.training_samples().len(), 1);
        assert_eq!(engine.training_samples()[0].label, 1.0);
    }

    #[test]
    fn test_training_log_stays_bounded() {
        let mut config = EngineConfig::default();
        config.ml.enabled = true;
        config.ml.max_training_samples = 5;
        let engine = SchedulingEngine::new(config).expect("valid config");
        for i in 0..50 {
            let rating = if i % 4 == 0 { Rating::Again } else { Rating::Good };
            engine.review(rating_request(None, rating));
        }
        assert_eq!(engine.model_snapshot().sample_count, 50);
        assert_eq!(engine.training_log_len(), 5);

        let drained = engine.drain_training_samples();
        assert_eq!(drained.len(), 5);
        assert_eq!(engine.training_log_len(), 0);
        assert!(engine.training_samples().is_empty());

        engine.review(rating_request(None, Rating::Good));
        assert_eq!(engine.training_log_len(), 1);
    }

    #[test]
    fn test_response_time_recorded_once_per_review() {
        let engine = engine(true);
        let thresholds: Vec<f64> = (0..3)
            .map(|_| {
                let mut request = rating_request(None, Rating::Good);
                request.stats.response_time_ms = Some(4000);
                engine.review(request).response_threshold_ms
            })
            .collect();
        // The first review sees an empty window; later ones see the 4000 ms baseline
        assert_eq!(thresholds, vec![6000.0, 4000.0, 4000.0]);
        assert_eq!(engine.response_times.lock().len(), 3);
    }

    #[test]
    fn test_spelling_action() {
        let engine = engine(false);
        let request = ReviewRequest {
            previous: None,
            action: StudyAction::Spelling {
                input: "recieve".to_string(),
                correct_answer: "receive".to_string(),
                mode: SpellingMode::Tolerant,
            },
            stats: ItemStats {
                hint_used: true,
                attempt_count: 1,
                ..Default::default()
            },
            now_ms: NOW,
        };
        let outcome = engine.review(request);
        assert_eq!(outcome.outcome, SpellingOutcome::Hinted.into());
        assert_eq!(outcome.spelling.map(|s| s.distance), Some(2));
        assert_eq!(outcome.progress.spelling_attempt_count, 1);
        assert_eq!(outcome.progress.status, ProgressStatus::Learning);
    }

    #[test]
    fn test_answer_action_uses_threshold() {
        let engine = engine(false);
        let slow = ReviewRequest {
            previous: None,
            action: StudyAction::Answer { is_correct: true },
            stats: ItemStats {
                response_time_ms: Some(9000),
                ..Default::default()
            },
            now_ms: NOW,
        };
        let outcome = engine.review(slow);
        assert_eq!(outcome.outcome, Rating::Hard.into());
        assert!(outcome.hesitant);
        assert_eq!(outcome.response_threshold_ms, 6000.0);
    }

    #[test]
    fn test_retrain_from_log_replays_samples() {
        let engine = engine(true);
        for rating in [Rating::Again, Rating::Good, Rating::Good] {
            engine.review(rating_request(None, rating));
        }
        engine.reset_model();
        assert_eq!(engine.model_snapshot().sample_count, 0);
        let error = engine.retrain_from_log();
        assert!((0.0..=1.0).contains(&error));
        assert_eq!(engine.model_snapshot().sample_count, 3);
    }
}
