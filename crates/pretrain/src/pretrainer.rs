//! Training and persistence of category warm starts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use uuid::Uuid;

use larder_checkpoint::{CheckpointOwner, ModelCheckpoint};
use larder_features::{FeatureBuilder, FEATURE_NAMES};
use larder_models::{CategoryKey, TrainingStats};
use larder_ssm::{ModelParameters, ModelState, StateSpaceModel};
use larder_store::{with_retry, ModelStore};

use crate::categories::{builtin_categories, CategoryTemplate};
use crate::error::PretrainError;
use crate::generator::generate_history;

/// Quantity increase treated as a restock while training.
const RESTOCK_BUFFER: f64 = 0.05;
/// Passes over the synthetic stream.
const TRAIN_PASSES: u32 = 3;
/// Gradient step size during pretraining.
const LEARNING_RATE: f64 = 1e-3;
/// EWMA stabilizer weight during pretraining.
const EWMA_ALPHA: f64 = 0.3;

/// Configuration for the one-shot pretrainer.
#[derive(Debug, Clone)]
pub struct PretrainConfig {
    seed: u64,
    days: u32,
    start: Option<DateTime<Utc>>,
}

impl Default for PretrainConfig {
    /// Defaults: seed 42, 60 days of synthetic history, starting
    /// `days` before the current time.
    fn default() -> Self {
        Self {
            seed: 42,
            days: 60,
            start: None,
        }
    }
}

impl PretrainConfig {
    /// Sets the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Returns the RNG seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sets the number of synthetic days.
    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days.max(1);
        self
    }

    /// Returns the number of synthetic days.
    pub fn days(&self) -> u32 {
        self.days
    }

    /// Pins the history start (fully deterministic runs).
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Returns the pinned start, if any.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }
}

/// One-shot generator of category warm-start checkpoints.
pub struct SyntheticPretrainer {
    config: PretrainConfig,
    models: Arc<dyn ModelStore>,
    features: FeatureBuilder,
}

impl SyntheticPretrainer {
    /// Creates a pretrainer writing to `models`.
    pub fn new(config: PretrainConfig, models: Arc<dyn ModelStore>) -> Self {
        Self {
            config,
            models,
            features: FeatureBuilder::utc(),
        }
    }

    /// Trains and persists a checkpoint for every built-in category.
    ///
    /// Returns the category keys persisted, in training order.
    #[tracing::instrument(skip(self))]
    pub fn run(&self) -> Result<Vec<CategoryKey>, PretrainError> {
        let start = self
            .config
            .start()
            .unwrap_or_else(|| Utc::now() - chrono::Duration::days(self.config.days() as i64));

        let mut persisted = Vec::new();
        for (index, template) in builtin_categories().into_iter().enumerate() {
            // Per-category stream so reordering categories never
            // perturbs another category's data.
            let mut rng = StdRng::seed_from_u64(self.config.seed().wrapping_add(index as u64));
            let history = generate_history(&template, start, self.config.days(), &mut rng);
            let checkpoint = self.train_category(&template, &history)?;
            let owner = CheckpointOwner::Category(template.key.clone());
            with_retry("pretrained checkpoint store", || {
                self.models.store(&owner, &checkpoint)
            })?;
            info!(
                category = %template.key,
                rate = checkpoint.last_state.rate(),
                observations = history.len(),
                "category warm start persisted"
            );
            persisted.push(template.key);
        }
        Ok(persisted)
    }

    /// Trains one category model on its synthetic stream with restock
    /// masking: upward jumps reset the state instead of being learned.
    fn train_category(
        &self,
        template: &CategoryTemplate,
        history: &[(DateTime<Utc>, f64)],
    ) -> Result<ModelCheckpoint, PretrainError> {
        let descriptor = template
            .descriptor()
            .expect("builtin templates are valid");
        let mut model = StateSpaceModel::new(ModelParameters::defaults());
        let mut state = ModelState::initial(
            template.base_weekly_qty,
            template.base_daily,
            descriptor.quantity_max(),
        );
        let mut stats = TrainingStats::new();

        for _pass in 0..TRAIN_PASSES {
            state = ModelState::initial(
                template.base_weekly_qty,
                template.base_daily,
                descriptor.quantity_max(),
            );
            stats = TrainingStats::new();
            let mut prev_quantity = template.base_weekly_qty;

            for &(ts, quantity) in history {
                if quantity > prev_quantity + RESTOCK_BUFFER {
                    state = state.restocked(quantity);
                } else {
                    let features = self.features.build(ts, &descriptor);
                    let (predicted, _) = model.predict(&state, &features);
                    let step = model
                        .update(predicted, quantity, descriptor.quantity_max())
                        .map_err(|source| PretrainError::Training {
                            category: template.key.clone(),
                            source,
                        })?;
                    model.params_mut().apply_gradient_step(
                        &features,
                        step.innovation,
                        LEARNING_RATE,
                        EWMA_ALPHA,
                    );
                    stats.update(step.innovation, EWMA_ALPHA, ts);
                    state = step.state;
                }
                prev_quantity = quantity;
            }
        }

        let now = Utc::now();
        Ok(ModelCheckpoint {
            model_id: Uuid::new_v4(),
            owner: CheckpointOwner::Category(template.key.clone()),
            version: 1,
            parameters: model.params().clone(),
            last_state: state,
            created_at: now,
            trained_at: now,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            stats,
        })
    }
}

impl std::fmt::Debug for SyntheticPretrainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticPretrainer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
