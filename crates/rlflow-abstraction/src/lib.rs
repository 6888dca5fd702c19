//! Reward model abstraction layer for rlflow.
//!
//! This module defines the traits and types the evaluation and training code uses to talk to a
//! reward-prediction network without knowing its architecture.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error that can occur when running a reward model.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// Two arrays that must line up had different lengths.
    #[error("Shape Mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// The length the operation required.
        expected: usize,
        /// The length it was given.
        actual: usize,
    },

    /// The input batch cannot be consumed by the model (e.g., wrong feature width).
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

/// Loss functions a reward trainer can pair with its network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    /// Mean squared error.
    #[default]
    Mse,
    /// Mean absolute error.
    Mae,
    /// Binary cross entropy over predictions interpreted as probabilities.
    Bce,
}

impl LossType {
    /// Short name used in logs and metric keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mse => "mse",
            Self::Mae => "mae",
            Self::Bce => "bce",
        }
    }

    /// Computes the mean-reduced loss between predictions and targets.
    ///
    /// The result is a single-element array so callers can flatten and concatenate losses
    /// the same way they do for per-sample values.
    ///
    /// # Errors
    /// Returns `ModelError::ShapeMismatch` if the two arrays differ in length, or
    /// `ModelError::InvalidInput` if they are empty.
    pub fn compute(
        &self,
        predicted: &Array1<f32>,
        target: &Array1<f32>,
    ) -> Result<Array1<f32>, ModelError> {
        if predicted.len() != target.len() {
            return Err(ModelError::ShapeMismatch {
                expected: target.len(),
                actual: predicted.len(),
            });
        }
        if target.is_empty() {
            return Err(ModelError::InvalidInput(
                "cannot compute loss over an empty batch".to_string(),
            ));
        }

        let per_sample: Array1<f32> = match self {
            Self::Mse => (predicted - target).mapv(|d| d * d),
            Self::Mae => (predicted - target).mapv(f32::abs),
            Self::Bce => {
                let eps = 1e-7_f32;
                ndarray::Zip::from(predicted).and(target).map_collect(|&p, &y| {
                    let p = p.clamp(eps, 1.0 - eps);
                    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
                })
            }
        };

        let mean = per_sample.sum() / per_sample.len() as f32;
        Ok(Array1::from_elem(1, mean))
    }
}

impl std::fmt::Display for LossType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A batch of ranking data: one row of pooled features per slate.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingBatch {
    /// Slate features, shape `[num_slates, num_features]`.
    pub slate_features: Array2<f32>,
    /// Observed reward of each slate, if logged.
    pub slate_reward: Option<Array1<f32>>,
}

/// A batch of transitions: one row of state features per step.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch {
    /// State features, shape `[batch_size, num_features]`.
    pub features: Array2<f32>,
    /// Observed scalar reward of each step, if logged.
    pub reward: Option<Array1<f32>>,
}

/// Input handed to a reward network during training or evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationBatch {
    /// Ranking-style batch carrying slate-level rewards.
    Ranking(RankingBatch),
    /// Transition-style batch carrying scalar rewards.
    Transition(TransitionBatch),
}

impl EvaluationBatch {
    /// Feature matrix of the batch, one row per prediction.
    #[must_use]
    pub fn features(&self) -> &Array2<f32> {
        match self {
            Self::Ranking(b) => &b.slate_features,
            Self::Transition(b) => &b.features,
        }
    }

    /// Ground-truth reward signal: the slate reward for ranking batches, the scalar reward
    /// otherwise.
    #[must_use]
    pub fn reward_signal(&self) -> Option<&Array1<f32>> {
        match self {
            Self::Ranking(b) => b.slate_reward.as_ref(),
            Self::Transition(b) => b.reward.as_ref(),
        }
    }

    /// Name of the batch kind, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ranking(_) => "ranking",
            Self::Transition(_) => "transition",
        }
    }

    /// Number of predictions the batch asks for.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features().nrows()
    }

    /// Returns `true` if the batch holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A reward-prediction network.
///
/// The training flag is shared state: whoever holds the network decides when it is in
/// training or evaluation mode.
pub trait RewardNet: Send + Sync {
    /// Predicts one reward per batch row.
    ///
    /// # Errors
    /// Returns a `ModelError` if the batch does not fit the network.
    fn predict(&self, batch: &EvaluationBatch) -> Result<Array1<f32>, ModelError>;

    /// Returns `true` while the network is in training mode.
    fn is_training(&self) -> bool;

    /// Switches between training (`true`) and evaluation (`false`) mode.
    fn set_training(&mut self, training: bool);
}

/// The owner of a reward network and the loss it is trained with.
pub trait RewardNetTrainer {
    /// Concrete network type. `Clone` must produce a fully independent copy.
    type Net: RewardNet + Clone;

    /// The live network.
    fn reward_net(&self) -> &Self::Net;

    /// Mutable access to the live network.
    fn reward_net_mut(&mut self) -> &mut Self::Net;

    /// Loss function paired with the network.
    fn loss_type(&self) -> LossType;

    /// Computes the loss between predicted and observed rewards.
    ///
    /// # Errors
    /// Returns a `ModelError` if the inputs do not line up.
    fn loss(
        &self,
        predicted: &Array1<f32>,
        target: &Array1<f32>,
    ) -> Result<Array1<f32>, ModelError> {
        self.loss_type().compute(predicted, target)
    }
}
