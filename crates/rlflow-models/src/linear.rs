//! Linear reward network.

use ndarray::Array1;
use rlflow_abstraction::{EvaluationBatch, ModelError, RewardNet};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output transform applied after the affine layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Identity,
    /// Squashes predictions into (0, 1); used with binary cross entropy.
    Sigmoid,
}

/// `reward = activation(features · weights + bias)` over normalized features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRewardNet {
    pub weights: Array1<f32>,
    pub bias: f32,
    #[serde(default)]
    pub activation: Activation,
    #[serde(skip, default = "default_training")]
    training: bool,
}

const fn default_training() -> bool {
    true
}

impl LinearRewardNet {
    /// A zero-initialized network over `num_features` inputs, in training mode.
    #[must_use]
    pub fn zeros(num_features: usize, activation: Activation) -> Self {
        Self {
            weights: Array1::zeros(num_features),
            bias: 0.0,
            activation,
            training: true,
        }
    }

    #[must_use]
    pub fn num_features(&self) -> usize {
        self.weights.len()
    }

    /// Affine output before the activation.
    pub(crate) fn logits(&self, batch: &EvaluationBatch) -> Result<Array1<f32>, ModelError> {
        let features = batch.features();
        if features.ncols() != self.weights.len() {
            return Err(ModelError::ShapeMismatch {
                expected: self.weights.len(),
                actual: features.ncols(),
            });
        }
        Ok(features.dot(&self.weights) + self.bias)
    }

    /// Loads a checkpoint written by `save`. The loaded network is in training mode.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ModelError::Other(format!("failed to read checkpoint {}: {e}", path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            ModelError::InvalidInput(format!("invalid checkpoint {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ModelError::Other(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| {
            ModelError::Other(format!("failed to write checkpoint {}: {e}", path.display()))
        })
    }
}

impl RewardNet for LinearRewardNet {
    fn predict(&self, batch: &EvaluationBatch) -> Result<Array1<f32>, ModelError> {
        let logits = self.logits(batch)?;
        Ok(match self.activation {
            Activation::Identity => logits,
            Activation::Sigmoid => logits.mapv(sigmoid),
        })
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
