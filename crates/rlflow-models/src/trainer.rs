//! Mini-batch gradient descent for `LinearRewardNet`.

use crate::linear::{Activation, LinearRewardNet};
use ndarray::Array1;
use rlflow_abstraction::{EvaluationBatch, LossType, ModelError, RewardNet, RewardNetTrainer};

pub struct LinearRewardTrainer {
    net: LinearRewardNet,
    loss_type: LossType,
    learning_rate: f32,
}

impl LinearRewardTrainer {
    /// Takes ownership of `net` and puts it in training mode.
    #[must_use]
    pub fn new(mut net: LinearRewardNet, loss_type: LossType, learning_rate: f32) -> Self {
        net.set_training(true);
        Self {
            net,
            loss_type,
            learning_rate,
        }
    }

    /// One gradient step on `batch`. Returns the loss before the update.
    pub fn train_step(&mut self, batch: &EvaluationBatch) -> Result<f32, ModelError> {
        if !self.net.is_training() {
            return Err(ModelError::InvalidInput(
                "reward net is not in training mode".to_string(),
            ));
        }
        let target = batch.reward_signal().ok_or_else(|| {
            ModelError::InvalidInput(format!(
                "{} batch has no reward to train on",
                batch.kind()
            ))
        })?;

        let predicted = self.net.predict(batch)?;
        let loss = self.loss(&predicted, target)?;

        let n = target.len() as f32;
        let diff = &predicted - target;
        // d(loss)/d(logit); for BCE the sigmoid derivative cancels.
        let grad: Array1<f32> = match (self.loss_type, self.net.activation) {
            (LossType::Mse, Activation::Identity) => diff.mapv(|d| 2.0 * d / n),
            (LossType::Mse, Activation::Sigmoid) => ndarray::Zip::from(&diff)
                .and(&predicted)
                .map_collect(|&d, &p| 2.0 * d * p * (1.0 - p) / n),
            (LossType::Mae, Activation::Identity) => diff.mapv(|d| sign(d) / n),
            (LossType::Mae, Activation::Sigmoid) => ndarray::Zip::from(&diff)
                .and(&predicted)
                .map_collect(|&d, &p| sign(d) * p * (1.0 - p) / n),
            (LossType::Bce, _) => diff.mapv(|d| d / n),
        };

        let grad_weights = batch.features().t().dot(&grad);
        self.net.weights.scaled_add(-self.learning_rate, &grad_weights);
        self.net.bias -= self.learning_rate * grad.sum();

        Ok(loss[0])
    }
}

fn sign(d: f32) -> f32 {
    if d > 0.0 {
        1.0
    } else if d < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl RewardNetTrainer for LinearRewardTrainer {
    type Net = LinearRewardNet;

    fn reward_net(&self) -> &LinearRewardNet {
        &self.net
    }

    fn reward_net_mut(&mut self) -> &mut LinearRewardNet {
        &mut self.net
    }

    fn loss_type(&self) -> LossType {
        self.loss_type
    }
}
