//! Reward network evaluation across batches, with best-model tracking.
//!
//! One evaluator lives for one evaluation lifecycle. `evaluate` records a batch;
//! `evaluate_post_training` drains everything recorded since the previous call, reports the
//! aggregate and snapshots the network when the mean loss strictly improves.
//!
//! Both calls take `&mut self`, and `evaluate` takes the trainer mutably while it flips the
//! network into evaluation mode, so no other code can observe or race the temporary mode.

use crate::error::{EvaluationError, EvaluationResult};
use ndarray::Array1;
use rlflow_abstraction::{EvaluationBatch, RewardNet, RewardNetTrainer};
use tracing::{debug, info};

/// Best loss before any evaluation has been aggregated.
pub const INITIAL_BEST_LOSS: f64 = 1e9;

/// An owned copy of the best network seen so far.
#[derive(Debug, Clone)]
pub struct BestModelSnapshot<N> {
    pub model: N,
    pub loss: f64,
    /// Starts at 1 and increases on every replacement.
    pub version: u64,
}

/// Aggregate of one evaluation epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub mean_loss: f64,
    pub rewards: Array1<f32>,
    pub pred_rewards: Array1<f32>,
}

#[derive(Debug)]
pub struct RewardNetEvaluator<N> {
    loss: Vec<Array1<f32>>,
    rewards: Vec<Array1<f32>>,
    pred_rewards: Vec<Array1<f32>>,
    best: Option<BestModelSnapshot<N>>,
    best_model_loss: f64,
}

impl<N: RewardNet + Clone> Default for RewardNetEvaluator<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: RewardNet + Clone> RewardNetEvaluator<N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loss: Vec::new(),
            rewards: Vec::new(),
            pred_rewards: Vec::new(),
            best: None,
            best_model_loss: INITIAL_BEST_LOSS,
        }
    }

    /// Scores one batch and records loss, reward and prediction.
    ///
    /// The network is in evaluation mode for the duration of the call and is returned to its
    /// previous mode afterwards, also when scoring fails.
    pub fn evaluate<T>(
        &mut self,
        trainer: &mut T,
        batch: &EvaluationBatch,
    ) -> EvaluationResult<()>
    where
        T: RewardNetTrainer<Net = N>,
    {
        let prev_training = trainer.reward_net().is_training();
        trainer.reward_net_mut().set_training(false);
        let scored = score_batch(&*trainer, batch);
        trainer.reward_net_mut().set_training(prev_training);

        let (loss, reward, pred_reward) = scored?;
        self.loss.push(loss);
        self.rewards.push(reward);
        self.pred_rewards.push(pred_reward);
        Ok(())
    }

    /// Aggregates and clears everything recorded since the last call.
    pub fn evaluate_post_training<T>(
        &mut self,
        trainer: &T,
    ) -> EvaluationResult<EvaluationReport>
    where
        T: RewardNetTrainer<Net = N>,
    {
        let loss = std::mem::take(&mut self.loss);
        let rewards = std::mem::take(&mut self.rewards);
        let pred_rewards = std::mem::take(&mut self.pred_rewards);

        let count: usize = loss.iter().map(Array1::len).sum();
        if count == 0 {
            return Err(EvaluationError::EmptyAccumulator);
        }
        let total: f64 = loss
            .iter()
            .flat_map(|l| l.iter())
            .map(|v| f64::from(*v))
            .sum();
        let mean_loss = total / count as f64;
        info!(
            loss_type = %trainer.loss_type(),
            mean_loss,
            batches = loss.len(),
            "Evaluation"
        );

        let report = EvaluationReport {
            mean_loss,
            rewards: concat(&rewards),
            pred_rewards: concat(&pred_rewards),
        };

        if mean_loss < self.best_model_loss {
            let version = self.best.as_ref().map_or(1, |b| b.version + 1);
            debug!(
                previous = self.best_model_loss,
                mean_loss,
                version,
                "New best reward model"
            );
            self.best_model_loss = mean_loss;
            self.best = Some(BestModelSnapshot {
                model: trainer.reward_net().clone(),
                loss: mean_loss,
                version,
            });
        }

        Ok(report)
    }

    #[must_use]
    pub fn best_model(&self) -> Option<&N> {
        self.best.as_ref().map(|b| &b.model)
    }

    #[must_use]
    pub fn best_model_loss(&self) -> f64 {
        self.best_model_loss
    }

    /// Version of the current best snapshot, 0 if there is none.
    #[must_use]
    pub fn snapshot_version(&self) -> u64 {
        self.best.as_ref().map_or(0, |b| b.version)
    }

    /// Batches recorded since the last aggregation.
    #[must_use]
    pub fn pending_batches(&self) -> usize {
        self.loss.len()
    }

    #[must_use]
    pub fn into_best_model(self) -> Option<N> {
        self.best.map(|b| b.model)
    }
}

type Scored = (Array1<f32>, Array1<f32>, Array1<f32>);

fn score_batch<T: RewardNetTrainer>(
    trainer: &T,
    batch: &EvaluationBatch,
) -> EvaluationResult<Scored> {
    let reward = batch.reward_signal().ok_or(EvaluationError::MissingSignal {
        batch_kind: batch.kind(),
    })?;
    let pred_reward = trainer.reward_net().predict(batch)?;
    if pred_reward.len() != reward.len() {
        return Err(EvaluationError::ShapeMismatch {
            predicted: pred_reward.len(),
            expected: reward.len(),
        });
    }
    let loss = trainer.loss(&pred_reward, reward)?;
    Ok((flatten(&loss), flatten(reward), pred_reward))
}

fn flatten(values: &Array1<f32>) -> Array1<f32> {
    values.iter().copied().collect()
}

fn concat(parts: &[Array1<f32>]) -> Array1<f32> {
    parts.iter().flat_map(|p| p.iter().copied()).collect()
}
