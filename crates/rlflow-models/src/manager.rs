//! Model manager for the linear reward model.

use crate::batch::LabeledRows;
use crate::data_module::{JsonlDataModule, PreparedData};
use crate::linear::{Activation, LinearRewardNet};
use crate::trainer::LinearRewardTrainer;
use async_trait::async_trait;
use rlflow_abstraction::{LossType, ModelError, RewardNetTrainer};
use rlflow_training::{
    ArtifactKind, DataModule, Dataset, ModelConfig, ModelManager, NormalizationDataMap,
    ReaderOptions, ResolvedData, RewardNetEvaluator, RewardOptions, STATE_FEATURES, SampleRange,
    SetupData, TableSpec, TrainWorkflowRequest, TrainingError, TrainingLayout, TrainingMetrics,
    TrainingOutput, TrainingResult, identify_normalization_parameters, make_artifact,
    query_jsonl_table, read_dataset, read_jsonl_table, table_digest, table_path,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const MODEL_TYPE: &str = "linear_reward";
pub const REWARD_NET_MODULE: &str = "reward_net";

pub struct RewardModelManager {
    layout: TrainingLayout,
    config: ModelConfig,
}

impl RewardModelManager {
    #[must_use]
    pub fn new(layout: TrainingLayout, config: ModelConfig) -> Self {
        Self { layout, config }
    }

    #[must_use]
    pub fn layout(&self) -> &TrainingLayout {
        &self.layout
    }

    fn activation(&self) -> Activation {
        match self.config.loss {
            LossType::Bce => Activation::Sigmoid,
            LossType::Mse | LossType::Mae => Activation::Identity,
        }
    }

    fn initial_net(
        &self,
        num_features: usize,
        request: &TrainWorkflowRequest,
    ) -> TrainingResult<LinearRewardNet> {
        let Some(path) = &request.warmstart_path else {
            return Ok(LinearRewardNet::zeros(num_features, self.activation()));
        };

        let net = LinearRewardNet::load(path).map_err(model_error)?;
        if net.num_features() != num_features {
            return Err(TrainingError::Trainer(format!(
                "warmstart checkpoint {} has {} features, data has {num_features}",
                path.display(),
                net.num_features()
            )));
        }
        info!(path = %path.display(), "Warm-starting reward net");
        Ok(net)
    }
}

fn model_error(e: ModelError) -> TrainingError {
    TrainingError::Trainer(e.to_string())
}

/// Normalization and datasets of a request, whichever data path it took.
fn training_inputs(request: &TrainWorkflowRequest) -> TrainingResult<PreparedData> {
    match &request.data {
        ResolvedData::SetupData(setup) => PreparedData::from_setup_data(setup),
        ResolvedData::NormalizationData(map) => {
            let train_dataset = request.train_dataset.clone().ok_or_else(|| {
                TrainingError::Dataset("no train dataset was queried".to_string())
            })?;
            Ok(PreparedData {
                normalization: map.clone(),
                train_dataset,
                eval_dataset: request.eval_dataset.clone(),
            })
        }
    }
}

#[async_trait]
impl ModelManager for RewardModelManager {
    fn model_type(&self) -> &str {
        MODEL_TYPE
    }

    fn serving_module_names(&self) -> Vec<String> {
        vec![REWARD_NET_MODULE.to_string()]
    }

    fn should_generate_eval_dataset(&self) -> bool {
        self.config.calc_cpe_in_training
    }

    fn get_data_module(
        &self,
        table: &TableSpec,
        _reward_options: &RewardOptions,
        _reader_options: &ReaderOptions,
        saved_setup_data: Option<&SetupData>,
    ) -> Option<Box<dyn DataModule>> {
        if !self.config.use_data_module {
            return None;
        }
        let module = JsonlDataModule::new(
            table.clone(),
            self.layout.clone(),
            self.config.calc_cpe_in_training,
        )
        .with_saved(saved_setup_data.cloned());
        Some(Box::new(module))
    }

    async fn run_feature_identification(
        &self,
        table: &TableSpec,
    ) -> TrainingResult<NormalizationDataMap> {
        let rows = read_jsonl_table(&table_path(table)?)?;
        let map = identify_normalization_parameters(&rows)?;
        info!(
            table = %table.table_name,
            rows = rows.len(),
            features = map.get(STATE_FEATURES).map_or(0, |d| d.feature_params.len()),
            "Identified features"
        );
        Ok(map)
    }

    async fn query_data(
        &self,
        table: &TableSpec,
        sample_range: SampleRange,
        _reward_options: &RewardOptions,
        _reader_options: &ReaderOptions,
    ) -> TrainingResult<Dataset> {
        let digest = table_digest(table)?;
        let out_path = self
            .layout
            .query_output_path(&table.table_name, &digest, sample_range);
        let dataset = query_jsonl_table(table, sample_range, &out_path)?;
        debug!(
            range = %sample_range,
            rows = ?dataset.row_count,
            uri = %dataset.uri,
            "Queried dataset"
        );
        Ok(dataset)
    }

    async fn train_workflow(
        &self,
        request: TrainWorkflowRequest,
    ) -> TrainingResult<TrainingOutput> {
        if request.use_gpu {
            warn!("Linear reward model trains on CPU; ignoring use_gpu");
        }
        let inputs = training_inputs(&request)?;
        let normalization = inputs
            .normalization
            .get(STATE_FEATURES)
            .cloned()
            .unwrap_or_default();

        let train_rows =
            LabeledRows::from_rows(&read_dataset(&inputs.train_dataset)?, &normalization);
        if train_rows.is_empty() {
            let uri = &inputs.train_dataset.uri;
            return Err(TrainingError::Dataset(format!(
                "train dataset {uri} has no labeled rows"
            )));
        }
        let eval_rows = match &inputs.eval_dataset {
            Some(dataset) => Some(LabeledRows::from_rows(&read_dataset(dataset)?, &normalization)),
            None => None,
        }
        .filter(|rows| !rows.is_empty());
        if inputs.eval_dataset.is_some() && eval_rows.is_none() {
            warn!("Eval dataset has no labeled rows; keeping the last epoch's model");
        }

        let net = self.initial_net(normalization.feature_params.len(), &request)?;
        let mut trainer =
            LinearRewardTrainer::new(net, self.config.loss, self.config.learning_rate);
        let mut evaluator = RewardNetEvaluator::new();
        let mut train_loss = None;

        for epoch in 1..=request.num_epochs {
            let mut losses = Vec::new();
            for batch in train_rows.batches(self.config.batch_size) {
                losses.push(f64::from(trainer.train_step(&batch).map_err(model_error)?));
            }
            let epoch_loss = losses.iter().sum::<f64>() / losses.len() as f64;
            train_loss = Some(epoch_loss);

            if let Some(eval_rows) = &eval_rows {
                for batch in eval_rows.batches(request.reader_options.minibatch_size) {
                    evaluator.evaluate(&mut trainer, &batch)?;
                }
                let report = evaluator.evaluate_post_training(&trainer)?;
                info!(
                    epoch,
                    train_loss = epoch_loss,
                    eval_loss = report.mean_loss,
                    "Epoch finished"
                );
            } else {
                info!(epoch, train_loss = epoch_loss, "Epoch finished");
            }
        }

        let eval_loss = (evaluator.snapshot_version() > 0).then(|| evaluator.best_model_loss());
        let final_net = evaluator
            .into_best_model()
            .unwrap_or_else(|| trainer.reward_net().clone());

        self.layout.ensure_workflow_dirs(&request.workflow_id)?;
        let checkpoints = self.layout.checkpoints_dir(&request.workflow_id);
        let checkpoint_path = checkpoints.join(format!("{REWARD_NET_MODULE}.json"));
        final_net.save(&checkpoint_path).map_err(model_error)?;

        let normalization_path = checkpoints.join("normalization.json");
        std::fs::write(
            &normalization_path,
            serde_json::to_vec_pretty(&inputs.normalization)?,
        )?;

        let mut artifacts = vec![
            make_artifact(ArtifactKind::Checkpoint, checkpoint_path.clone())?,
            make_artifact(ArtifactKind::NormalizationData, normalization_path)?,
        ];
        let datasets = std::iter::once(&inputs.train_dataset).chain(inputs.eval_dataset.as_ref());
        for dataset in datasets {
            artifacts.push(make_artifact(ArtifactKind::Dataset, dataset.uri.clone().into())?);
        }

        let output = TrainingOutput {
            output_paths: BTreeMap::from([(REWARD_NET_MODULE.to_string(), checkpoint_path)]),
            metrics: TrainingMetrics {
                train_loss,
                eval_loss,
                epochs: Some(request.num_epochs),
            },
            artifacts,
            validation_result: None,
            publishing_result: None,
        };
        std::fs::write(
            self.layout.training_output_path(&request.workflow_id),
            serde_json::to_vec_pretty(&output)?,
        )?;

        Ok(output)
    }
}
