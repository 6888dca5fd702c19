use crate::data_setup::{ResolvedData, SetupData};
use crate::error::TrainingResult;
use crate::identity::{NamedModelIds, WorkflowId};
use crate::normalization::NormalizationDataMap;
use crate::options::{ReaderOptions, ResourceOptions, RewardOptions};
use crate::output::TrainingOutput;
use crate::table::{Dataset, SampleRange, TableSpec};
use async_trait::async_trait;
use std::path::PathBuf;

/// Prepares everything a model needs to start training, querying data itself.
#[async_trait]
pub trait DataModule: Send + Sync {
    async fn prepare_data(&self) -> TrainingResult<SetupData>;
}

/// Everything `ModelManager::train_workflow` receives.
#[derive(Debug, Clone)]
pub struct TrainWorkflowRequest {
    pub train_dataset: Option<Dataset>,
    pub eval_dataset: Option<Dataset>,
    pub data: ResolvedData,
    pub num_epochs: u32,
    pub use_gpu: bool,
    pub named_model_ids: NamedModelIds,
    pub workflow_id: WorkflowId,
    pub reward_options: RewardOptions,
    pub reader_options: ReaderOptions,
    pub resource_options: ResourceOptions,
    pub warmstart_path: Option<PathBuf>,
}

/// A model family: knows how to get its data and how to train.
#[async_trait]
pub trait ModelManager: Send + Sync {
    /// Identifier of the model family, recorded by publishers.
    fn model_type(&self) -> &str;

    /// Names of the modules this model serves; one entity id is minted per name.
    fn serving_module_names(&self) -> Vec<String>;

    /// Whether training needs a held-out eval partition of the input table.
    fn should_generate_eval_dataset(&self) -> bool;

    /// Returns a data module if this model prepares its own data.
    fn get_data_module(
        &self,
        table: &TableSpec,
        reward_options: &RewardOptions,
        reader_options: &ReaderOptions,
        saved_setup_data: Option<&SetupData>,
    ) -> Option<Box<dyn DataModule>>;

    async fn run_feature_identification(
        &self,
        table: &TableSpec,
    ) -> TrainingResult<NormalizationDataMap>;

    async fn query_data(
        &self,
        table: &TableSpec,
        sample_range: SampleRange,
        reward_options: &RewardOptions,
        reader_options: &ReaderOptions,
    ) -> TrainingResult<Dataset>;

    async fn train_workflow(&self, request: TrainWorkflowRequest) -> TrainingResult<TrainingOutput>;
}
