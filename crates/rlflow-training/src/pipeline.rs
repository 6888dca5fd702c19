//! End-to-end training pipeline.
//!
//! A run moves strictly forward through `Init -> ResolveData -> (QueryTrain -> [QueryEval])
//! -> Train -> [Validate] -> [Publish] -> Done`.
//! Dataset queries only happen when training from a normalization map; a data module queries
//! its own data. The first failing stage aborts the run and nothing is retried here.

use crate::data_setup::{DataInputs, DataSetupResolver};
use crate::error::{TrainingError, TrainingResult};
use crate::identity::{IdAllocator, NamedModelIds, UuidIdAllocator, WorkflowId};
use crate::manager::{ModelManager, TrainWorkflowRequest};
use crate::options::{
    ReaderOptions, RecurringPeriod, ResourceOptions, RewardOptions, detect_gpu,
};
use crate::output::TrainingOutput;
use crate::progress::{NoopProgressSink, ProgressEvent, ProgressSink};
use crate::publishers::ModelPublisher;
use crate::table::TableSpec;
use crate::validators::ModelValidator;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Init,
    ResolveData,
    QueryTrain,
    QueryEval,
    Train,
    Validate,
    Publish,
    Done,
}

impl PipelineStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ResolveData => "resolve_data",
            Self::QueryTrain => "query_train",
            Self::QueryEval => "query_eval",
            Self::Train => "train",
            Self::Validate => "validate",
            Self::Publish => "publish",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional inputs of `identify_and_train_network`.
#[derive(Clone, Default)]
pub struct IdentifyAndTrainOptions {
    /// Defaults to `detect_gpu()`.
    pub use_gpu: Option<bool>,
    pub reward_options: Option<RewardOptions>,
    pub reader_options: Option<ReaderOptions>,
    pub resource_options: Option<ResourceOptions>,
    pub warmstart_path: Option<PathBuf>,
    pub validator: Option<Arc<dyn ModelValidator>>,
    pub publisher: Option<Arc<dyn ModelPublisher>>,
}

/// Optional inputs of `query_and_train`.
#[derive(Clone, Default)]
pub struct QueryAndTrainOptions {
    pub data: DataInputs,
    pub reward_options: Option<RewardOptions>,
    pub reader_options: Option<ReaderOptions>,
    pub resource_options: Option<ResourceOptions>,
    pub warmstart_path: Option<PathBuf>,
    pub validator: Option<Arc<dyn ModelValidator>>,
    pub publisher: Option<Arc<dyn ModelPublisher>>,
    /// Pre-allocated entity ids; minted per serving module when absent.
    pub named_model_ids: Option<NamedModelIds>,
    pub recurring_period: Option<RecurringPeriod>,
}

pub struct TrainingOrchestrator {
    ids: Arc<dyn IdAllocator>,
    progress: Arc<dyn ProgressSink>,
}

impl Default for TrainingOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingOrchestrator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: Arc::new(UuidIdAllocator),
            progress: Arc::new(NoopProgressSink),
        }
    }

    #[must_use]
    pub fn with_id_allocator(mut self, ids: Arc<dyn IdAllocator>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn with_progress_sink(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Prepares data from scratch, then runs `query_and_train`.
    pub async fn identify_and_train_network(
        &self,
        table: &TableSpec,
        manager: &dyn ModelManager,
        num_epochs: u32,
        options: IdentifyAndTrainOptions,
    ) -> TrainingResult<TrainingOutput> {
        let use_gpu = options.use_gpu.unwrap_or_else(detect_gpu);
        let reward_options = options.reward_options.unwrap_or_default();
        let reader_options = options.reader_options.unwrap_or_default();

        let resolved = DataSetupResolver::new(manager, table, &reward_options, &reader_options)
            .identify()
            .await?;

        self.query_and_train(
            table,
            manager,
            num_epochs,
            use_gpu,
            QueryAndTrainOptions {
                data: resolved.into(),
                reward_options: Some(reward_options),
                reader_options: Some(reader_options),
                resource_options: options.resource_options,
                warmstart_path: options.warmstart_path,
                validator: options.validator,
                publisher: options.publisher,
                named_model_ids: None,
                recurring_period: None,
            },
        )
        .await
    }

    /// Runs the pipeline from data resolution to publishing.
    pub async fn query_and_train(
        &self,
        table: &TableSpec,
        manager: &dyn ModelManager,
        num_epochs: u32,
        use_gpu: bool,
        options: QueryAndTrainOptions,
    ) -> TrainingResult<TrainingOutput> {
        let workflow_id = self.ids.workflow_id();
        let named_model_ids = match options.named_model_ids.clone() {
            Some(ids) => ids,
            None => self.ids.named_entity_ids(&manager.serving_module_names()),
        };

        let span = info_span!(
            "training_pipeline",
            workflow_id = %workflow_id,
            model_type = manager.model_type(),
            table = %table.table_name,
        );

        let run = PipelineRun {
            workflow_id,
            named_model_ids,
            progress: self.progress.as_ref(),
        };
        run.execute(table, manager, num_epochs, use_gpu, options)
            .instrument(span)
            .await
    }
}

/// State of one run, fixed at `Init`.
struct PipelineRun<'a> {
    workflow_id: WorkflowId,
    named_model_ids: NamedModelIds,
    progress: &'a dyn ProgressSink,
}

impl PipelineRun<'_> {
    async fn stage<T, F>(&self, stage: PipelineStage, work: F) -> TrainingResult<T>
    where
        F: Future<Output = TrainingResult<T>>,
    {
        self.progress.on_event(ProgressEvent::StageStarted {
            workflow_id: self.workflow_id.clone(),
            stage,
        });
        debug!(%stage, "Stage started");

        let out = work.await.inspect_err(|e| error!(%stage, error = %e, "Stage failed"))?;

        self.progress.on_event(ProgressEvent::StageFinished {
            workflow_id: self.workflow_id.clone(),
            stage,
        });
        Ok(out)
    }

    async fn execute(
        self,
        table: &TableSpec,
        manager: &dyn ModelManager,
        num_epochs: u32,
        use_gpu: bool,
        options: QueryAndTrainOptions,
    ) -> TrainingResult<TrainingOutput> {
        self.progress.on_event(ProgressEvent::Started {
            workflow_id: self.workflow_id.clone(),
        });
        info!(modules = ?self.named_model_ids.keys().collect::<Vec<_>>(), "Starting query");

        let reward_options = options.reward_options.unwrap_or_default();
        let reader_options = options.reader_options.unwrap_or_default();
        let resource_options = options.resource_options.unwrap_or_default();

        let resolver = DataSetupResolver::new(manager, table, &reward_options, &reader_options);
        let data = self
            .stage(PipelineStage::ResolveData, resolver.resolve(options.data))
            .await?;

        let mut train_dataset = None;
        let mut eval_dataset = None;
        if data.normalization_data_map().is_some() {
            let calc_cpe_in_training = manager.should_generate_eval_dataset();
            let query_train = async {
                let ranges = table.sample_ranges(calc_cpe_in_training)?;
                debug!(
                    train = %ranges.train_sample_range,
                    eval = %ranges.eval_sample_range,
                    calc_cpe_in_training,
                    "Sample ranges"
                );
                let dataset = manager
                    .query_data(
                        table,
                        ranges.train_sample_range,
                        &reward_options,
                        &reader_options,
                    )
                    .await?;
                Ok::<_, TrainingError>((ranges, dataset))
            };
            let (ranges, dataset) = self.stage(PipelineStage::QueryTrain, query_train).await?;
            train_dataset = Some(dataset);

            if calc_cpe_in_training {
                let query_eval = manager.query_data(
                    table,
                    ranges.eval_sample_range,
                    &reward_options,
                    &reader_options,
                );
                eval_dataset = Some(self.stage(PipelineStage::QueryEval, query_eval).await?);
            }
        }

        info!(num_epochs, use_gpu, "Starting training");
        let request = TrainWorkflowRequest {
            train_dataset,
            eval_dataset,
            data,
            num_epochs,
            use_gpu,
            named_model_ids: self.named_model_ids.clone(),
            workflow_id: self.workflow_id.clone(),
            reward_options,
            reader_options,
            resource_options,
            warmstart_path: options.warmstart_path,
        };
        let mut output = self
            .stage(PipelineStage::Train, manager.train_workflow(request))
            .await?;

        if let Some(validator) = &options.validator {
            output = self
                .stage(
                    PipelineStage::Validate,
                    run_validator(validator.as_ref(), output),
                )
                .await?;
        }

        if let Some(publisher) = &options.publisher {
            output = self
                .stage(
                    PipelineStage::Publish,
                    run_publisher(
                        publisher.as_ref(),
                        manager,
                        output,
                        &self.named_model_ids,
                        &self.workflow_id,
                        options.recurring_period.as_ref(),
                    ),
                )
                .await?;
        }

        info!(stage = %PipelineStage::Done, "Training pipeline finished");
        self.progress.on_event(ProgressEvent::Finished {
            workflow_id: self.workflow_id.clone(),
        });
        Ok(output)
    }
}

/// Validates `output` and records the verdict. Fails if a verdict is already recorded.
pub async fn run_validator(
    validator: &dyn ModelValidator,
    output: TrainingOutput,
) -> TrainingResult<TrainingOutput> {
    output.ensure_validation_unset()?;
    let result = validator.validate(&output).await?;
    info!(
        validator = validator.name(),
        should_publish = result.should_publish,
        "Validation finished"
    );
    output.with_validation_result(result)
}

/// Publishes `output` and records the outcome. Fails if an outcome is already recorded.
pub async fn run_publisher(
    publisher: &dyn ModelPublisher,
    manager: &dyn ModelManager,
    output: TrainingOutput,
    named_model_ids: &NamedModelIds,
    workflow_id: &WorkflowId,
    recurring_period: Option<&RecurringPeriod>,
) -> TrainingResult<TrainingOutput> {
    output.ensure_publishing_unset()?;
    let result = publisher
        .publish(manager, &output, named_model_ids, workflow_id, recurring_period)
        .await?;
    info!(
        publisher = publisher.name(),
        success = result.success,
        "Publishing finished"
    );
    output.with_publishing_result(result)
}
