//! RLFlow Training
//!
//! Orchestration primitives for offline reward-model training:
//! - Splitting a table into train/eval sample ranges (`compute_sample_ranges`)
//! - Resolving setup data vs. normalization data (`DataSetupResolver`)
//! - Running a pipeline end to end (`TrainingOrchestrator`)
//! - Accumulating eval batches and tracking the best model (`RewardNetEvaluator`)
//! - Validating and publishing trained models (`ModelValidator`, `ModelPublisher`)

pub mod config;
pub mod data_setup;
pub mod error;
pub mod evaluation;
pub mod identity;
pub mod jsonl;
pub mod layout;
pub mod manager;
pub mod normalization;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod publishers;
pub mod registry;
pub mod sample_range;
pub mod table;
pub mod validators;

pub use config::{ModelConfig, PipelineConfig, PublisherConfig, TrainingConfig, ValidatorConfig};
pub use data_setup::{
    DataInputs, DataSetupResolver, ResolvedData, SavedSetupData, SavedSetupValue, SetupData,
    unwrap_saved_setup_data,
};
pub use error::{EvaluationError, EvaluationResult, TrainingError, TrainingResult};
pub use evaluation::{BestModelSnapshot, EvaluationReport, INITIAL_BEST_LOSS, RewardNetEvaluator};
pub use identity::{EntityId, IdAllocator, NamedModelIds, UuidIdAllocator, WorkflowId};
pub use jsonl::{
    TableRow, mdp_sample_bucket, query_jsonl_table, read_dataset, read_jsonl_table, table_digest,
    table_path, write_jsonl_table,
};
pub use layout::TrainingLayout;
pub use manager::{DataModule, ModelManager, TrainWorkflowRequest};
pub use normalization::{
    FeatureType, NormalizationData, NormalizationDataMap, NormalizationParameters, STATE_FEATURES,
    identify_normalization_parameters,
};
pub use options::{
    ReaderOptions, RecurringPeriod, ResourceOptions, RewardOptions, TrainingDevice, detect_gpu,
};
pub use output::{
    ArtifactKind, PublishedModel, PublishingResult, TrainingArtifact, TrainingMetrics,
    TrainingOutput, ValidationResult, make_artifact, sha256_file,
};
pub use pipeline::{
    IdentifyAndTrainOptions, PipelineStage, QueryAndTrainOptions, TrainingOrchestrator,
    run_publisher, run_validator,
};
pub use progress::{NoopProgressSink, ProgressEvent, ProgressSink, StdoutProgressSink};
pub use publishers::{FileSystemPublisher, ModelPublisher, NoPublishingPublisher};
pub use registry::PublishedModelRegistry;
pub use sample_range::{SAMPLE_RANGE_TOLERANCE, compute_sample_ranges};
pub use table::{Dataset, SampleRange, TableSpec, TrainEvalSampleRanges};
pub use validators::{EvalLossThresholdValidator, ModelValidator, NoOpValidator};
