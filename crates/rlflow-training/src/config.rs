//! Pipeline configuration file support.
//!
//! A pipeline is described by one TOML file; see `PipelineConfig` for the sections.

use crate::error::{TrainingError, TrainingResult};
use crate::options::{ReaderOptions, RecurringPeriod, ResourceOptions, RewardOptions};
use crate::publishers::{FileSystemPublisher, ModelPublisher, NoPublishingPublisher};
use crate::table::TableSpec;
use crate::validators::{EvalLossThresholdValidator, ModelValidator, NoOpValidator};
use rlflow_abstraction::LossType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub table: TableSpec,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub reward: RewardOptions,

    #[serde(default)]
    pub reader: ReaderOptions,

    #[serde(default)]
    pub resources: ResourceOptions,

    #[serde(default)]
    pub validator: Option<ValidatorConfig>,

    #[serde(default)]
    pub publisher: Option<PublisherConfig>,

    #[serde(default)]
    pub recurring_period: Option<RecurringPeriod>,

    /// Where runs write datasets, checkpoints and outputs.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("rlflow_runs")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_num_epochs")]
    pub num_epochs: u32,
    /// Unset means auto-detect.
    #[serde(default)]
    pub use_gpu: Option<bool>,
    #[serde(default)]
    pub warmstart_path: Option<PathBuf>,
}

fn default_num_epochs() -> u32 {
    1
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_epochs: default_num_epochs(),
            use_gpu: None,
            warmstart_path: None,
        }
    }
}

/// Settings of the linear reward model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub loss: LossType,
    /// Hold out an eval partition of the table and evaluate every epoch.
    pub calc_cpe_in_training: bool,
    /// Let the model prepare its own setup data instead of running feature identification.
    pub use_data_module: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            batch_size: 32,
            loss: LossType::Mse,
            calc_cpe_in_training: true,
            use_data_module: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidatorConfig {
    Noop,
    Threshold { max_eval_loss: f64 },
}

impl ValidatorConfig {
    #[must_use]
    pub fn build(&self) -> Arc<dyn ModelValidator> {
        match self {
            Self::Noop => Arc::new(NoOpValidator),
            Self::Threshold { max_eval_loss } => Arc::new(EvalLossThresholdValidator {
                max_eval_loss: *max_eval_loss,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublisherConfig {
    None,
    FileSystem { root: PathBuf },
}

impl PublisherConfig {
    #[must_use]
    pub fn build(&self) -> Arc<dyn ModelPublisher> {
        match self {
            Self::None => Arc::new(NoPublishingPublisher),
            Self::FileSystem { root } => Arc::new(FileSystemPublisher::new(root.clone())),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a pipeline configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> TrainingResult<Self> {
        if !path.exists() {
            return Err(TrainingError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TrainingResult<()> {
        let invalid = |msg: &str| Err(TrainingError::Configuration(msg.to_string()));

        self.table.validate()?;
        if self.training.num_epochs == 0 {
            return invalid("training.num_epochs must be >= 1");
        }
        if !self.model.learning_rate.is_finite() || self.model.learning_rate <= 0.0 {
            return invalid("model.learning_rate must be > 0");
        }
        if self.model.batch_size == 0 {
            return invalid("model.batch_size must be >= 1");
        }
        if self.reader.minibatch_size == 0 {
            return invalid("reader.minibatch_size must be >= 1");
        }
        if let Some(ValidatorConfig::Threshold { max_eval_loss }) = &self.validator
            && !max_eval_loss.is_finite()
        {
            return invalid("validator.max_eval_loss must be finite");
        }
        Ok(())
    }
}
