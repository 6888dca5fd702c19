use rlflow_abstraction::ModelError;
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(
        "setup_data and normalization_data_map are mutually exclusive \
         (setup_data present: {setup_data}, normalization_data_map present: {normalization_data})"
    )]
    MutualExclusivity {
        setup_data: bool,
        normalization_data: bool,
    },

    #[error("{field} was already set to {existing}")]
    InvariantViolation {
        field: &'static str,
        existing: String,
    },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("trainer error: {0}")]
    Trainer(String),

    #[error("publisher error: {0}")]
    Publisher(String),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EvaluationResult<T> = std::result::Result<T, EvaluationError>;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("{batch_kind} batch has no reward signal to evaluate against")]
    MissingSignal { batch_kind: &'static str },

    #[error("no evaluation batches were recorded since the last aggregation")]
    EmptyAccumulator,

    #[error("predicted {predicted} rewards for {expected} observed rewards")]
    ShapeMismatch { predicted: usize, expected: usize },

    #[error(transparent)]
    Model(#[from] ModelError),
}
