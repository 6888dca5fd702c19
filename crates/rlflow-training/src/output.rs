use crate::error::{TrainingError, TrainingResult};
use crate::identity::{EntityId, WorkflowId};
use crate::options::RecurringPeriod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Checkpoint,
    NormalizationData,
    Dataset,
    Metrics,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrainingMetrics {
    pub train_loss: Option<f64>,
    pub eval_loss: Option<f64>,
    pub epochs: Option<u32>,
}

/// Verdict of a model validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub should_publish: bool,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One serving module recorded by a publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedModel {
    pub module_name: String,
    pub entity_id: EntityId,
    pub workflow_id: WorkflowId,
    pub model_type: String,
    pub path: PathBuf,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub recurring_period: Option<RecurringPeriod>,
}

/// Outcome of a model publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishingResult {
    pub success: bool,
    pub publisher: String,
    #[serde(default)]
    pub published: Vec<PublishedModel>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of a pipeline run, built up stage by stage.
///
/// The validation and publishing stages each own one optional field. Setting a field that is
/// already set is an error: it means a stage ran twice on the same output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrainingOutput {
    /// Serving module name -> trained artifact path.
    #[serde(default)]
    pub output_paths: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub metrics: TrainingMetrics,
    #[serde(default)]
    pub artifacts: Vec<TrainingArtifact>,
    #[serde(default)]
    pub validation_result: Option<ValidationResult>,
    #[serde(default)]
    pub publishing_result: Option<PublishingResult>,
}

impl TrainingOutput {
    pub fn ensure_validation_unset(&self) -> TrainingResult<()> {
        match &self.validation_result {
            Some(existing) => Err(TrainingError::InvariantViolation {
                field: "validation_result",
                existing: format!("{existing:?}"),
            }),
            None => Ok(()),
        }
    }

    pub fn ensure_publishing_unset(&self) -> TrainingResult<()> {
        match &self.publishing_result {
            Some(existing) => Err(TrainingError::InvariantViolation {
                field: "publishing_result",
                existing: format!("{existing:?}"),
            }),
            None => Ok(()),
        }
    }

    pub fn with_validation_result(self, result: ValidationResult) -> TrainingResult<Self> {
        self.ensure_validation_unset()?;
        Ok(Self {
            validation_result: Some(result),
            ..self
        })
    }

    pub fn with_publishing_result(self, result: PublishingResult) -> TrainingResult<Self> {
        self.ensure_publishing_unset()?;
        Ok(Self {
            publishing_result: Some(result),
            ..self
        })
    }
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn make_artifact(kind: ArtifactKind, path: PathBuf) -> TrainingResult<TrainingArtifact> {
    if !path.exists() {
        return Err(TrainingError::Artifact(format!(
            "artifact path does not exist: {}",
            path.display()
        )));
    }

    let hash = sha256_file(&path)?;
    Ok(TrainingArtifact {
        kind,
        path,
        sha256: hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn validation(should_publish: bool) -> ValidationResult {
        ValidationResult {
            should_publish,
            metrics: BTreeMap::new(),
            message: None,
        }
    }

    #[test]
    fn test_validation_result_set_once() {
        let output = TrainingOutput::default().with_validation_result(validation(true)).unwrap();
        assert!(output.validation_result.is_some());

        let err = output.with_validation_result(validation(false)).unwrap_err();
        assert!(matches!(
            err,
            TrainingError::InvariantViolation {
                field: "validation_result",
                ..
            }
        ));
    }

    #[test]
    fn test_publishing_result_set_once() {
        let result = PublishingResult {
            success: true,
            publisher: "test".to_string(),
            published: vec![],
            message: None,
        };
        let output = TrainingOutput::default().with_publishing_result(result.clone()).unwrap();
        let err = output.with_publishing_result(result).unwrap_err();
        assert!(matches!(
            err,
            TrainingError::InvariantViolation {
                field: "publishing_result",
                ..
            }
        ));
    }

    #[test]
    fn test_functional_update_keeps_other_fields() {
        let mut output = TrainingOutput::default();
        output
            .output_paths
            .insert("reward_net".to_string(), PathBuf::from("/tmp/ckpt.json"));
        output.metrics.eval_loss = Some(0.25);

        let updated = output.clone().with_validation_result(validation(true)).unwrap();
        assert_eq!(updated.output_paths, output.output_paths);
        assert_eq!(updated.metrics, output.metrics);
        assert!(updated.publishing_result.is_none());
    }

    #[test]
    fn test_make_artifact_hashes_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ckpt.json");
        std::fs::write(&path, b"{}").unwrap();

        let artifact = make_artifact(ArtifactKind::Checkpoint, path).unwrap();
        assert_eq!(artifact.sha256.len(), 64);
        assert!(make_artifact(ArtifactKind::Checkpoint, temp.path().join("missing")).is_err());
    }
}
