use crate::error::TrainingResult;
use crate::identity::WorkflowId;
use crate::table::SampleRange;
use std::path::{Path, PathBuf};

/// Filesystem layout for the files one pipeline run produces.
///
/// Per-run files live under `<output_dir>/<workflow_id>/{checkpoints,training_output.json}`.
/// Query output is shared across runs and keyed on the source table's content digest.
#[derive(Debug, Clone)]
pub struct TrainingLayout {
    root: PathBuf,
}

impl TrainingLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Query results for the table whose contents hash to `table_digest`.
    #[must_use]
    pub fn query_output_path(
        &self,
        table_name: &str,
        table_digest: &str,
        range: SampleRange,
    ) -> PathBuf {
        let short = table_digest.get(..12).unwrap_or(table_digest);
        self.root
            .join("datasets")
            .join(format!("{table_name}_{short}_{}-{}.jsonl", range.low, range.high))
    }

    #[must_use]
    pub fn workflow_dir(&self, workflow_id: &WorkflowId) -> PathBuf {
        self.root.join(workflow_id.0.as_str())
    }

    #[must_use]
    pub fn training_output_path(&self, workflow_id: &WorkflowId) -> PathBuf {
        self.workflow_dir(workflow_id).join("training_output.json")
    }

    #[must_use]
    pub fn checkpoints_dir(&self, workflow_id: &WorkflowId) -> PathBuf {
        self.workflow_dir(workflow_id).join("checkpoints")
    }

    pub fn ensure_workflow_dirs(&self, workflow_id: &WorkflowId) -> TrainingResult<()> {
        std::fs::create_dir_all(self.checkpoints_dir(workflow_id))?;
        Ok(())
    }
}
