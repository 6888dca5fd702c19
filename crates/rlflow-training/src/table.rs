use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifies an input table and how much of it to sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub table_name: String,
    /// Local file backing the table, for file-based query backends.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Percentage of the table used for training.
    #[serde(default)]
    pub table_sample: Option<f64>,
    /// Percentage of the table held out for evaluation.
    #[serde(default)]
    pub eval_table_sample: Option<f64>,
}

impl TableSpec {
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            path: None,
            table_sample: None,
            eval_table_sample: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_samples(
        mut self,
        table_sample: Option<f64>,
        eval_table_sample: Option<f64>,
    ) -> Self {
        self.table_sample = table_sample;
        self.eval_table_sample = eval_table_sample;
        self
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(TrainingError::Configuration("table_name is required".to_string()));
        }
        check_percentage("table_sample", self.table_sample)?;
        check_percentage("eval_table_sample", self.eval_table_sample)?;
        Ok(())
    }
}

pub(crate) fn check_percentage(name: &str, value: Option<f64>) -> TrainingResult<()> {
    match value {
        Some(v) if !v.is_finite() || !(0.0..=100.0).contains(&v) => {
            Err(TrainingError::Configuration(format!(
                "{name} must be within [0, 100] (current={v})"
            )))
        }
        _ => Ok(()),
    }
}

/// A `[low, high]` percentage window over a table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRange {
    pub low: f64,
    pub high: f64,
}

impl SampleRange {
    pub const FULL: Self = Self::new(0.0, 100.0);
    pub const EMPTY: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Half-open membership test; a window ending at 100 also includes 100.
    #[must_use]
    pub fn contains(&self, percentage: f64) -> bool {
        percentage >= self.low
            && (percentage < self.high || (self.high >= 100.0 && percentage <= self.high))
    }

    /// Returns `true` if the two windows share more than a boundary point.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.low.max(other.low) < self.high.min(other.high)
    }
}

impl std::fmt::Display for SampleRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.low, self.high)
    }
}

/// The train and eval windows handed to the query backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainEvalSampleRanges {
    pub train_sample_range: SampleRange,
    pub eval_sample_range: SampleRange,
}

/// Handle to a dataset produced by a query. The orchestrator never looks inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub uri: String,
    pub sample_range: SampleRange,
    #[serde(default)]
    pub row_count: Option<u64>,
}
