//! A data module that prepares normalization and datasets from a local JSONL table.

use async_trait::async_trait;
use rlflow_training::{
    DataModule, Dataset, NormalizationDataMap, SetupData, TableSpec, TrainingError, TrainingLayout,
    TrainingResult, identify_normalization_parameters, query_jsonl_table, read_jsonl_table,
    table_digest, table_path,
};
use tracing::{info, warn};

pub const NORMALIZATION_KEY: &str = "normalization";
pub const TRAIN_DATASET_KEY: &str = "train_dataset";
pub const EVAL_DATASET_KEY: &str = "eval_dataset";

/// Decoded contents of the setup data this crate produces.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedData {
    pub normalization: NormalizationDataMap,
    pub train_dataset: Dataset,
    pub eval_dataset: Option<Dataset>,
}

impl PreparedData {
    pub fn to_setup_data(&self) -> TrainingResult<SetupData> {
        let mut setup = SetupData::new();
        setup.insert(
            NORMALIZATION_KEY.to_string(),
            serde_json::to_vec(&self.normalization)?,
        );
        setup.insert(
            TRAIN_DATASET_KEY.to_string(),
            serde_json::to_vec(&self.train_dataset)?,
        );
        if let Some(eval) = &self.eval_dataset {
            setup.insert(EVAL_DATASET_KEY.to_string(), serde_json::to_vec(eval)?);
        }
        Ok(setup)
    }

    pub fn from_setup_data(setup: &SetupData) -> TrainingResult<Self> {
        let required = |key: &str| {
            setup
                .get(key)
                .ok_or_else(|| TrainingError::Dataset(format!("setup data is missing {key}")))
        };
        Ok(Self {
            normalization: serde_json::from_slice(required(NORMALIZATION_KEY)?)?,
            train_dataset: serde_json::from_slice(required(TRAIN_DATASET_KEY)?)?,
            eval_dataset: setup
                .get(EVAL_DATASET_KEY)
                .map(|bytes| serde_json::from_slice(bytes))
                .transpose()?,
        })
    }
}

pub struct JsonlDataModule {
    table: TableSpec,
    layout: TrainingLayout,
    calc_cpe_in_training: bool,
    saved: Option<SetupData>,
}

impl JsonlDataModule {
    #[must_use]
    pub fn new(table: TableSpec, layout: TrainingLayout, calc_cpe_in_training: bool) -> Self {
        Self {
            table,
            layout,
            calc_cpe_in_training,
            saved: None,
        }
    }

    /// Setup data from an earlier run, reused when it decodes.
    #[must_use]
    pub fn with_saved(mut self, saved: Option<SetupData>) -> Self {
        self.saved = saved;
        self
    }

    fn prepare(&self) -> TrainingResult<PreparedData> {
        let rows = read_jsonl_table(&table_path(&self.table)?)?;
        let normalization = identify_normalization_parameters(&rows)?;

        let digest = table_digest(&self.table)?;
        let ranges = self.table.sample_ranges(self.calc_cpe_in_training)?;
        let query = |range| {
            let out_path = self
                .layout
                .query_output_path(&self.table.table_name, &digest, range);
            query_jsonl_table(&self.table, range, &out_path)
        };
        let train_dataset = query(ranges.train_sample_range)?;
        let eval_dataset = if self.calc_cpe_in_training {
            Some(query(ranges.eval_sample_range)?)
        } else {
            None
        };

        Ok(PreparedData {
            normalization,
            train_dataset,
            eval_dataset,
        })
    }
}

#[async_trait]
impl DataModule for JsonlDataModule {
    async fn prepare_data(&self) -> TrainingResult<SetupData> {
        if let Some(saved) = &self.saved {
            match PreparedData::from_setup_data(saved) {
                Ok(_) => {
                    info!(table = %self.table.table_name, "Reusing saved setup data");
                    return Ok(saved.clone());
                }
                Err(e) => {
                    warn!(
                        table = %self.table.table_name,
                        error = %e,
                        "Saved setup data is unusable; preparing again"
                    );
                }
            }
        }

        let prepared = self.prepare()?;
        info!(
            table = %self.table.table_name,
            train_rows = ?prepared.train_dataset.row_count,
            eval_rows = ?prepared.eval_dataset.as_ref().and_then(|d| d.row_count),
            "Prepared setup data"
        );
        prepared.to_setup_data()
    }
}
