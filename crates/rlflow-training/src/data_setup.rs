//! Resolution of the input data for one training run.
//!
//! A run trains either from setup data prepared by the model's own data module, or from a
//! normalization map produced by feature identification. Never both, never neither.

use crate::error::{TrainingError, TrainingResult};
use crate::manager::{DataModule, ModelManager};
use crate::normalization::NormalizationDataMap;
use crate::options::{ReaderOptions, RewardOptions};
use crate::table::TableSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Opaque payload produced by a data module.
pub type SetupData = BTreeMap<String, Vec<u8>>;

/// A saved setup-data value: raw bytes, or bytes packed into a blob carrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SavedSetupValue {
    Bytes(Vec<u8>),
    Blob { data: Vec<u8> },
}

impl SavedSetupValue {
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) | Self::Blob { data: bytes } => bytes,
        }
    }
}

impl From<Vec<u8>> for SavedSetupValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

pub type SavedSetupData = BTreeMap<String, SavedSetupValue>;

/// Normalizes saved setup data to raw bytes.
#[must_use]
pub fn unwrap_saved_setup_data(saved: SavedSetupData) -> SetupData {
    saved.into_iter().map(|(k, v)| (k, v.into_bytes())).collect()
}

/// The single data path a run trains from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedData {
    SetupData(SetupData),
    NormalizationData(NormalizationDataMap),
}

impl ResolvedData {
    /// Builds the resolved data from the two optional inputs, enforcing exclusivity.
    pub fn from_parts(
        setup_data: Option<SetupData>,
        normalization_data_map: Option<NormalizationDataMap>,
    ) -> TrainingResult<Self> {
        match (setup_data, normalization_data_map) {
            (Some(setup), None) => Ok(Self::SetupData(setup)),
            (None, Some(map)) => Ok(Self::NormalizationData(map)),
            (setup, map) => Err(TrainingError::MutualExclusivity {
                setup_data: setup.is_some(),
                normalization_data: map.is_some(),
            }),
        }
    }

    #[must_use]
    pub fn setup_data(&self) -> Option<&SetupData> {
        match self {
            Self::SetupData(data) => Some(data),
            Self::NormalizationData(_) => None,
        }
    }

    #[must_use]
    pub fn normalization_data_map(&self) -> Option<&NormalizationDataMap> {
        match self {
            Self::NormalizationData(map) => Some(map),
            Self::SetupData(_) => None,
        }
    }
}

/// Data a caller may already hold when starting a run.
#[derive(Debug, Clone, Default)]
pub struct DataInputs {
    pub setup_data: Option<SetupData>,
    pub saved_setup_data: Option<SavedSetupData>,
    pub normalization_data_map: Option<NormalizationDataMap>,
}

impl From<ResolvedData> for DataInputs {
    fn from(data: ResolvedData) -> Self {
        match data {
            ResolvedData::SetupData(setup) => Self {
                setup_data: Some(setup),
                ..Default::default()
            },
            ResolvedData::NormalizationData(map) => Self {
                normalization_data_map: Some(map),
                ..Default::default()
            },
        }
    }
}

pub struct DataSetupResolver<'a> {
    manager: &'a dyn ModelManager,
    table: &'a TableSpec,
    reward_options: &'a RewardOptions,
    reader_options: &'a ReaderOptions,
}

impl<'a> DataSetupResolver<'a> {
    #[must_use]
    pub fn new(
        manager: &'a dyn ModelManager,
        table: &'a TableSpec,
        reward_options: &'a RewardOptions,
        reader_options: &'a ReaderOptions,
    ) -> Self {
        Self {
            manager,
            table,
            reward_options,
            reader_options,
        }
    }

    fn data_module(&self, saved: Option<&SetupData>) -> Option<Box<dyn DataModule>> {
        self.manager
            .get_data_module(self.table, self.reward_options, self.reader_options, saved)
    }

    /// Prepares data from scratch: the data module when the model has one, feature
    /// identification otherwise.
    pub async fn identify(&self) -> TrainingResult<ResolvedData> {
        if let Some(module) = self.data_module(None) {
            info!(table = %self.table.table_name, "Preparing setup data");
            return ResolvedData::from_parts(Some(module.prepare_data().await?), None);
        }

        info!(table = %self.table.table_name, "Running feature identification");
        let map = self.manager.run_feature_identification(self.table).await?;
        ResolvedData::from_parts(None, Some(map))
    }

    /// Resolves caller-supplied inputs. A data module, when present and no setup data was
    /// supplied, produces setup data and the supplied normalization map is discarded.
    pub async fn resolve(&self, inputs: DataInputs) -> TrainingResult<ResolvedData> {
        let DataInputs {
            mut setup_data,
            saved_setup_data,
            mut normalization_data_map,
        } = inputs;
        let saved = saved_setup_data.map(unwrap_saved_setup_data);

        if setup_data.is_none()
            && let Some(module) = self.data_module(saved.as_ref())
        {
            info!(table = %self.table.table_name, "Preparing setup data");
            setup_data = Some(module.prepare_data().await?);
            if normalization_data_map.take().is_some() {
                debug!("Discarding normalization data map in favour of setup data");
            }
        }

        ResolvedData::from_parts(setup_data, normalization_data_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::TrainWorkflowRequest;
    use crate::normalization::NormalizationData;
    use crate::output::TrainingOutput;
    use crate::table::{Dataset, SampleRange};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct EchoModule {
        saved: Option<SetupData>,
    }

    #[async_trait]
    impl DataModule for EchoModule {
        async fn prepare_data(&self) -> TrainingResult<SetupData> {
            let mut data = SetupData::new();
            data.insert("prepared".to_string(), b"yes".to_vec());
            if let Some(saved) = &self.saved {
                data.extend(saved.clone());
            }
            Ok(data)
        }
    }

    #[derive(Default)]
    struct StubManager {
        with_data_module: bool,
        identification_calls: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl ModelManager for StubManager {
        fn model_type(&self) -> &str {
            "stub"
        }

        fn serving_module_names(&self) -> Vec<String> {
            vec!["default_model".to_string()]
        }

        fn should_generate_eval_dataset(&self) -> bool {
            false
        }

        fn get_data_module(
            &self,
            _table: &TableSpec,
            _reward_options: &RewardOptions,
            _reader_options: &ReaderOptions,
            saved_setup_data: Option<&SetupData>,
        ) -> Option<Box<dyn DataModule>> {
            self.with_data_module.then(|| {
                Box::new(EchoModule {
                    saved: saved_setup_data.cloned(),
                }) as Box<dyn DataModule>
            })
        }

        async fn run_feature_identification(
            &self,
            _table: &TableSpec,
        ) -> TrainingResult<NormalizationDataMap> {
            *self.identification_calls.lock().unwrap() += 1;
            Ok(normalization_map())
        }

        async fn query_data(
            &self,
            _table: &TableSpec,
            sample_range: SampleRange,
            _reward_options: &RewardOptions,
            _reader_options: &ReaderOptions,
        ) -> TrainingResult<Dataset> {
            Ok(Dataset {
                uri: "stub".to_string(),
                sample_range,
                row_count: None,
            })
        }

        async fn train_workflow(
            &self,
            _request: TrainWorkflowRequest,
        ) -> TrainingResult<TrainingOutput> {
            Ok(TrainingOutput::default())
        }
    }

    fn normalization_map() -> NormalizationDataMap {
        NormalizationDataMap::from([("state".to_string(), NormalizationData::default())])
    }

    fn run<'a>(
        manager: &'a StubManager,
        table: &'a TableSpec,
        opts: &'a (RewardOptions, ReaderOptions),
    ) -> DataSetupResolver<'a> {
        DataSetupResolver::new(manager, table, &opts.0, &opts.1)
    }

    #[test]
    fn test_saved_setup_value_unwraps_both_shapes() {
        let json = r#"{"raw": [1, 2], "blob": {"data": [3]}}"#;
        let saved: SavedSetupData = serde_json::from_str(json).unwrap();
        let unwrapped = unwrap_saved_setup_data(saved);
        assert_eq!(unwrapped["raw"], vec![1, 2]);
        assert_eq!(unwrapped["blob"], vec![3]);
    }

    #[test]
    fn test_from_parts_requires_exactly_one() {
        let both = ResolvedData::from_parts(Some(SetupData::new()), Some(normalization_map()));
        assert!(matches!(
            both,
            Err(TrainingError::MutualExclusivity {
                setup_data: true,
                normalization_data: true
            })
        ));
        let neither = ResolvedData::from_parts(None, None);
        assert!(matches!(
            neither,
            Err(TrainingError::MutualExclusivity {
                setup_data: false,
                normalization_data: false
            })
        ));
        let map_only = ResolvedData::from_parts(None, Some(normalization_map())).unwrap();
        assert!(map_only.normalization_data_map().is_some());
    }

    #[test]
    fn test_resolved_data_feeds_back_as_inputs() {
        let inputs = DataInputs::from(ResolvedData::NormalizationData(normalization_map()));
        assert!(inputs.setup_data.is_none());
        assert_eq!(inputs.normalization_data_map, Some(normalization_map()));

        let inputs = DataInputs::from(ResolvedData::SetupData(SetupData::new()));
        assert!(inputs.normalization_data_map.is_none());
        assert_eq!(inputs.setup_data, Some(SetupData::new()));
    }

    #[tokio::test]
    async fn test_identify_prefers_data_module() {
        let manager = StubManager {
            with_data_module: true,
            ..Default::default()
        };
        let table = TableSpec::new("events");
        let opts = (RewardOptions::default(), ReaderOptions::default());

        let resolved = run(&manager, &table, &opts).identify().await.unwrap();
        assert!(resolved.setup_data().is_some());
        assert_eq!(*manager.identification_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_identify_falls_back_to_feature_identification() {
        let manager = StubManager::default();
        let table = TableSpec::new("events");
        let opts = (RewardOptions::default(), ReaderOptions::default());

        let resolved = run(&manager, &table, &opts).identify().await.unwrap();
        assert!(resolved.normalization_data_map().is_some());
        assert_eq!(*manager.identification_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_data_module_supersedes_normalization_map() {
        let manager = StubManager {
            with_data_module: true,
            ..Default::default()
        };
        let table = TableSpec::new("events");
        let opts = (RewardOptions::default(), ReaderOptions::default());

        let inputs = DataInputs {
            normalization_data_map: Some(normalization_map()),
            ..Default::default()
        };
        let resolved = run(&manager, &table, &opts).resolve(inputs).await.unwrap();
        assert!(resolved.setup_data().is_some());
        assert!(resolved.normalization_data_map().is_none());
    }

    #[tokio::test]
    async fn test_saved_setup_data_reaches_data_module_as_bytes() {
        let manager = StubManager {
            with_data_module: true,
            ..Default::default()
        };
        let table = TableSpec::new("events");
        let opts = (RewardOptions::default(), ReaderOptions::default());

        let blob = SavedSetupValue::Blob { data: vec![9, 9] };
        let saved = SavedSetupData::from([("blob".to_string(), blob)]);
        let inputs = DataInputs {
            saved_setup_data: Some(saved),
            ..Default::default()
        };
        let resolved = run(&manager, &table, &opts).resolve(inputs).await.unwrap();
        assert_eq!(resolved.setup_data().unwrap()["blob"], vec![9, 9]);
    }

    #[tokio::test]
    async fn test_resolve_without_inputs_or_module_is_exclusivity_error() {
        let manager = StubManager::default();
        let table = TableSpec::new("events");
        let opts = (RewardOptions::default(), ReaderOptions::default());

        let err = run(&manager, &table, &opts).resolve(DataInputs::default()).await.unwrap_err();
        assert!(matches!(err, TrainingError::MutualExclusivity { .. }));
    }

    #[tokio::test]
    async fn test_resolve_rejects_both_inputs_without_module() {
        let manager = StubManager::default();
        let table = TableSpec::new("events");
        let opts = (RewardOptions::default(), ReaderOptions::default());

        let inputs = DataInputs {
            setup_data: Some(SetupData::new()),
            normalization_data_map: Some(normalization_map()),
            ..Default::default()
        };
        let err = run(&manager, &table, &opts).resolve(inputs).await.unwrap_err();
        assert!(matches!(
            err,
            TrainingError::MutualExclusivity {
                setup_data: true,
                normalization_data: true
            }
        ));
    }
}
