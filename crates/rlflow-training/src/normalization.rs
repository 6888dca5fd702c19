//! Feature identification: per-feature statistics used to preprocess raw features.

use crate::error::{TrainingError, TrainingResult};
use crate::jsonl::TableRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Feature group holding state features.
pub const STATE_FEATURES: &str = "state";

const MAX_ENUM_VALUES: usize = 10;
const MIN_STDDEV: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Binary,
    Probability,
    Continuous,
    Enum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParameters {
    pub feature_type: FeatureType,
    pub mean: f64,
    pub stddev: f64,
    pub min_value: f64,
    pub max_value: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<f64>,
}

impl NormalizationParameters {
    /// Maps a raw feature value into model space.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f32 {
        let normalized = match self.feature_type {
            FeatureType::Binary | FeatureType::Probability => value,
            FeatureType::Continuous => (value - self.mean) / self.stddev,
            FeatureType::Enum => {
                let slots = self.possible_values.len().saturating_sub(1).max(1) as f64;
                self.possible_values
                    .iter()
                    .position(|v| (*v - value).abs() < f64::EPSILON)
                    .map_or(0.0, |idx| idx as f64 / slots)
            }
        };
        normalized as f32
    }
}

/// Statistics for every feature in one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationData {
    pub feature_params: BTreeMap<String, NormalizationParameters>,
}

impl NormalizationData {
    /// Feature names in a stable order; this is the column order of feature matrices.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.feature_params.keys().cloned().collect()
    }

    /// Normalizes a sparse feature map into a dense row. Missing features become 0.
    #[must_use]
    pub fn normalize_row(&self, features: &BTreeMap<String, f64>) -> Vec<f32> {
        self.feature_params
            .iter()
            .map(|(name, params)| features.get(name).map_or(0.0, |v| params.normalize(*v)))
            .collect()
    }
}

/// Feature group name -> statistics.
pub type NormalizationDataMap = BTreeMap<String, NormalizationData>;

/// Identifies the type and statistics of every state feature in `rows`.
pub fn identify_normalization_parameters(
    rows: &[TableRow],
) -> TrainingResult<NormalizationDataMap> {
    if rows.is_empty() {
        return Err(TrainingError::Dataset(
            "cannot identify features of an empty table".to_string(),
        ));
    }

    let mut values: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        for (name, value) in &row.state_features {
            if value.is_finite() {
                values.entry(name.as_str()).or_default().push(*value);
            }
        }
    }

    let feature_params = values
        .into_iter()
        .map(|(name, vals)| (name.to_string(), identify_feature(&vals)))
        .collect();

    let mut map = NormalizationDataMap::new();
    map.insert(STATE_FEATURES.to_string(), NormalizationData { feature_params });
    Ok(map)
}

fn identify_feature(values: &[f64]) -> NormalizationParameters {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt().max(MIN_STDDEV);
    let min_value = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max_value = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let all_integral = values.iter().all(|v| v.fract() == 0.0);
    let distinct: BTreeSet<i64> = if all_integral {
        values.iter().map(|v| *v as i64).collect()
    } else {
        BTreeSet::new()
    };

    let feature_type = if all_integral && distinct.iter().all(|v| *v == 0 || *v == 1) {
        FeatureType::Binary
    } else if all_integral && distinct.len() <= MAX_ENUM_VALUES {
        FeatureType::Enum
    } else if min_value >= 0.0 && max_value <= 1.0 {
        FeatureType::Probability
    } else {
        FeatureType::Continuous
    };

    let possible_values = if feature_type == FeatureType::Enum {
        distinct.into_iter().map(|v| v as f64).collect()
    } else {
        Vec::new()
    };

    NormalizationParameters {
        feature_type,
        mean,
        stddev,
        min_value,
        max_value,
        possible_values,
    }
}
