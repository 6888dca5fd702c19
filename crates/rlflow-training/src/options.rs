use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How rewards are derived from logged data. Passed through to querying and training.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardOptions {
    /// Expression evaluated by the query backend instead of the logged reward.
    #[serde(default)]
    pub custom_reward_expression: Option<String>,
    /// Weights of named metrics folded into the reward.
    #[serde(default)]
    pub metric_reward_values: BTreeMap<String, f64>,
}

/// How training data is read. Passed through to querying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    pub minibatch_size: usize,
    pub reader_data_seed: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            minibatch_size: 1024,
            reader_data_seed: 1,
        }
    }
}

/// Compute resource shape. Passed through to training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceOptions {
    pub device: TrainingDevice,
    pub gpu: u32,
    pub cpu: Option<u32>,
    /// Memory request, e.g. `"40g"`.
    pub memory: Option<String>,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            device: TrainingDevice::Auto,
            gpu: 1,
            cpu: None,
            memory: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingDevice {
    Auto,
    Cpu,
    Cuda,
    Metal,
}

/// Scheduling hint for publishers. Never interpreted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringPeriod {
    Daily,
    Weekly,
    Custom(String),
}

impl std::fmt::Display for RecurringPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::Weekly => f.write_str("weekly"),
            Self::Custom(s) => f.write_str(s),
        }
    }
}

/// Best-effort check for a usable CUDA device.
#[must_use]
pub fn detect_gpu() -> bool {
    if let Ok(visible) = std::env::var("CUDA_VISIBLE_DEVICES") {
        let visible = visible.trim();
        return !visible.is_empty() && visible != "-1" && visible != "NoDevFiles";
    }
    Path::new("/dev/nvidia0").exists()
}
