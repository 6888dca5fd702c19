//! Reference reward model for rlflow pipelines.
//!
//! `RewardModelManager` trains a `LinearRewardNet` on a local JSONL table, either from
//! feature identification plus queried datasets or from setup data prepared by
//! `JsonlDataModule`.

pub mod batch;
pub mod data_module;
pub mod linear;
pub mod manager;
pub mod trainer;

pub use batch::LabeledRows;
pub use data_module::{JsonlDataModule, PreparedData};
pub use linear::{Activation, LinearRewardNet};
pub use manager::{MODEL_TYPE, REWARD_NET_MODULE, RewardModelManager};
pub use trainer::LinearRewardTrainer;
