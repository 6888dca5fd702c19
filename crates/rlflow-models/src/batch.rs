//! Conversion of table rows into model batches.

use ndarray::{Array1, Array2, s};
use rlflow_abstraction::{EvaluationBatch, RankingBatch, TransitionBatch};
use rlflow_training::{NormalizationData, TableRow};

/// Dense, normalized features and targets of a set of labeled rows.
#[derive(Debug, Clone)]
pub struct LabeledRows {
    pub features: Array2<f32>,
    pub targets: Array1<f32>,
    /// Rows carry slate rewards rather than step rewards.
    pub ranking: bool,
}

impl LabeledRows {
    /// Normalizes the labeled rows of `rows`.
    ///
    /// A table whose rows only carry `slate_reward` becomes ranking data; otherwise rows
    /// without a step `reward` are dropped.
    #[must_use]
    pub fn from_rows(rows: &[TableRow], normalization: &NormalizationData) -> Self {
        let ranking = rows.iter().all(|r| r.reward.is_none())
            && rows.iter().any(|r| r.slate_reward.is_some());
        let target = |row: &TableRow| if ranking { row.slate_reward } else { row.reward };

        let width = normalization.feature_params.len();
        let mut data = Vec::new();
        let mut targets = Vec::new();
        for row in rows {
            if let Some(t) = target(row) {
                data.extend(normalization.normalize_row(&row.state_features));
                targets.push(t as f32);
            }
        }

        let features = Array2::from_shape_vec((targets.len(), width), data)
            .unwrap_or_else(|_| Array2::zeros((0, width)));
        Self {
            features,
            targets: Array1::from(targets),
            ranking,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Consecutive batches of at most `batch_size` rows.
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = EvaluationBatch> + '_ {
        let batch_size = batch_size.max(1);
        (0..self.len()).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(self.len());
            let features = self.features.slice(s![start..end, ..]).to_owned();
            let targets = self.targets.slice(s![start..end]).to_owned();
            if self.ranking {
                EvaluationBatch::Ranking(RankingBatch {
                    slate_features: features,
                    slate_reward: Some(targets),
                })
            } else {
                EvaluationBatch::Transition(TransitionBatch {
                    features,
                    reward: Some(targets),
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlflow_training::{FeatureType, NormalizationParameters};
    use std::collections::BTreeMap;

    fn normalization() -> NormalizationData {
        let params = NormalizationParameters {
            feature_type: FeatureType::Continuous,
            mean: 1.0,
            stddev: 2.0,
            min_value: -1.0,
            max_value: 3.0,
            possible_values: Vec::new(),
        };
        NormalizationData {
            feature_params: BTreeMap::from([("x".to_string(), params)]),
        }
    }

    fn row(x: f64, reward: Option<f64>, slate_reward: Option<f64>) -> TableRow {
        TableRow {
            mdp_id: "m".to_string(),
            sequence_number: 0,
            state_features: BTreeMap::from([("x".to_string(), x)]),
            action: None,
            reward,
            slate_reward,
        }
    }

    #[test]
    fn test_unlabeled_rows_are_dropped() {
        let rows = vec![
            row(3.0, Some(1.0), None),
            row(1.0, None, None),
            row(-1.0, Some(0.0), None),
        ];
        let labeled = LabeledRows::from_rows(&rows, &normalization());
        assert_eq!(labeled.len(), 2);
        assert!(!labeled.ranking);
        assert_eq!(labeled.features.column(0).to_vec(), vec![1.0, -1.0]);
    }

    #[test]
    fn test_slate_rewards_make_ranking_batches() {
        let rows = vec![
            row(1.0, None, Some(0.5)),
            row(1.0, None, Some(1.5)),
            row(1.0, None, Some(2.5)),
        ];
        let labeled = LabeledRows::from_rows(&rows, &normalization());
        let batches: Vec<_> = labeled.batches(2).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].kind(), "ranking");
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1].reward_signal().unwrap()[0], 2.5);
    }
}
