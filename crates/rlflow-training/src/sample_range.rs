//! Train/eval percentage windows over an input table.
//!
//! Training always takes the bottom of the table and evaluation the top, so the two windows
//! are disjoint whenever their sizes sum to at most 100.

use crate::error::{TrainingError, TrainingResult};
use crate::table::{SampleRange, TableSpec, TrainEvalSampleRanges, check_percentage};

/// Floating-point slack allowed when checking `table_sample + eval_table_sample <= 100`.
pub const SAMPLE_RANGE_TOLERANCE: f64 = 1e-3;

/// Computes the train and eval windows.
///
/// Without cross-partition evaluation the eval window is `(0, 0)` and the train window is
/// `(0, table_sample)`, or the whole table when `table_sample` is unset.
pub fn compute_sample_ranges(
    table_sample: Option<f64>,
    eval_table_sample: Option<f64>,
    use_cross_eval: bool,
) -> TrainingResult<TrainEvalSampleRanges> {
    check_percentage("table_sample", table_sample)?;
    check_percentage("eval_table_sample", eval_table_sample)?;

    if !use_cross_eval {
        return Ok(TrainEvalSampleRanges {
            train_sample_range: table_sample
                .map_or(SampleRange::FULL, |s| SampleRange::new(0.0, s)),
            eval_sample_range: SampleRange::EMPTY,
        });
    }

    match (table_sample, eval_table_sample) {
        (Some(train), Some(eval)) if train + eval <= 100.0 + SAMPLE_RANGE_TOLERANCE => {
            Ok(TrainEvalSampleRanges {
                train_sample_range: SampleRange::new(0.0, train),
                eval_sample_range: SampleRange::new(100.0 - eval, 100.0),
            })
        }
        _ => Err(TrainingError::Configuration(cross_eval_message(
            table_sample,
            eval_table_sample,
        ))),
    }
}

fn cross_eval_message(table_sample: Option<f64>, eval_table_sample: Option<f64>) -> String {
    let show = |v: Option<f64>| v.map_or_else(|| "None".to_string(), |v| v.to_string());
    format!(
        "cross-partition evaluation is enabled. Specify table_sample(current={}) and \
         eval_table_sample(current={}) such that eval_table_sample + table_sample <= 100. \
         eval_table_sample should not be too small to evaluate reliably.",
        show(table_sample),
        show(eval_table_sample)
    )
}

impl TableSpec {
    /// Sample windows for this table.
    pub fn sample_ranges(&self, use_cross_eval: bool) -> TrainingResult<TrainEvalSampleRanges> {
        compute_sample_ranges(self.table_sample, self.eval_table_sample, use_cross_eval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_eval_anchors_eval_at_top() {
        let ranges = compute_sample_ranges(Some(80.0), Some(15.0), true).unwrap();
        assert_eq!(ranges.train_sample_range, SampleRange::new(0.0, 80.0));
        assert_eq!(ranges.eval_sample_range, SampleRange::new(85.0, 100.0));
        assert!(!ranges.train_sample_range.overlaps(&ranges.eval_sample_range));
    }

    #[test]
    fn test_no_cross_eval_uses_whole_table_when_unsampled() {
        let ranges = compute_sample_ranges(None, None, false).unwrap();
        assert_eq!(ranges.train_sample_range, SampleRange::new(0.0, 100.0));
        assert_eq!(ranges.eval_sample_range, SampleRange::new(0.0, 0.0));
    }

    #[test]
    fn test_no_cross_eval_ignores_eval_sample() {
        let ranges = compute_sample_ranges(Some(30.0), Some(90.0), false).unwrap();
        assert_eq!(ranges.train_sample_range, SampleRange::new(0.0, 30.0));
        assert_eq!(ranges.eval_sample_range, SampleRange::EMPTY);
    }

    #[test]
    fn test_cross_eval_requires_both_samples() {
        for (train, eval) in [(None, Some(10.0)), (Some(10.0), None), (None, None)] {
            let err = compute_sample_ranges(train, eval, true).unwrap_err();
            let TrainingError::Configuration(msg) = err else {
                panic!("expected configuration error")
            };
            assert!(msg.contains("eval_table_sample + table_sample <= 100"));
        }
    }

    #[test]
    fn test_cross_eval_rejects_overfull_samples() {
        let err = compute_sample_ranges(Some(60.0), Some(40.1), true).unwrap_err();
        let TrainingError::Configuration(msg) = err else {
            panic!("expected configuration error")
        };
        assert!(msg.contains("current=60"));
        assert!(msg.contains("current=40.1"));
    }

    #[test]
    fn test_cross_eval_tolerates_float_slack() {
        let ranges = compute_sample_ranges(Some(70.0), Some(30.0005), true).unwrap();
        assert!((ranges.eval_sample_range.low - 69.9995).abs() < 1e-9);
        assert!(compute_sample_ranges(Some(70.0), Some(30.002), true).is_err());
    }

    #[test]
    fn test_valid_splits_never_overlap() {
        for train in (0..=100).step_by(5) {
            for eval in (0..=(100 - train)).step_by(5) {
                let ranges =
                    compute_sample_ranges(Some(f64::from(train)), Some(f64::from(eval)), true)
                        .unwrap();
                assert_eq!(ranges.train_sample_range.low, 0.0);
                assert_eq!(ranges.eval_sample_range.high, 100.0);
                assert!(!ranges.train_sample_range.overlaps(&ranges.eval_sample_range));
            }
        }
    }

    #[test]
    fn test_table_spec_sample_ranges() {
        let spec = TableSpec::new("events").with_samples(Some(80.0), Some(15.0));
        let ranges = spec.sample_ranges(true).unwrap();
        assert_eq!(ranges.eval_sample_range, SampleRange::new(85.0, 100.0));
    }
}
