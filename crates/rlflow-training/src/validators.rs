use crate::error::TrainingResult;
use crate::output::{TrainingOutput, ValidationResult};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Decides whether a trained model is fit to publish.
#[async_trait]
pub trait ModelValidator: Send + Sync {
    fn name(&self) -> &str;

    async fn validate(&self, output: &TrainingOutput) -> TrainingResult<ValidationResult>;
}

/// Accepts every model.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpValidator;

#[async_trait]
impl ModelValidator for NoOpValidator {
    fn name(&self) -> &str {
        "noop"
    }

    async fn validate(&self, _output: &TrainingOutput) -> TrainingResult<ValidationResult> {
        Ok(ValidationResult {
            should_publish: true,
            metrics: BTreeMap::new(),
            message: None,
        })
    }
}

/// Accepts a model only if its reported eval loss is at most `max_eval_loss`.
#[derive(Debug, Clone, Copy)]
pub struct EvalLossThresholdValidator {
    pub max_eval_loss: f64,
}

#[async_trait]
impl ModelValidator for EvalLossThresholdValidator {
    fn name(&self) -> &str {
        "eval_loss_threshold"
    }

    async fn validate(&self, output: &TrainingOutput) -> TrainingResult<ValidationResult> {
        let Some(eval_loss) = output.metrics.eval_loss else {
            return Ok(ValidationResult {
                should_publish: false,
                metrics: BTreeMap::new(),
                message: Some("training reported no eval loss".to_string()),
            });
        };

        let should_publish = eval_loss <= self.max_eval_loss;
        let message = (!should_publish).then(|| {
            format!(
                "eval loss {eval_loss} exceeds threshold {}",
                self.max_eval_loss
            )
        });

        Ok(ValidationResult {
            should_publish,
            metrics: BTreeMap::from([("eval_loss".to_string(), eval_loss)]),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_with_eval_loss(loss: Option<f64>) -> TrainingOutput {
        let mut output = TrainingOutput::default();
        output.metrics.eval_loss = loss;
        output
    }

    #[tokio::test]
    async fn test_noop_always_publishes() {
        let result = NoOpValidator.validate(&TrainingOutput::default()).await.unwrap();
        assert!(result.should_publish);
    }

    #[tokio::test]
    async fn test_threshold_validator() {
        let validator = EvalLossThresholdValidator { max_eval_loss: 0.5 };

        let pass = validator.validate(&output_with_eval_loss(Some(0.5))).await.unwrap();
        assert!(pass.should_publish);
        assert_eq!(pass.metrics["eval_loss"], 0.5);

        let fail = validator.validate(&output_with_eval_loss(Some(0.7))).await.unwrap();
        assert!(!fail.should_publish);
        assert!(fail.message.unwrap().contains("exceeds"));

        let missing = validator.validate(&output_with_eval_loss(None)).await.unwrap();
        assert!(!missing.should_publish);
    }
}
