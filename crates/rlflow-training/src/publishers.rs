use crate::error::{TrainingError, TrainingResult};
use crate::identity::{NamedModelIds, WorkflowId};
use crate::manager::ModelManager;
use crate::options::RecurringPeriod;
use crate::output::{PublishedModel, PublishingResult, TrainingOutput};
use crate::registry::PublishedModelRegistry;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{info, warn};

/// Makes a trained model available to its consumers.
#[async_trait]
pub trait ModelPublisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(
        &self,
        manager: &dyn ModelManager,
        output: &TrainingOutput,
        named_model_ids: &NamedModelIds,
        workflow_id: &WorkflowId,
        recurring_period: Option<&RecurringPeriod>,
    ) -> TrainingResult<PublishingResult>;
}

/// Publishes nothing and reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPublishingPublisher;

#[async_trait]
impl ModelPublisher for NoPublishingPublisher {
    fn name(&self) -> &str {
        "none"
    }

    async fn publish(
        &self,
        _manager: &dyn ModelManager,
        _output: &TrainingOutput,
        _named_model_ids: &NamedModelIds,
        _workflow_id: &WorkflowId,
        _recurring_period: Option<&RecurringPeriod>,
    ) -> TrainingResult<PublishingResult> {
        Ok(PublishingResult {
            success: true,
            publisher: self.name().to_string(),
            published: Vec::new(),
            message: Some("publishing disabled".to_string()),
        })
    }
}

/// Records every serving module's output path in a local registry file.
#[derive(Debug, Clone)]
pub struct FileSystemPublisher {
    registry: PublishedModelRegistry,
}

impl FileSystemPublisher {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self {
            registry: PublishedModelRegistry::for_root(&root),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &PublishedModelRegistry {
        &self.registry
    }
}

#[async_trait]
impl ModelPublisher for FileSystemPublisher {
    fn name(&self) -> &str {
        "file_system"
    }

    async fn publish(
        &self,
        manager: &dyn ModelManager,
        output: &TrainingOutput,
        named_model_ids: &NamedModelIds,
        workflow_id: &WorkflowId,
        recurring_period: Option<&RecurringPeriod>,
    ) -> TrainingResult<PublishingResult> {
        let rejected = output
            .validation_result
            .as_ref()
            .filter(|v| !v.should_publish);
        if let Some(validation) = rejected {
            warn!(workflow_id = %workflow_id, "Validation rejected the model; not publishing");
            let message = validation
                .message
                .clone()
                .unwrap_or_else(|| "rejected by validator".to_string());
            return Ok(PublishingResult {
                success: false,
                publisher: self.name().to_string(),
                published: Vec::new(),
                message: Some(message),
            });
        }

        let published_at = Utc::now();
        let mut published = Vec::with_capacity(output.output_paths.len());
        for (module_name, path) in &output.output_paths {
            let entity_id = named_model_ids.get(module_name).ok_or_else(|| {
                TrainingError::Publisher(format!(
                    "no entity id allocated for serving module {module_name}"
                ))
            })?;
            published.push(PublishedModel {
                module_name: module_name.clone(),
                entity_id: entity_id.clone(),
                workflow_id: workflow_id.clone(),
                model_type: manager.model_type().to_string(),
                path: path.clone(),
                published_at,
                recurring_period: recurring_period.cloned(),
            });
        }

        self.registry.append(&published)?;
        info!(
            workflow_id = %workflow_id,
            modules = published.len(),
            registry = %self.registry.path().display(),
            "Published models"
        );

        Ok(PublishingResult {
            success: true,
            publisher: self.name().to_string(),
            published,
            message: None,
        })
    }
}
