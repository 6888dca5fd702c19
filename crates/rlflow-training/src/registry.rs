use crate::error::{TrainingError, TrainingResult};
use crate::output::PublishedModel;
use std::path::{Path, PathBuf};

/// JSON file listing every model a file-system publisher has recorded, oldest first.
#[derive(Debug, Clone)]
pub struct PublishedModelRegistry {
    path: PathBuf,
}

impl PublishedModelRegistry {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Registry stored as `published_models.json` under `root`.
    #[must_use]
    pub fn for_root(root: &Path) -> Self {
        Self::new(root.join("published_models.json"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded models. A missing registry file is an empty registry.
    pub fn list(&self) -> TrainingResult<Vec<PublishedModel>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            TrainingError::Publisher(format!(
                "corrupt model registry {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    pub fn append(&self, models: &[PublishedModel]) -> TrainingResult<()> {
        let mut all = self.list()?;
        all.extend_from_slice(models);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        Ok(())
    }

    /// Most recently published model of `model_type` serving `module_name`.
    pub fn latest(
        &self,
        model_type: &str,
        module_name: &str,
    ) -> TrainingResult<Option<PublishedModel>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|m| m.model_type == model_type && m.module_name == module_name)
            .max_by_key(|m| m.published_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{EntityId, WorkflowId};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn model(module: &str, offset_secs: i64) -> PublishedModel {
        PublishedModel {
            module_name: module.to_string(),
            entity_id: EntityId::new(),
            workflow_id: WorkflowId::new(),
            model_type: "reward".to_string(),
            path: PathBuf::from(format!("/models/{module}-{offset_secs}.json")),
            published_at: Utc::now() + Duration::seconds(offset_secs),
            recurring_period: None,
        }
    }

    #[test]
    fn test_missing_registry_is_empty() {
        let temp = TempDir::new().unwrap();
        let registry = PublishedModelRegistry::for_root(temp.path());
        assert!(registry.list().unwrap().is_empty());
        assert!(registry.latest("reward", "reward_net").unwrap().is_none());
    }

    #[test]
    fn test_append_and_latest() {
        let temp = TempDir::new().unwrap();
        let registry = PublishedModelRegistry::for_root(&temp.path().join("nested"));

        registry.append(&[model("reward_net", 0)]).unwrap();
        registry.append(&[model("reward_net", 60), model("other", 120)]).unwrap();

        assert_eq!(registry.list().unwrap().len(), 3);
        let latest = registry.latest("reward", "reward_net").unwrap().unwrap();
        assert!(latest.path.to_string_lossy().ends_with("reward_net-60.json"));
    }

    #[test]
    fn test_corrupt_registry_is_reported() {
        let temp = TempDir::new().unwrap();
        let registry = PublishedModelRegistry::for_root(temp.path());
        std::fs::write(registry.path(), "not json").unwrap();
        assert!(matches!(registry.list(), Err(TrainingError::Publisher(_))));
    }
}
