//! Configuration served from ConfigMaps
//!
//! In cluster the templates live in `kieconfigs-<version>-<unit>` ConfigMaps
//! in the operator namespace, one key per file, so users can adjust them.
//! The same ConfigMaps are the live configuration upgrade-conflict detection
//! compares against.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use kie_environment::source::{config_map_name, template_location, COMMON_UNIT, ENVS_UNIT};
use kie_environment::{ConfigSource, Snapshot, SourceError};

use crate::client::KieKubeClient;

/// Reads templates from the operator's ConfigMaps
pub struct ConfigMapSource {
    kube: Arc<dyn KieKubeClient>,
    namespace: String,
}

impl ConfigMapSource {
    /// Source reading ConfigMaps in `namespace`
    pub fn new(kube: Arc<dyn KieKubeClient>, namespace: impl Into<String>) -> Self {
        Self {
            kube,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl ConfigSource for ConfigMapSource {
    async fn load_template(&self, path: &str, version: &str) -> Result<String, SourceError> {
        let (unit, file) = template_location(path);
        let name = config_map_name(version, unit);
        let config_map = self
            .kube
            .get_config_map(&name, &self.namespace)
            .await
            .map_err(|e| SourceError::unreadable(version, path, e.to_string()))?
            .ok_or_else(|| SourceError::not_found(version, path))?;
        debug!(config_map = %name, file, "loaded template");
        config_map
            .data
            .and_then(|mut data| data.remove(file))
            .ok_or_else(|| SourceError::not_found(version, path))
    }

    async fn live_snapshot(&self, version: &str) -> Result<Option<Snapshot>, SourceError> {
        let mut snapshot = Snapshot::new();
        for unit in [COMMON_UNIT, ENVS_UNIT] {
            let name = config_map_name(version, unit);
            let config_map = self
                .kube
                .get_config_map(&name, &self.namespace)
                .await
                .map_err(|e| SourceError::unreadable(version, unit, e.to_string()))?
                .ok_or_else(|| SourceError::not_found(version, unit))?;
            snapshot.insert(unit.to_string(), config_map.data.unwrap_or_default());
        }
        Ok(Some(snapshot))
    }
}
