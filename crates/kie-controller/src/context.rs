//! Shared controller context

use std::sync::Arc;

use kube::Client;

use kie_common::crd::KieAppRegistry;
use kie_common::events::{EventPublisher, KubeEventPublisher};
use kie_common::FIELD_MANAGER;
use kie_environment::{ConfigSource, EmbeddedConfig, VersionRegistry};

use crate::client::{KieKubeClient, KieKubeClientImpl};
use crate::config::OperatorConfig;
use crate::config_source::ConfigMapSource;
use crate::secrets::{GeneratedSecretMaterial, SecretMaterial};

/// Everything a reconcile pass needs besides the KieApp itself
///
/// Holds no per-KieApp state; concurrent passes for different KieApps share
/// it freely.
pub struct KieAppContext {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KieKubeClient>,
    /// Where templates and live configuration come from
    pub config_source: Arc<dyn ConfigSource>,
    /// Supported product versions
    pub registry: VersionRegistry,
    /// Passwords and keystores
    pub secrets: Arc<dyn SecretMaterial>,
    /// Event publisher for KieApp events
    pub events: Arc<dyn EventPublisher>,
    /// Registry used when a KieApp does not name one
    pub default_registry: KieAppRegistry,
}

impl KieAppContext {
    /// Create the production context.
    ///
    /// In cluster, templates come from the operator's ConfigMaps; otherwise
    /// from the embedded configuration.
    pub fn from_client(client: Client, config: &OperatorConfig) -> Self {
        let kube: Arc<dyn KieKubeClient> = Arc::new(KieKubeClientImpl::new(client.clone()));
        let config_source: Arc<dyn ConfigSource> = match config.in_cluster() {
            Some((namespace, _)) => Arc::new(ConfigMapSource::new(kube.clone(), namespace)),
            None => Arc::new(EmbeddedConfig),
        };
        Self {
            kube,
            config_source,
            registry: VersionRegistry::default(),
            secrets: Arc::new(GeneratedSecretMaterial),
            events: Arc::new(KubeEventPublisher::new(client, FIELD_MANAGER)),
            default_registry: config.default_registry(),
        }
    }

    /// Create a context for testing with a mock client
    ///
    /// Uses the embedded configuration, a no-op event publisher and fixed
    /// secret material so passes are deterministic.
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KieKubeClient>) -> Self {
        Self {
            kube,
            config_source: Arc::new(EmbeddedConfig),
            registry: VersionRegistry::default(),
            secrets: Arc::new(crate::testing::FixedSecretMaterial),
            events: Arc::new(kie_common::events::NoopEventPublisher),
            default_registry: OperatorConfig::default().default_registry(),
        }
    }
}
