//! Operator configuration
//!
//! Every setting is a CLI flag that can also come from the environment, which
//! is how the operator Deployment passes them.

use clap::Args;

use kie_common::crd::KieAppRegistry;
use kie_common::DEFAULT_IMAGE_REGISTRY;

/// Settings shared by every reconcile pass
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace to watch; all namespaces when unset
    #[arg(long = "namespace", env = "WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Name of the operator Deployment
    #[arg(long = "operator-name", env = "OPERATOR_NAME")]
    pub operator_name: Option<String>,

    /// Registry product images are pulled from
    #[arg(long, env = "REGISTRY", default_value = DEFAULT_IMAGE_REGISTRY)]
    pub registry: String,

    /// Treat the registry as insecure
    #[arg(long = "insecure-registry", env = "INSECURE", default_value_t = false)]
    pub insecure_registry: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            operator_name: None,
            registry: DEFAULT_IMAGE_REGISTRY.to_string(),
            insecure_registry: false,
        }
    }
}

impl OperatorConfig {
    /// Namespace and Deployment of the operator when it runs inside the cluster.
    ///
    /// Only then are templates served from ConfigMaps; otherwise the embedded
    /// configuration is used.
    pub fn in_cluster(&self) -> Option<(&str, &str)> {
        match (self.namespace.as_deref(), self.operator_name.as_deref()) {
            (Some(ns), Some(name)) if !ns.is_empty() && !name.is_empty() => Some((ns, name)),
            _ => None,
        }
    }

    /// Registry used when a KieApp does not name one
    pub fn default_registry(&self) -> KieAppRegistry {
        KieAppRegistry {
            registry: Some(self.registry.clone()),
            insecure: self.insecure_registry,
        }
    }
}
