//! KieApp legacy schema (`app.kiegroup.org/v1`)
//!
//! Served only so that existing resources can be read and migrated to the
//! current schema. The controller never reconciles a legacy resource directly.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::kieapp::{
    CommonConfig, KieAppAuthObject, KieAppObject, KieAppRegistry, KieServerSet,
};
use super::types::{Condition, EnvironmentType, ImageReference};

/// Specification for a legacy KieApp
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "app.kiegroup.org",
    version = "v1",
    kind = "KieApp",
    root = "LegacyKieApp",
    plural = "kieapps",
    shortname = "kieapp",
    namespaced,
    status = "LegacyKieAppStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct LegacyKieAppSpec {
    /// Environment template to deploy
    #[serde(default)]
    pub environment: EnvironmentType,

    /// Registry to pull product images from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_registry: Option<KieAppRegistry>,

    /// Per-tier overrides
    #[serde(default)]
    pub objects: LegacyKieAppObjects,

    /// Values shared by every template, including the product version
    #[serde(default)]
    pub common_config: LegacyCommonConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: KieAppAuthObject,

    /// Upgrade policy
    #[serde(default)]
    pub upgrades: LegacyUpgrades,
}

/// Legacy per-tier overrides, with both the single and the list server form
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyKieAppObjects {
    /// Console
    #[serde(default)]
    pub console: KieAppObject,
    /// Single server set shorthand; exclusive with `servers`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<CommonKieServerSet>,
    /// Server sets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<KieServerSet>,
    /// Smart router
    #[serde(default)]
    pub smartrouter: KieAppObject,
}

/// Legacy shorthand for a single server set
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommonKieServerSet {
    /// Number of server deployments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployments: Option<u32>,
    /// Image to run instead of the product default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ImageReference>,
}

impl From<&CommonKieServerSet> for KieServerSet {
    fn from(server: &CommonKieServerSet) -> Self {
        KieServerSet {
            deployments: server.deployments,
            from: server.from.clone(),
            ..Default::default()
        }
    }
}

/// Legacy common configuration, which also carried the product version
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCommonConfig {
    /// Product version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Everything else
    #[serde(flatten)]
    pub config: CommonConfig,
}

/// Legacy upgrade policy
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyUpgrades {
    /// Allow patch upgrades
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<bool>,
    /// Allow minor upgrades
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<bool>,
}

/// Legacy status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyKieAppStatus {
    /// Condition history
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// URL of the console
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_host: Option<String>,
    /// Names of the deployed DeploymentConfigs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployments: Vec<String>,
}
