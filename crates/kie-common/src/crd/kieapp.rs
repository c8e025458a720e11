//! KieApp Custom Resource Definition, current schema (`app.kiegroup.org/v2`)
//!
//! A KieApp selects an environment (trial, authoring, production, ...) and
//! layers per-tier overrides on top of it. The controller turns it into
//! DeploymentConfigs, Services, Routes, Secrets and the rest, and reports
//! progress through the status subresource.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    Condition, ConditionType, Deployments, EnvVar, EnvironmentType, ImageReference,
    ResourceRequirements,
};

/// Specification for a KieApp
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "app.kiegroup.org",
    version = "v2",
    kind = "KieApp",
    plural = "kieapps",
    shortname = "kieapp",
    namespaced,
    status = "KieAppStatus",
    printcolumn = r#"{"name":"Environment","type":"string","jsonPath":".spec.environment"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.version"}"#,
    printcolumn = r#"{"name":"Console","type":"string","jsonPath":".status.consoleHost"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KieAppSpec {
    /// Environment template to deploy
    #[serde(default)]
    pub environment: EnvironmentType,

    /// Product version; defaults to the operator's current version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Automatic product upgrade policy
    #[serde(default)]
    pub upgrades: KieAppUpgrades,

    /// Registry to pull product images from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_registry: Option<KieAppRegistry>,

    /// Per-tier overrides
    #[serde(default)]
    pub objects: KieAppObjects,

    /// Values shared by every template
    #[serde(default)]
    pub common_config: CommonConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: KieAppAuthObject,
}

/// Automatic upgrade policy
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KieAppUpgrades {
    /// Allow micro version upgrades (7.5.0 -> 7.5.1)
    #[serde(default)]
    pub enabled: bool,
    /// Also allow minor version upgrades (7.5.x -> 7.6.y); requires `enabled`
    #[serde(default)]
    pub minor: bool,
}

/// Image registry settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KieAppRegistry {
    /// Registry host, e.g. `registry.redhat.io`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    /// Whether the registry is insecure
    #[serde(default)]
    pub insecure: bool,
}

/// Per-tier overrides
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KieAppObjects {
    /// Console (business/decision central)
    #[serde(default)]
    pub console: KieAppObject,
    /// KIE server sets, in deployment order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<KieServerSet>,
    /// Smart router
    #[serde(default)]
    pub smart_router: KieAppObject,
}

/// Overrides for a single tier
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KieAppObject {
    /// Extra environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Compute resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Existing keystore secret; when set no keystore is generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_secret: Option<String>,
}

/// A set of identically configured KIE servers
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KieServerSet {
    /// Number of server deployments in this set (defaults to 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployments: Option<u32>,
    /// Server id for the set; replicas past the first get a suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Image to run instead of the product default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ImageReference>,
    /// Build the server image from source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<KieAppBuildObject>,
    /// Extra environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    /// Compute resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Existing keystore secret; when set no keystore is generated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_secret: Option<String>,
}

/// Source build configuration for a server set
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KieAppBuildObject {
    /// Container deployment, `containerId=groupId:artifactId:version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kie_server_container_deployment: Option<String>,
    /// Git repository holding the sources
    #[serde(default)]
    pub git_source: GitSource,
    /// Maven mirror used during the build
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "mavenMirrorURL")]
    pub maven_mirror_url: Option<String>,
    /// Directory holding the built artifacts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<String>,
    /// Webhook secrets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webhooks: Vec<WebhookSecret>,
    /// Builder image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ImageReference>,
}

/// Git source location
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    /// Repository URI
    #[serde(default)]
    pub uri: String,
    /// Branch, tag or commit
    #[serde(default)]
    pub reference: String,
    /// Sub-directory holding the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,
}

/// Type of build webhook
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum WebhookType {
    /// GitHub webhook
    GitHub,
    /// Generic webhook
    Generic,
}

/// Webhook secret for a build trigger
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSecret {
    /// Webhook type
    #[serde(rename = "type")]
    pub type_: WebhookType,
    /// Shared secret
    pub secret: String,
}

/// Values shared by every template
///
/// Unset passwords and the application name are filled in by the controller
/// on the first pass and written back to the spec.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommonConfig {
    /// Application name; defaults to the KieApp name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,
    /// Image tag of the product images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
    /// Keystore password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_store_password: Option<String>,
    /// Console admin user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_user: Option<String>,
    /// Console admin password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    /// Password the servers use to reach the console controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_password: Option<String>,
    /// Password the console uses to reach the servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_password: Option<String>,
    /// Password of the console maven repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maven_password: Option<String>,
}

/// Authentication configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KieAppAuthObject {
    /// Single sign-on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso: Option<SsoAuthConfig>,
    /// LDAP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldap: Option<LdapAuthConfig>,
    /// Role mapping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_mapper: Option<RoleMapperAuthConfig>,
}

/// Single sign-on configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SsoAuthConfig {
    /// SSO server URL
    pub url: String,
    /// Realm
    pub realm: String,
    /// Admin user allowed to register clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_user: Option<String>,
    /// Admin password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    /// Skip TLS verification of the SSO server
    #[serde(default)]
    pub disable_ssl_cert_validation: bool,
    /// Attribute used as principal name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_attribute: Option<String>,
}

/// LDAP configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LdapAuthConfig {
    /// LDAP server URL
    pub url: String,
    /// Bind DN
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "bindDN")]
    pub bind_dn: Option<String>,
    /// Bind credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_credential: Option<String>,
    /// Base context DN for user searches
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "baseCtxDN")]
    pub base_ctx_dn: Option<String>,
    /// Filter for user searches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_filter: Option<String>,
    /// Role attribute
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "roleAttributeID")]
    pub role_attribute_id: Option<String>,
}

/// Role mapping configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleMapperAuthConfig {
    /// Path of the roles properties file
    pub roles_properties: String,
    /// Replace roles instead of adding to them
    #[serde(default)]
    pub replace_role: bool,
}

/// Status for a KieApp, written only by the controller
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KieAppStatus {
    /// Condition history, newest last
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// URL of the console
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_host: Option<String>,

    /// Workload progress
    #[serde(default)]
    pub deployments: Deployments,

    /// Product version currently deployed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl KieAppStatus {
    /// The newest condition, if any
    pub fn last_condition(&self) -> Option<&Condition> {
        self.conditions.last()
    }

    /// True when the newest condition has the given type
    pub fn is(&self, type_: ConditionType) -> bool {
        self.last_condition().is_some_and(|c| c.type_ == type_)
    }
}

impl KieApp {
    /// Application name used in templates, the KieApp name unless overridden
    pub fn application_name(&self) -> String {
        self.spec
            .common_config
            .application_name
            .clone()
            .unwrap_or_else(|| kube::ResourceExt::name_any(self))
    }
}
