//! OpenShift resource types
//!
//! k8s-openapi has no OpenShift kinds, so the ones the environments use are
//! modelled here as plain serde types. Only the fields the controller reads
//! are typed; everything else is kept as opaque JSON so that nothing a
//! template sets is lost on the way to the API server.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ObjectReference, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use kie_common::kube_utils::HasApiResource;

/// Implements `default_api_version()` and `default_kind()` for serde defaults.
macro_rules! impl_api_defaults {
    ($type:ty) => {
        impl $type {
            fn default_api_version() -> String {
                <Self as HasApiResource>::API_VERSION.to_string()
            }
            fn default_kind() -> String {
                <Self as HasApiResource>::KIND.to_string()
            }
        }

        impl Default for $type {
            fn default() -> Self {
                Self::new(ObjectMeta::default(), Default::default())
            }
        }
    };
}

// =============================================================================
// DeploymentConfig
// =============================================================================

/// OpenShift DeploymentConfig (`apps.openshift.io/v1`)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// API version (apps.openshift.io/v1)
    #[serde(default = "DeploymentConfig::default_api_version")]
    pub api_version: String,
    /// Resource kind (DeploymentConfig)
    #[serde(default = "DeploymentConfig::default_kind")]
    pub kind: String,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired state
    #[serde(default)]
    pub spec: DeploymentConfigSpec,
    /// Observed state, filled in by the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeploymentConfigStatus>,
}

impl HasApiResource for DeploymentConfig {
    const API_VERSION: &'static str = "apps.openshift.io/v1";
    const KIND: &'static str = "DeploymentConfig";
}

impl_api_defaults!(DeploymentConfig);

impl DeploymentConfig {
    /// Create a DeploymentConfig
    pub fn new(metadata: ObjectMeta, spec: DeploymentConfigSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
            status: None,
        }
    }
}

/// DeploymentConfig spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    /// Desired replica count
    #[serde(default)]
    pub replicas: i32,
    /// Pod selector
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    /// Rollout strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Value>,
    /// Config and image change triggers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<DeploymentTriggerPolicy>,
    /// Pod template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
}

/// A DeploymentConfig trigger
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTriggerPolicy {
    /// `ConfigChange` or `ImageChange`
    #[serde(rename = "type")]
    pub type_: String,
    /// Image change parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_change_params: Option<Value>,
}

/// DeploymentConfig status
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigStatus {
    /// Total pods targeted
    #[serde(default)]
    pub replicas: i32,
    /// Pods passing their readiness probe
    #[serde(default)]
    pub ready_replicas: i32,
    /// Pods available for at least minReadySeconds
    #[serde(default)]
    pub available_replicas: i32,
    /// Latest rollout number
    #[serde(default)]
    pub latest_version: i64,
}

// =============================================================================
// BuildConfig
// =============================================================================

/// OpenShift BuildConfig (`build.openshift.io/v1`)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// API version (build.openshift.io/v1)
    #[serde(default = "BuildConfig::default_api_version")]
    pub api_version: String,
    /// Resource kind (BuildConfig)
    #[serde(default = "BuildConfig::default_kind")]
    pub kind: String,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Source, strategy, output and triggers
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
    /// Observed state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl HasApiResource for BuildConfig {
    const API_VERSION: &'static str = "build.openshift.io/v1";
    const KIND: &'static str = "BuildConfig";
}

impl_api_defaults!(BuildConfig);

impl BuildConfig {
    /// Create a BuildConfig
    pub fn new(metadata: ObjectMeta, spec: Value) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
            status: None,
        }
    }
}

// =============================================================================
// ImageStream
// =============================================================================

/// OpenShift ImageStream (`image.openshift.io/v1`)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageStream {
    /// API version (image.openshift.io/v1)
    #[serde(default = "ImageStream::default_api_version")]
    pub api_version: String,
    /// Resource kind (ImageStream)
    #[serde(default = "ImageStream::default_kind")]
    pub kind: String,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Tags and lookup policy
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
    /// Observed state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl HasApiResource for ImageStream {
    const API_VERSION: &'static str = "image.openshift.io/v1";
    const KIND: &'static str = "ImageStream";
}

impl_api_defaults!(ImageStream);

impl ImageStream {
    /// Create an ImageStream
    pub fn new(metadata: ObjectMeta, spec: Value) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
            status: None,
        }
    }
}

// =============================================================================
// ImageStreamTag
// =============================================================================

/// OpenShift ImageStreamTag (`image.openshift.io/v1`)
///
/// Not part of an environment; the controller creates these on demand so
/// that image change triggers have a tag to follow.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamTag {
    /// API version (image.openshift.io/v1)
    #[serde(default = "ImageStreamTag::default_api_version")]
    pub api_version: String,
    /// Resource kind (ImageStreamTag)
    #[serde(default = "ImageStreamTag::default_kind")]
    pub kind: String,
    /// Object metadata; the name is `<stream>:<tag>`
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Where the tag points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagReference>,
}

impl HasApiResource for ImageStreamTag {
    const API_VERSION: &'static str = "image.openshift.io/v1";
    const KIND: &'static str = "ImageStreamTag";
}

impl_api_defaults!(ImageStreamTag);

impl ImageStreamTag {
    /// Create an ImageStreamTag
    pub fn new(metadata: ObjectMeta, tag: Option<TagReference>) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            tag,
        }
    }
}

/// Tag of an image stream
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TagReference {
    /// Tag name
    pub name: String,
    /// Image the tag imports, e.g. a `DockerImage` pull spec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ObjectReference>,
    /// How pods reference the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_policy: Option<TagReferencePolicy>,
    /// How the image is imported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_policy: Option<TagImportPolicy>,
}

/// Tag reference policy
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagReferencePolicy {
    /// `Source` or `Local`
    #[serde(rename = "type")]
    pub type_: String,
}

/// Tag import policy
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagImportPolicy {
    /// Import from a registry without TLS verification
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insecure: bool,
}

// =============================================================================
// Route
// =============================================================================

/// OpenShift Route (`route.openshift.io/v1`)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// API version (route.openshift.io/v1)
    #[serde(default = "Route::default_api_version")]
    pub api_version: String,
    /// Resource kind (Route)
    #[serde(default = "Route::default_kind")]
    pub kind: String,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Route spec
    #[serde(default)]
    pub spec: RouteSpec,
    /// Observed state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl HasApiResource for Route {
    const API_VERSION: &'static str = "route.openshift.io/v1";
    const KIND: &'static str = "Route";
}

impl_api_defaults!(Route);

impl Route {
    /// Create a Route
    pub fn new(metadata: ObjectMeta, spec: RouteSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
            status: None,
        }
    }

    /// True when the route terminates TLS
    pub fn is_tls(&self) -> bool {
        self.spec.tls.is_some()
    }
}

/// Route spec
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Public host name; generated by the router when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Path prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Backend service
    #[serde(default)]
    pub to: RouteTargetReference,
    /// Target port on the backend service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
    /// TLS termination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

/// Route backend
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    /// Backend kind, always `Service`
    #[serde(default)]
    pub kind: String,
    /// Backend name
    #[serde(default)]
    pub name: String,
    /// Relative weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

/// Route target port
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Port name or number
    pub target_port: IntOrString,
}

/// Route TLS settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// `edge`, `passthrough` or `reencrypt`
    #[serde(default)]
    pub termination: String,
    /// What to do with plain HTTP traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,
}
