//! Resource Model
//!
//! Typed, name-identified representations of the object kinds an environment
//! deploys. Core kinds use the k8s-openapi types, OpenShift kinds come from
//! [`openshift`]. Every kind implements [`KieResource`], which is all the
//! merge and diff engines need to know about it.

mod environment;
pub mod openshift;

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use kie_common::kube_utils::build_api_resource;
use kie_common::{Error, Result};

pub use environment::{CustomObject, Environment, Tracked, DELETE_ANNOTATION};
pub use openshift::{BuildConfig, DeploymentConfig, ImageStream, ImageStreamTag, Route};

/// Live or requested objects grouped by kind
pub type ResourceMap = BTreeMap<ResourceKind, Vec<Resource>>;

/// A deployable object kind with a name identity.
pub trait KieResource: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The kind tag
    const KIND: ResourceKind;

    /// Object metadata
    fn meta(&self) -> &ObjectMeta;

    /// Mutable object metadata
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// Wrap into the kind-erased [`Resource`]
    fn into_resource(self) -> Resource;

    /// Identity within the kind and namespace
    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }
}

macro_rules! resource_kinds {
    ($($kind:ident => $ty:ty, $api_version:literal;)+) => {
        /// Kind tag of a deployable object
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum ResourceKind {
            $(
                #[doc = concat!("`", stringify!($kind), "`")]
                $kind,
            )+
        }

        impl ResourceKind {
            /// Every kind, in apply order
            pub const ALL: &'static [ResourceKind] = &[$(ResourceKind::$kind),+];

            /// Kind name as the API server spells it
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$kind => stringify!($kind),)+
                }
            }

            /// `apiVersion` of the kind
            pub fn api_version(&self) -> &'static str {
                match self {
                    $(Self::$kind => $api_version,)+
                }
            }
        }

        /// A deployable object of any kind
        #[derive(Clone, Debug, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum Resource {
            $(
                #[doc = concat!("A `", stringify!($kind), "`")]
                $kind($ty),
            )+
        }

        impl Resource {
            /// The kind tag
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $(Self::$kind(_) => ResourceKind::$kind,)+
                }
            }

            /// Object metadata
            pub fn meta(&self) -> &ObjectMeta {
                match self {
                    $(Self::$kind(r) => &r.metadata,)+
                }
            }

            /// Mutable object metadata
            pub fn meta_mut(&mut self) -> &mut ObjectMeta {
                match self {
                    $(Self::$kind(r) => &mut r.metadata,)+
                }
            }

            /// Deserialize a JSON object of the given kind
            pub fn from_value(kind: ResourceKind, mut value: serde_json::Value) -> Result<Self> {
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("apiVersion".into(), kind.api_version().into());
                    obj.insert("kind".into(), kind.as_str().into());
                }
                let resource = match kind {
                    $(ResourceKind::$kind => Self::$kind(
                        serde_json::from_value(value)
                            .map_err(|e| Error::serialization_for_kind(kind.as_str(), e.to_string()))?,
                    ),)+
                };
                Ok(resource)
            }
        }

        $(
            impl KieResource for $ty {
                const KIND: ResourceKind = ResourceKind::$kind;

                fn meta(&self) -> &ObjectMeta {
                    &self.metadata
                }

                fn meta_mut(&mut self) -> &mut ObjectMeta {
                    &mut self.metadata
                }

                fn into_resource(self) -> Resource {
                    Resource::$kind(self)
                }
            }
        )+
    };
}

resource_kinds! {
    PersistentVolumeClaim => PersistentVolumeClaim, "v1";
    ServiceAccount => ServiceAccount, "v1";
    Secret => Secret, "v1";
    Role => Role, "rbac.authorization.k8s.io/v1";
    RoleBinding => RoleBinding, "rbac.authorization.k8s.io/v1";
    DeploymentConfig => DeploymentConfig, "apps.openshift.io/v1";
    BuildConfig => BuildConfig, "build.openshift.io/v1";
    ImageStream => ImageStream, "image.openshift.io/v1";
    Service => Service, "v1";
    StatefulSet => StatefulSet, "apps/v1";
    Route => Route, "route.openshift.io/v1";
}

impl ResourceKind {
    /// API resource used to reach the kind through `DynamicObject`
    pub fn api_resource(&self) -> ApiResource {
        build_api_resource(self.api_version(), self.as_str())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Resource {
    /// Identity within the kind and namespace
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// Namespace, when set
    pub fn namespace(&self) -> Option<&str> {
        self.meta().namespace.as_deref()
    }

    /// Serialize to JSON, `apiVersion` and `kind` included
    pub fn to_value(&self) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| Error::serialization_for_kind(self.kind().as_str(), e.to_string()))?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("apiVersion".into(), self.kind().api_version().into());
            obj.insert("kind".into(), self.kind().as_str().into());
        }
        Ok(value)
    }

    /// Convert to a `DynamicObject` for the kube client
    pub fn to_dynamic(&self) -> Result<DynamicObject> {
        serde_json::from_value(self.to_value()?)
            .map_err(|e| Error::serialization_for_kind(self.kind().as_str(), e.to_string()))
    }

    /// Convert a `DynamicObject` listed for `kind`
    pub fn from_dynamic(kind: ResourceKind, obj: DynamicObject) -> Result<Self> {
        let value = serde_json::to_value(obj)
            .map_err(|e| Error::serialization_for_kind(kind.as_str(), e.to_string()))?;
        Self::from_value(kind, value)
    }
}

/// Group resources by kind, keeping their order within a kind
pub fn group_by_kind(resources: impl IntoIterator<Item = Resource>) -> ResourceMap {
    let mut map = ResourceMap::new();
    for resource in resources {
        map.entry(resource.kind()).or_default().push(resource);
    }
    map
}
