//! CustomObject and Environment, the assembled object model
//!
//! Templates may mark an object for deletion with the `delete: "true"`
//! annotation. The annotation is read once, when the object is parsed, and
//! turned into [`Tracked::PendingDelete`]; it never reaches the cluster.

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::openshift::{BuildConfig, DeploymentConfig, ImageStream, Route};
use super::{group_by_kind, KieResource, Resource, ResourceMap};

/// Annotation marking an overlay object as a deletion of its baseline counterpart
pub const DELETE_ANNOTATION: &str = "delete";

// =============================================================================
// Tracked
// =============================================================================

/// An object in a template, either live or marking a deletion
#[derive(Clone, Debug, PartialEq)]
pub enum Tracked<T> {
    /// A requested object
    Live(T),
    /// Removes the baseline object with the same name; never deployed
    PendingDelete(T),
}

impl<T: KieResource> Tracked<T> {
    /// Classify a parsed object, stripping the delete annotation
    pub fn classify(mut object: T) -> Self {
        let meta = object.meta_mut();
        let marker = meta
            .annotations
            .as_mut()
            .and_then(|annotations| annotations.remove(DELETE_ANNOTATION));
        if meta.annotations.as_ref().is_some_and(|a| a.is_empty()) {
            meta.annotations = None;
        }
        match marker.as_deref() {
            Some("true") => Tracked::PendingDelete(object),
            _ => Tracked::Live(object),
        }
    }

    /// Name of the wrapped object
    pub fn name(&self) -> &str {
        self.inner().name()
    }

    /// True unless the object marks a deletion
    pub fn is_live(&self) -> bool {
        matches!(self, Tracked::Live(_))
    }

    /// The object, if live
    pub fn live(&self) -> Option<&T> {
        match self {
            Tracked::Live(object) => Some(object),
            Tracked::PendingDelete(_) => None,
        }
    }

    /// The wrapped object regardless of state
    pub fn inner(&self) -> &T {
        match self {
            Tracked::Live(object) | Tracked::PendingDelete(object) => object,
        }
    }

    /// Unwrap regardless of state
    pub fn into_inner(self) -> T {
        match self {
            Tracked::Live(object) | Tracked::PendingDelete(object) => object,
        }
    }
}

impl<T: KieResource> From<T> for Tracked<T> {
    fn from(object: T) -> Self {
        Tracked::Live(object)
    }
}

impl<'de, T: KieResource> Deserialize<'de> for Tracked<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Tracked::classify)
    }
}

impl<T: KieResource> Serialize for Tracked<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tracked::Live(object) => object.serialize(serializer),
            Tracked::PendingDelete(object) => {
                let mut marked = object.clone();
                marked
                    .meta_mut()
                    .annotations
                    .get_or_insert_with(Default::default)
                    .insert(DELETE_ANNOTATION.to_string(), "true".to_string());
                marked.serialize(serializer)
            }
        }
    }
}

// =============================================================================
// CustomObject
// =============================================================================

/// The objects of one tier, grouped by kind
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomObject {
    /// The whole tier is intentionally absent
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub omit: bool,
    /// PersistentVolumeClaims
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub persistent_volume_claims: Vec<Tracked<PersistentVolumeClaim>>,
    /// ServiceAccounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_accounts: Vec<Tracked<ServiceAccount>>,
    /// Secrets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<Tracked<Secret>>,
    /// Roles
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Tracked<Role>>,
    /// RoleBindings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_bindings: Vec<Tracked<RoleBinding>>,
    /// DeploymentConfigs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployment_configs: Vec<Tracked<DeploymentConfig>>,
    /// BuildConfigs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_configs: Vec<Tracked<BuildConfig>>,
    /// ImageStreams
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_streams: Vec<Tracked<ImageStream>>,
    /// Services
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Tracked<Service>>,
    /// StatefulSets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stateful_sets: Vec<Tracked<StatefulSet>>,
    /// Routes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Tracked<Route>>,
}

fn live_resources<T: KieResource>(list: &[Tracked<T>], out: &mut Vec<Resource>) {
    out.extend(list.iter().filter_map(Tracked::live).cloned().map(T::into_resource));
}

impl CustomObject {
    /// Live objects of every kind; pending deletions are left out
    pub fn resources(&self) -> Vec<Resource> {
        let mut out = Vec::new();
        live_resources(&self.persistent_volume_claims, &mut out);
        live_resources(&self.service_accounts, &mut out);
        live_resources(&self.secrets, &mut out);
        live_resources(&self.roles, &mut out);
        live_resources(&self.role_bindings, &mut out);
        live_resources(&self.deployment_configs, &mut out);
        live_resources(&self.build_configs, &mut out);
        live_resources(&self.image_streams, &mut out);
        live_resources(&self.services, &mut out);
        live_resources(&self.stateful_sets, &mut out);
        live_resources(&self.routes, &mut out);
        out
    }

    /// True when no list holds anything
    pub fn is_empty(&self) -> bool {
        self.persistent_volume_claims.is_empty()
            && self.service_accounts.is_empty()
            && self.secrets.is_empty()
            && self.roles.is_empty()
            && self.role_bindings.is_empty()
            && self.deployment_configs.is_empty()
            && self.build_configs.is_empty()
            && self.image_streams.is_empty()
            && self.services.is_empty()
            && self.stateful_sets.is_empty()
            && self.routes.is_empty()
    }
}

// =============================================================================
// Environment
// =============================================================================

/// A complete environment: console, smart router, one object per server and extras
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Console tier
    #[serde(default)]
    pub console: CustomObject,
    /// Smart router tier
    #[serde(default)]
    pub smart_router: CustomObject,
    /// One entry per server replica, in server-set order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<CustomObject>,
    /// Anything else the environment needs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub others: Vec<CustomObject>,
}

impl Environment {
    /// Tiers in deployment order
    pub fn tiers(&self) -> impl Iterator<Item = &CustomObject> {
        std::iter::once(&self.console)
            .chain(std::iter::once(&self.smart_router))
            .chain(self.servers.iter())
            .chain(self.others.iter())
    }

    /// Mutable tiers in deployment order
    pub fn tiers_mut(&mut self) -> impl Iterator<Item = &mut CustomObject> {
        std::iter::once(&mut self.console)
            .chain(std::iter::once(&mut self.smart_router))
            .chain(self.servers.iter_mut())
            .chain(self.others.iter_mut())
    }

    /// Every live object of every tier that is not omitted
    pub fn resources(&self) -> Vec<Resource> {
        self.tiers()
            .filter(|tier| !tier.omit)
            .flat_map(CustomObject::resources)
            .collect()
    }

    /// The requested object set, grouped by kind
    pub fn requested(&self) -> ResourceMap {
        group_by_kind(self.resources())
    }
}
