//! Shared Kubernetes utilities using kube-rs

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{Api, Patch, PatchParams};
use kube::discovery::ApiResource;
use kube::Client;

// =============================================================================
// HasApiResource Trait
// =============================================================================

/// Trait for types that have a known API group, version, and kind.
///
/// Implemented by the OpenShift kinds the controller manages, which have no
/// `kube::Resource` implementation of their own and are accessed through
/// `DynamicObject`.
///
/// ```ignore
/// impl HasApiResource for Route {
///     const API_VERSION: &'static str = "route.openshift.io/v1";
///     const KIND: &'static str = "Route";
/// }
///
/// let ar = Route::api_resource();
/// ```
pub trait HasApiResource {
    /// Full API version (e.g., "apps.openshift.io/v1", "v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "DeploymentConfig")
    const KIND: &'static str;

    /// Build an ApiResource from the type's constants.
    fn api_resource() -> ApiResource {
        build_api_resource(Self::API_VERSION, Self::KIND)
    }
}

/// Build an ApiResource from an apiVersion and kind.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Split an apiVersion into (group, version); the core group is empty.
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

const KIND_PLURALS: &[(&str, &str)] = &[
    ("imagestream", "imagestreams"),
    ("deploymentconfig", "deploymentconfigs"),
    ("buildconfig", "buildconfigs"),
    ("persistentvolumeclaim", "persistentvolumeclaims"),
    ("rolebinding", "rolebindings"),
];

/// Pluralize a Kubernetes resource kind
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if let Some((_, plural)) = KIND_PLURALS.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

// =============================================================================
// Owner references
// =============================================================================

/// True when any owner reference on the object points at `uid`.
pub fn is_owned_by(meta: &ObjectMeta, uid: &str) -> bool {
    meta.owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|r| r.uid == uid)
}

/// True when the controller owner reference on the object points at `uid`.
pub fn is_controlled_by(meta: &ObjectMeta, uid: &str) -> bool {
    meta.owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|r| r.uid == uid && r.controller == Some(true))
}

/// Make `owner` the controller of the object.
///
/// Any other controller reference is kept as a plain owner reference so the
/// object stays attached to it. Returns false when `owner` already was the
/// controller and nothing changed.
pub fn set_controller_reference(meta: &mut ObjectMeta, owner: OwnerReference) -> bool {
    if is_controlled_by(meta, &owner.uid) {
        return false;
    }
    let refs = meta.owner_references.get_or_insert_with(Vec::new);
    for existing in refs.iter_mut() {
        if existing.controller == Some(true) {
            existing.controller = Some(false);
        }
    }
    refs.retain(|r| r.uid != owner.uid);
    refs.push(OwnerReference {
        controller: Some(true),
        block_owner_deletion: Some(true),
        ..owner
    });
    true
}

// =============================================================================
// Status
// =============================================================================

/// Patch the status sub-resource of a namespaced Kubernetes resource.
///
/// Serializes `status` into `{ "status": <status> }` and sends it as a merge
/// patch. Returns `kube::Error` so callers can map to their own error type.
pub async fn patch_resource_status<T>(
    client: &Client,
    name: &str,
    namespace: &str,
    status: &impl serde::Serialize,
    field_manager: &str,
) -> std::result::Result<(), kube::Error>
where
    T: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + Clone
        + serde::de::DeserializeOwned
        + std::fmt::Debug,
    <T as kube::Resource>::DynamicType: Default,
{
    let api: Api<T> = Api::namespaced(client.clone(), namespace);
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::apply(field_manager), &Patch::Merge(&patch))
        .await?;
    Ok(())
}
