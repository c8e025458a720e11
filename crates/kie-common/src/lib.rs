//! Common types for the KieApp operator: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod kube_utils;
pub mod yaml;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Version of the operator binary, stamped on the ConfigMaps it creates
pub const OPERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// API group shared by every KieApp schema version
pub const KIEAPP_GROUP: &str = "app.kiegroup.org";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "kie-cloud-operator";

/// Prefix of the ConfigMaps holding per-version configuration templates
pub const CONFIG_MAP_PREFIX: &str = "kieconfigs";

/// Number of KIE server deployments created for a server set that does not say
pub const DEFAULT_KIE_DEPLOYMENTS: u32 = 1;

/// Suffix shared by the trial environments, which use default passwords
pub const TRIAL_ENV_SUFFIX: &str = "trial";

/// Password used in trial environments when none is given
pub const DEFAULT_PASSWORD: &str = "RedHat";

/// Registry images are pulled from when the spec does not name one
pub const DEFAULT_IMAGE_REGISTRY: &str = "registry.redhat.io";

/// Namespace holding the product ImageStreams
pub const IMAGE_STREAM_NAMESPACE: &str = "openshift";

/// Tag of the product ImageStreams
pub const IMAGE_STREAM_TAG: &str = "1.0";

/// Pattern for keystore secret names, `{}` is replaced by the tier name
pub const KEYSTORE_SECRET_PATTERN: &str = "{}-app-secret";

/// Key of the keystore payload inside a keystore secret
pub const KEYSTORE_SECRET_KEY: &str = "keystore.pem";

/// Label carried by every object the operator generates
pub const LABEL_APPLICATION: &str = "application";

/// Label the KIE server puts on the ConfigMap recording its state
pub const KIE_SERVER_STATE_LABEL: &str = "services.server.kie.org/kie-server-state";

/// State of a server ConfigMap whose server has been scaled to zero
pub const KIE_SERVER_DETACHED: &str = "DETACHED";

/// Build the keystore secret name for a tier
pub fn keystore_secret_name(tier: &str) -> String {
    KEYSTORE_SECRET_PATTERN.replace("{}", tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keystore_secret_name_follows_pattern() {
        assert_eq!(
            keystore_secret_name("demo-businesscentral"),
            "demo-businesscentral-app-secret"
        );
    }
}
