//! Template context
//!
//! Values available to configuration templates. Field names are camelCase
//! in templates:
//! - `${applicationName}`, `${product}`, `${version}`, `${minorVersion}`, `${imageTag}`
//! - `${adminUser}`, `${adminPassword}` and the other passwords
//! - `${console.name}`, `${console.imageName}`, `${console.probePage}`
//! - `${smartRouter.keystoreSecret}`
//! - `{% for server in servers %}` with `server.kieServerId`, `server.from`, `server.build`
//! - `${registry.registry}`, `${registry.insecure}`
//! - `{% if auth.sso %}`, `{% if auth.ldap %}`, `{% if auth.roleMapper %}`

use serde::Serialize;

use kie_common::crd::{GitSource, LdapAuthConfig, RoleMapperAuthConfig, SsoAuthConfig};

/// Everything a configuration template can reference
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvTemplate {
    /// Application name, the prefix of every object name
    pub application_name: String,
    /// `rhpam` or `rhdm`
    pub product: String,
    /// Product version, e.g. `7.5.1`
    pub version: String,
    /// Major and minor digits, e.g. `75`, used in image names
    pub minor_version: String,
    /// Tag of the product images
    pub image_tag: String,
    /// Maven repository name of the console
    pub maven_repo: String,
    /// Keystore password
    pub key_store_password: String,
    /// Console admin user
    pub admin_user: String,
    /// Console admin password
    pub admin_password: String,
    /// Password the servers use to reach the console controller
    pub controller_password: String,
    /// Password the console uses to reach the servers
    pub server_password: String,
    /// Password of the console maven repository
    pub maven_password: String,
    /// Image registry
    pub registry: RegistryTemplate,
    /// Console values
    pub console: ConsoleTemplate,
    /// Smart router values
    pub smart_router: SmartRouterTemplate,
    /// One entry per server replica, in deployment order
    pub servers: Vec<ServerTemplate>,
    /// Authentication configuration
    pub auth: AuthTemplate,
}

/// Authentication sections; absent ones render as `none`
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthTemplate {
    /// Single sign-on
    pub sso: Option<SsoAuthConfig>,
    /// LDAP
    pub ldap: Option<LdapAuthConfig>,
    /// Role mapping
    pub role_mapper: Option<RoleMapperAuthConfig>,
}

/// Image registry
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryTemplate {
    /// Registry host
    pub registry: String,
    /// Whether the registry is insecure
    pub insecure: bool,
}

/// Console values
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleTemplate {
    /// Name suffix of the console objects, e.g. `rhpamcentr`
    pub name: String,
    /// Image name, e.g. `businesscentral`
    pub image_name: String,
    /// Readiness probe page
    pub probe_page: String,
    /// Secret holding the console keystore
    pub keystore_secret: String,
}

/// Smart router values
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SmartRouterTemplate {
    /// Secret holding the smart router keystore
    pub keystore_secret: String,
}

/// Values for one server replica
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerTemplate {
    /// Server id, also the name of its objects
    pub kie_server_id: String,
    /// Image the server runs
    pub from: ImageTemplate,
    /// Source build, when the image is built locally
    pub build: Option<BuildTemplate>,
    /// Secret holding the server keystore
    pub keystore_secret: String,
}

/// Image reference
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageTemplate {
    /// `ImageStreamTag` or `DockerImage`
    pub kind: String,
    /// Image name
    pub name: String,
    /// Namespace of the image stream, empty for the application namespace
    pub namespace: String,
}

/// Source build values
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildTemplate {
    /// Git source
    pub git_source: GitSource,
    /// GitHub webhook secret
    pub github_webhook_secret: String,
    /// Generic webhook secret
    pub generic_webhook_secret: String,
    /// Container deployment, `containerId=groupId:artifactId:version`
    pub kie_server_container_deployment: String,
    /// Maven mirror used during the build
    #[serde(rename = "mavenMirrorURL")]
    pub maven_mirror_url: String,
    /// Directory holding the built artifacts
    pub artifact_dir: String,
    /// Builder image
    pub from: ImageTemplate,
    /// Image stream the build pushes to
    pub image_stream_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_serializes_with_template_names() {
        let ctx = EnvTemplate {
            application_name: "demo".into(),
            minor_version: "76".into(),
            servers: vec![ServerTemplate {
                kie_server_id: "demo-kieserver-0".into(),
                build: Some(BuildTemplate {
                    maven_mirror_url: "https://nexus".into(),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["applicationName"], "demo");
        assert_eq!(json["minorVersion"], "76");
        assert_eq!(json["servers"][0]["kieServerId"], "demo-kieserver-0");
        assert_eq!(json["servers"][0]["build"]["mavenMirrorURL"], "https://nexus");
        assert!(json["auth"]["sso"].is_null());
    }
}
