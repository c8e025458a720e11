//! Custom Resource Definitions for the KieApp operator

mod kieapp;
mod legacy;
mod types;

pub use kieapp::{
    CommonConfig, GitSource, KieApp, KieAppAuthObject, KieAppBuildObject, KieAppObject,
    KieAppObjects, KieAppRegistry, KieAppSpec, KieAppStatus, KieAppUpgrades, KieServerSet,
    LdapAuthConfig, RoleMapperAuthConfig, SsoAuthConfig, WebhookSecret, WebhookType,
};
pub use legacy::{
    CommonKieServerSet, LegacyCommonConfig, LegacyKieApp, LegacyKieAppObjects, LegacyKieAppSpec,
    LegacyKieAppStatus, LegacyUpgrades,
};
pub use types::{
    AppConstants, Condition, ConditionStatus, ConditionType, Deployments, EnvVar, EnvironmentType,
    ImageReference, ReasonType, ResourceRequirements,
};
