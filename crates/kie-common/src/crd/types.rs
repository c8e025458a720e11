//! Supporting types shared by the KieApp schema versions

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::TRIAL_ENV_SUFFIX;

/// Environment a KieApp deploys, selecting the overlay template
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentType {
    /// Process automation, trial (ephemeral, default passwords)
    #[default]
    RhpamTrial,
    /// Process automation, production with monitoring console
    RhpamProduction,
    /// Process automation, immutable production servers
    RhpamProductionImmutable,
    /// Process automation, authoring
    RhpamAuthoring,
    /// Process automation, highly available authoring
    RhpamAuthoringHa,
    /// Decision management, trial
    RhdmTrial,
    /// Decision management, authoring
    RhdmAuthoring,
    /// Decision management, highly available authoring
    RhdmAuthoringHa,
    /// Decision management with optaweb, trial
    RhdmOptawebTrial,
    /// Decision management, immutable production servers
    RhdmProductionImmutable,
}

/// Product constants attached to an environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConstants {
    /// Product short name, used in image names
    pub product: &'static str,
    /// Prefix of the console objects
    pub prefix: &'static str,
    /// Console image name
    pub image_name: &'static str,
    /// Maven repository id exposed by the console
    pub maven_repo: &'static str,
    /// Console readiness probe page
    pub console_probe_page: &'static str,
}

const RHPAM_CONSTANTS: AppConstants = AppConstants {
    product: "rhpam",
    prefix: "rhpamcentr",
    image_name: "businesscentral",
    maven_repo: "RHPAMCENTR",
    console_probe_page: "/kie-wb.jsp",
};

const RHPAM_MONITORING_CONSTANTS: AppConstants = AppConstants {
    product: "rhpam",
    prefix: "rhpamcentrmon",
    image_name: "businesscentral-monitoring",
    maven_repo: "RHPAMCENTR",
    console_probe_page: "/kie-wb.jsp",
};

const RHDM_CONSTANTS: AppConstants = AppConstants {
    product: "rhdm",
    prefix: "rhdmcentr",
    image_name: "decisioncentral",
    maven_repo: "RHDMCENTR",
    console_probe_page: "/kie-wb.jsp",
};

impl EnvironmentType {
    /// Every environment, in declaration order
    pub const ALL: [EnvironmentType; 10] = [
        Self::RhpamTrial,
        Self::RhpamProduction,
        Self::RhpamProductionImmutable,
        Self::RhpamAuthoring,
        Self::RhpamAuthoringHa,
        Self::RhdmTrial,
        Self::RhdmAuthoring,
        Self::RhdmAuthoringHa,
        Self::RhdmOptawebTrial,
        Self::RhdmProductionImmutable,
    ];

    /// Name used in the CR and as the overlay file name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RhpamTrial => "rhpam-trial",
            Self::RhpamProduction => "rhpam-production",
            Self::RhpamProductionImmutable => "rhpam-production-immutable",
            Self::RhpamAuthoring => "rhpam-authoring",
            Self::RhpamAuthoringHa => "rhpam-authoring-ha",
            Self::RhdmTrial => "rhdm-trial",
            Self::RhdmAuthoring => "rhdm-authoring",
            Self::RhdmAuthoringHa => "rhdm-authoring-ha",
            Self::RhdmOptawebTrial => "rhdm-optaweb-trial",
            Self::RhdmProductionImmutable => "rhdm-production-immutable",
        }
    }

    /// Trial environments fill unset passwords with the default password
    pub fn is_trial(&self) -> bool {
        self.as_str().ends_with(TRIAL_ENV_SUFFIX)
    }

    /// Product constants for this environment
    pub fn constants(&self) -> &'static AppConstants {
        match self {
            Self::RhpamTrial | Self::RhpamAuthoring | Self::RhpamAuthoringHa => &RHPAM_CONSTANTS,
            Self::RhpamProduction | Self::RhpamProductionImmutable => &RHPAM_MONITORING_CONSTANTS,
            Self::RhdmTrial
            | Self::RhdmAuthoring
            | Self::RhdmAuthoringHa
            | Self::RhdmOptawebTrial
            | Self::RhdmProductionImmutable => &RHDM_CONSTANTS,
        }
    }
}

impl std::str::FromStr for EnvironmentType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| {
                crate::Error::configuration_in("spec.environment", format!("unknown environment: {s}"))
            })
    }
}

impl std::fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kind of condition recorded on a KieApp
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionType {
    /// Every requested object exists and matches
    Deployed,
    /// Objects were created, updated or removed in the last pass
    Provisioning,
    /// The last pass failed
    Failed,
}

/// Machine-readable reason attached to a condition
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ReasonType {
    /// Applying objects to the cluster failed
    DeploymentFailed,
    /// The spec or a template is invalid
    ConfigurationError,
    /// Local configuration changes block a product upgrade
    UpgradeConflict,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for ReasonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeploymentFailed => write!(f, "DeploymentFailed"),
            Self::ConfigurationError => write!(f, "ConfigurationError"),
            Self::UpgradeConflict => write!(f, "UpgradeConflict"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for KieApp status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: ConditionType,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason, set on failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonType>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(type_: ConditionType, status: ConditionStatus) -> Self {
        Self {
            type_,
            status,
            reason: None,
            message: None,
            last_transition_time: Utc::now(),
        }
    }

    /// Attach a reason and message
    pub fn with_reason(mut self, reason: ReasonType, message: impl Into<String>) -> Self {
        self.reason = Some(reason);
        self.message = Some(message.into());
        self
    }
}

/// Workload progress derived from the live DeploymentConfigs
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Deployments {
    /// Scaled to zero
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stopped: Vec<String>,
    /// Fewer ready replicas than requested
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub starting: Vec<String>,
    /// All requested replicas ready
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ready: Vec<String>,
}

/// Environment variable passed to a tier
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct EnvVar {
    /// Variable name
    pub name: String,
    /// Variable value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Compute resources for a tier, as quantity strings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ResourceRequirements {
    /// Resource limits (e.g., `memory: 2Gi`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,
    /// Resource requests
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
}

/// Reference to an image, usually an ImageStreamTag
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    /// Kind of the referenced object (ImageStreamTag, DockerImage)
    #[serde(default)]
    pub kind: String,
    /// Name of the referenced object
    #[serde(default)]
    pub name: String,
    /// Namespace of the referenced object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EnvironmentType::RhpamTrial, true)]
    #[case(EnvironmentType::RhdmTrial, true)]
    #[case(EnvironmentType::RhdmOptawebTrial, true)]
    #[case(EnvironmentType::RhpamProduction, false)]
    #[case(EnvironmentType::RhdmAuthoringHa, false)]
    fn trial_environments_are_detected_by_suffix(
        #[case] env: EnvironmentType,
        #[case] trial: bool,
    ) {
        assert_eq!(env.is_trial(), trial);
    }

    #[rstest]
    #[case(EnvironmentType::RhpamTrial, "rhpam", "businesscentral")]
    #[case(EnvironmentType::RhpamProduction, "rhpam", "businesscentral-monitoring")]
    #[case(EnvironmentType::RhdmAuthoring, "rhdm", "decisioncentral")]
    fn environments_map_to_product_constants(
        #[case] env: EnvironmentType,
        #[case] product: &str,
        #[case] image: &str,
    ) {
        assert_eq!(env.constants().product, product);
        assert_eq!(env.constants().image_name, image);
    }

    #[test]
    fn environment_names_round_trip_through_serde_and_from_str() {
        for env in EnvironmentType::ALL {
            let json = serde_json::to_value(env).unwrap();
            assert_eq!(json, env.as_str());
            assert_eq!(env.as_str().parse::<EnvironmentType>().unwrap(), env);
        }
    }

    #[test]
    fn unknown_environment_is_a_configuration_error() {
        let err = "rhpam-nope".parse::<EnvironmentType>().unwrap_err();
        assert_eq!(err.source_name(), Some("spec.environment"));
    }

    #[test]
    fn condition_serializes_with_kubernetes_field_names() {
        let cond = Condition::new(ConditionType::Failed, ConditionStatus::True)
            .with_reason(ReasonType::ConfigurationError, "bad template");
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json["type"], "Failed");
        assert_eq!(json["status"], "True");
        assert_eq!(json["reason"], "ConfigurationError");
        assert!(json.get("lastTransitionTime").is_some());
    }
}
