//! Configuration sources
//!
//! Templates are addressed by version and path (`common.yaml`,
//! `envs/rhpam-trial.yaml`). The first path segment is the configuration
//! unit; in cluster every (version, unit) pair is stored as one ConfigMap
//! named `kieconfigs-<version>-<unit>` with one key per file.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use kie_common::CONFIG_MAP_PREFIX;

use crate::versions::Snapshot;

/// Unit holding the baseline template
pub const COMMON_UNIT: &str = "common";

/// Unit holding the per-environment overlays
pub const ENVS_UNIT: &str = "envs";

/// Path of the baseline template
pub const COMMON_TEMPLATE: &str = "common.yaml";

/// Path of the overlay template for an environment
pub fn env_template_path(environment: &str) -> String {
    format!("{}/{}.yaml", ENVS_UNIT, environment)
}

/// Split a template path into its unit and file name
pub fn template_location(path: &str) -> (&str, &str) {
    match path.split_once('/') {
        Some((unit, file)) => (unit, file),
        None => (path.strip_suffix(".yaml").unwrap_or(path), path),
    }
}

/// Name of the ConfigMap holding one unit of one version
pub fn config_map_name(version: &str, unit: &str) -> String {
    format!("{}-{}-{}", CONFIG_MAP_PREFIX, version, unit)
}

/// Error type for configuration sources
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The unit or the file inside it does not exist
    #[error("{path} does not exist for version {version}")]
    NotFound {
        /// Product version
        version: String,
        /// Template path
        path: String,
    },
    /// The unit exists but could not be read
    #[error("{path} for version {version} cannot be read: {message}")]
    Unreadable {
        /// Product version
        version: String,
        /// Template path
        path: String,
        /// Underlying failure
        message: String,
    },
}

impl SourceError {
    /// Create a not found error
    pub fn not_found(version: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotFound {
            version: version.into(),
            path: path.into(),
        }
    }

    /// Create an unreadable error
    pub fn unreadable(
        version: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Unreadable {
            version: version.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<SourceError> for kie_common::Error {
    fn from(err: SourceError) -> Self {
        match &err {
            SourceError::NotFound { path, .. } => {
                kie_common::Error::configuration_in(path.clone(), err.to_string())
            }
            SourceError::Unreadable { .. } => {
                kie_common::Error::collaborator("config-source", err.to_string())
            }
        }
    }
}

/// Where templates and version configuration come from.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Template text for `path` at `version`
    async fn load_template(&self, path: &str, version: &str) -> Result<String, SourceError>;

    /// Configuration as currently deployed for `version`, when the source
    /// reflects a deployment that users may have edited
    async fn live_snapshot(&self, version: &str) -> Result<Option<Snapshot>, SourceError>;
}

// =============================================================================
// Embedded configuration
// =============================================================================

/// A configuration file compiled into the binary
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmbeddedFile {
    /// Product version
    pub version: &'static str,
    /// Path below the version directory
    pub path: &'static str,
    /// Template text
    pub content: &'static str,
}

impl EmbeddedFile {
    /// Configuration unit of the file
    pub fn unit(&self) -> &'static str {
        template_location(self.path).0
    }

    /// File name inside the unit
    pub fn file_name(&self) -> &'static str {
        template_location(self.path).1
    }
}

macro_rules! embedded_file {
    ($version:literal, $path:literal) => {
        EmbeddedFile {
            version: $version,
            path: $path,
            content: include_str!(concat!("../config/", $version, "/", $path)),
        }
    };
}

macro_rules! embedded_files {
    ($($version:literal),+) => {
        &[$(
            embedded_file!($version, "common.yaml"),
            embedded_file!($version, "envs/rhdm-authoring-ha.yaml"),
            embedded_file!($version, "envs/rhdm-authoring.yaml"),
            embedded_file!($version, "envs/rhdm-optaweb-trial.yaml"),
            embedded_file!($version, "envs/rhdm-production-immutable.yaml"),
            embedded_file!($version, "envs/rhdm-trial.yaml"),
            embedded_file!($version, "envs/rhpam-authoring-ha.yaml"),
            embedded_file!($version, "envs/rhpam-authoring.yaml"),
            embedded_file!($version, "envs/rhpam-production-immutable.yaml"),
            embedded_file!($version, "envs/rhpam-production.yaml"),
            embedded_file!($version, "envs/rhpam-trial.yaml"),
        )+]
    };
}

static EMBEDDED_FILES: &[EmbeddedFile] = embedded_files!("7.5.0", "7.5.1", "7.6.0");

/// Every embedded file, grouped by version
pub fn embedded_files() -> &'static [EmbeddedFile] {
    EMBEDDED_FILES
}

/// Default configuration of a version as compiled in; empty when unknown
pub fn embedded_snapshot(version: &str) -> Snapshot {
    let mut snapshot: Snapshot = BTreeMap::new();
    for file in EMBEDDED_FILES.iter().filter(|f| f.version == version) {
        snapshot
            .entry(file.unit().to_string())
            .or_default()
            .insert(file.file_name().to_string(), file.content.to_string());
    }
    snapshot
}

/// Serves the configuration compiled into the binary
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedConfig;

#[async_trait]
impl ConfigSource for EmbeddedConfig {
    async fn load_template(&self, path: &str, version: &str) -> Result<String, SourceError> {
        EMBEDDED_FILES
            .iter()
            .find(|f| f.version == version && f.path == path)
            .map(|f| f.content.to_string())
            .ok_or_else(|| SourceError::not_found(version, path))
    }

    async fn live_snapshot(&self, _version: &str) -> Result<Option<Snapshot>, SourceError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versions::SUPPORTED_VERSIONS;
    use kie_common::crd::EnvironmentType;

    #[test]
    fn template_paths_map_to_units() {
        assert_eq!(template_location("common.yaml"), ("common", "common.yaml"));
        assert_eq!(
            template_location("envs/rhpam-trial.yaml"),
            ("envs", "rhpam-trial.yaml")
        );
        assert_eq!(env_template_path("rhdm-trial"), "envs/rhdm-trial.yaml");
        assert_eq!(config_map_name("7.6.0", "envs"), "kieconfigs-7.6.0-envs");
    }

    #[test]
    fn every_supported_version_has_every_environment() {
        for version in SUPPORTED_VERSIONS {
            let snapshot = embedded_snapshot(version);
            assert!(snapshot[COMMON_UNIT].contains_key(COMMON_TEMPLATE), "{version}");
            for env in EnvironmentType::ALL {
                let file = format!("{}.yaml", env.as_str());
                assert!(snapshot[ENVS_UNIT].contains_key(&file), "{version} {file}");
            }
        }
        let versions: std::collections::BTreeSet<_> =
            embedded_files().iter().map(|f| f.version).collect();
        assert_eq!(versions.len(), SUPPORTED_VERSIONS.len());
    }

    #[tokio::test]
    async fn embedded_source_distinguishes_missing_files() {
        let source = EmbeddedConfig;
        assert!(source.load_template(COMMON_TEMPLATE, "7.6.0").await.is_ok());
        assert_eq!(
            source.load_template("envs/nope.yaml", "7.6.0").await,
            Err(SourceError::not_found("7.6.0", "envs/nope.yaml"))
        );
        assert!(matches!(
            source.load_template(COMMON_TEMPLATE, "1.0.0").await,
            Err(SourceError::NotFound { .. })
        ));
        assert_eq!(source.live_snapshot("7.6.0").await, Ok(None));
    }

    #[test]
    fn source_errors_map_to_retry_policy() {
        let missing: kie_common::Error = SourceError::not_found("7.6.0", "envs/x.yaml").into();
        assert!(!missing.is_retryable());
        assert_eq!(missing.source_name(), Some("envs/x.yaml"));

        let unreadable: kie_common::Error =
            SourceError::unreadable("7.6.0", "common.yaml", "timeout").into();
        assert!(unreadable.is_retryable());
    }

    #[test]
    fn unknown_version_has_empty_snapshot() {
        assert!(embedded_snapshot("0.0.1").is_empty());
    }
}
