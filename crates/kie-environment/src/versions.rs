//! Version Registry
//!
//! The product versions the operator can deploy, the current one, and the
//! helpers used to pick upgrade targets. Eligibility is an exact string match
//! against the supported list.

use std::collections::BTreeMap;

use kie_common::{Error, Result};

/// Version new KieApps get when they do not ask for one
pub const CURRENT_VERSION: &str = "7.6.0";

/// Every deployable version, oldest first
pub const SUPPORTED_VERSIONS: &[&str] = &["7.5.0", "7.5.1", "7.6.0"];

/// Configuration of one version: unit name -> file name -> template text
pub type Snapshot = BTreeMap<String, BTreeMap<String, String>>;

/// Supported product versions and the current one
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionRegistry {
    supported: Vec<String>,
    current: String,
}

impl Default for VersionRegistry {
    fn default() -> Self {
        Self {
            supported: SUPPORTED_VERSIONS.iter().map(|v| v.to_string()).collect(),
            current: CURRENT_VERSION.to_string(),
        }
    }
}

impl VersionRegistry {
    /// Build a registry; `current` must be one of `supported`
    pub fn new(supported: Vec<String>, current: impl Into<String>) -> Result<Self> {
        let current = current.into();
        if !supported.contains(&current) {
            return Err(Error::configuration(format!(
                "current version {} is not in the supported list",
                current
            )));
        }
        Ok(Self { supported, current })
    }

    /// Supported versions, oldest first
    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    /// The current version
    pub fn current(&self) -> &str {
        &self.current
    }

    /// True iff `version` is supported, compared verbatim
    pub fn is_eligible(&self, version: &str) -> bool {
        self.supported.iter().any(|v| v == version)
    }

    /// Fail with `VersionUnsupported` unless `version` is eligible
    pub fn require(&self, version: &str) -> Result<()> {
        if self.is_eligible(version) {
            Ok(())
        } else {
            Err(Error::version_unsupported(version, &self.supported))
        }
    }

    /// Newest supported version sharing major and minor with `version`
    pub fn latest_micro(&self, version: &str) -> Option<&str> {
        let (major, minor, _) = major_minor_micro(version);
        self.supported
            .iter()
            .filter(|v| {
                let (ma, mi, _) = major_minor_micro(v);
                ma == major && mi == minor
            })
            .last()
            .map(String::as_str)
    }
}

/// Split a version into major, minor and micro; missing parts are `"0"`
pub fn major_minor_micro(version: &str) -> (String, String, String) {
    let mut parts = version.split('.').map(str::to_string);
    let mut next = || parts.next().filter(|p| !p.is_empty()).unwrap_or_else(|| "0".to_string());
    (next(), next(), next())
}

/// Major and minor digits joined, as used in image names (`7.5.1` -> `75`)
pub fn minor_image_version(version: &str) -> String {
    let (major, minor, _) = major_minor_micro(version);
    format!("{}{}", major, minor)
}
