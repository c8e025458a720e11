//! Error types for the KieApp operator
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the context needed to decide whether a pass is
//! retried and which reason ends up on the KieApp status.

use thiserror::Error;

use crate::crd::ReasonType;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for KieApp operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Bad or missing template, or a malformed spec
    #[error("configuration error in {source_name}: {message}")]
    Configuration {
        /// Description of what's invalid
        message: String,
        /// Which input failed (e.g., "common", "envs/rhpam-trial", "spec.objects")
        source_name: String,
    },

    /// Template rendering failed
    #[error("template error in {source_name}: {message}")]
    Template {
        /// Description of the render failure
        message: String,
        /// Which template failed
        source_name: String,
    },

    /// The requested product version is outside the supported registry
    #[error("product version {version} is not supported, supported versions: {supported}")]
    VersionUnsupported {
        /// The requested version
        version: String,
        /// Comma separated list of supported versions
        supported: String,
    },

    /// Local configuration changes conflict with the upgrade between two versions
    #[error("can't upgrade from {from_version}: {message}")]
    UpgradeConflict {
        /// Version the deployment is currently on
        from_version: String,
        /// Description of the conflict
        message: String,
    },

    /// A collaborator (configuration source, snapshot provider, apply layer) failed
    #[error("collaborator error [{context}]: {message}")]
    Collaborator {
        /// Description of what failed
        message: String,
        /// Which collaborator failed (e.g., "config-source", "apply")
        context: String,
        /// Whether re-running the pass may succeed
        retryable: bool,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "controller")
        context: String,
    },
}

impl Error {
    /// Create a configuration error with the given message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            source_name: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create a configuration error naming the input that failed
    pub fn configuration_in(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            source_name: source_name.into(),
        }
    }

    /// Create a template error naming the template that failed
    pub fn template_in(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
            source_name: source_name.into(),
        }
    }

    /// Create an unsupported version error
    pub fn version_unsupported(version: impl Into<String>, supported: &[String]) -> Self {
        Self::VersionUnsupported {
            version: version.into(),
            supported: supported.join(", "),
        }
    }

    /// Create an upgrade conflict error
    pub fn upgrade_conflict(from_version: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::UpgradeConflict {
            from_version: from_version.into(),
            message: msg.into(),
        }
    }

    /// Create a retryable collaborator error
    pub fn collaborator(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Collaborator {
            message: msg.into(),
            context: context.into(),
            retryable: true,
        }
    }

    /// Create a collaborator error that re-running the pass will not fix
    pub fn collaborator_permanent(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Collaborator {
            message: msg.into(),
            context: context.into(),
            retryable: false,
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration, template, version and conflict errors need the user to
    /// change something. Kubernetes errors depend on the status code; conflicts
    /// and throttling are retried since the next pass re-reads everything.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 409 && ae.code != 429
            ),
            Error::Configuration { .. } => false,
            Error::Template { .. } => false,
            Error::VersionUnsupported { .. } => false,
            Error::UpgradeConflict { .. } => false,
            Error::Collaborator { retryable, .. } => *retryable,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Reason recorded on the KieApp status when a pass fails with this error
    pub fn status_reason(&self) -> ReasonType {
        match self {
            Error::Configuration { .. }
            | Error::Template { .. }
            | Error::VersionUnsupported { .. } => ReasonType::ConfigurationError,
            Error::UpgradeConflict { .. } => ReasonType::UpgradeConflict,
            Error::Kube { .. } | Error::Collaborator { .. } => ReasonType::DeploymentFailed,
            Error::Serialization { .. } | Error::Internal { .. } => ReasonType::Unknown,
        }
    }

    /// Get the failing input name for configuration and template errors
    pub fn source_name(&self) -> Option<&str> {
        match self {
            Error::Configuration { source_name, .. } => Some(source_name),
            Error::Template { source_name, .. } => Some(source_name),
            _ => None,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Collaborator { context, .. } => Some(context),
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }
}
