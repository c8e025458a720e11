//! Kubernetes Event recording for the KieApp controller.
//!
//! A trait over `kube::runtime::events::Recorder` so the controller can
//! report provisioning, upgrades and failures where `kubectl describe kieapp`
//! shows them.
//!
//! Events are fire-and-forget: a failed publish is logged and never fails
//! the reconcile pass.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event on the given object.
    ///
    /// `reason` is machine readable (see [`reasons`]), `action` names what the
    /// controller did (see [`actions`]), `note` is for humans.
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher reporting as the given controller name.
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// No-op implementation for tests.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reasons, shown under REASON in `kubectl get events`.
pub mod reasons {
    /// Objects were created, updated or removed
    pub const PROVISIONING: &str = "Provisioning";
    /// Every requested object is in place
    pub const DEPLOYED: &str = "Deployed";
    /// A pass failed
    pub const FAILED: &str = "Failed";
    /// A legacy resource was converted to the current schema
    pub const SCHEMA_MIGRATED: &str = "SchemaMigrated";
    /// The product version was moved forward
    pub const VERSION_UPGRADED: &str = "VersionUpgraded";
    /// Local configuration changes block an upgrade
    pub const UPGRADE_BLOCKED: &str = "UpgradeBlocked";
    /// The requested product version is not supported
    pub const VERSION_UNSUPPORTED: &str = "VersionUnsupported";
}

/// Event actions, shown under ACTION in `kubectl get events`.
pub mod actions {
    /// Standard reconciliation pass
    pub const RECONCILE: &str = "Reconcile";
    /// Schema or product upgrade
    pub const UPGRADE: &str = "Upgrade";
}
