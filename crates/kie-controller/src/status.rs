//! KieApp status bookkeeping
//!
//! Conditions form a capped history, newest last. A setter only appends when
//! the newest condition says something different, so an unchanged pass leaves
//! the status equal and no patch is sent.

use kie_common::crd::{
    Condition, ConditionStatus, ConditionType, Deployments, KieAppStatus, ReasonType,
};
use kie_environment::resource::DeploymentConfig;
use kie_environment::{Resource, ResourceKind, ResourceMap};

/// Conditions kept in the history
pub const MAX_CONDITIONS: usize = 30;

/// Record that objects are being created or changed. Returns true on change.
pub fn set_provisioning(status: &mut KieAppStatus) -> bool {
    if status.is(ConditionType::Provisioning) {
        return false;
    }
    push_condition(
        status,
        Condition::new(ConditionType::Provisioning, ConditionStatus::True),
    );
    true
}

/// Record that the deployment matches the spec. Returns true on change.
pub fn set_deployed(status: &mut KieAppStatus) -> bool {
    if status.is(ConditionType::Deployed) {
        return false;
    }
    push_condition(
        status,
        Condition::new(ConditionType::Deployed, ConditionStatus::True),
    );
    true
}

/// Record a failed pass. Returns true on change.
///
/// A repeated failure with the same reason and message is not recorded again.
pub fn set_failed(status: &mut KieAppStatus, reason: ReasonType, message: &str) -> bool {
    let repeated = status.last_condition().is_some_and(|c| {
        c.type_ == ConditionType::Failed
            && c.reason == Some(reason)
            && c.message.as_deref() == Some(message)
    });
    if repeated {
        return false;
    }
    push_condition(
        status,
        Condition::new(ConditionType::Failed, ConditionStatus::False).with_reason(reason, message),
    );
    true
}

fn push_condition(status: &mut KieAppStatus, condition: Condition) {
    status.conditions.push(condition);
    let excess = status.conditions.len().saturating_sub(MAX_CONDITIONS);
    status.conditions.drain(..excess);
}

/// Classify the live DeploymentConfigs by progress.
///
/// Scaled to zero is stopped, fewer ready replicas than requested is starting,
/// anything else is ready. Names are sorted.
pub fn classify_deployments(deployed: &ResourceMap) -> Deployments {
    let mut deployments = Deployments::default();
    let dcs = deployed
        .get(&ResourceKind::DeploymentConfig)
        .into_iter()
        .flatten()
        .filter_map(|r| match r {
            Resource::DeploymentConfig(dc) => Some(dc),
            _ => None,
        });
    for dc in dcs {
        let name = dc.metadata.name.clone().unwrap_or_default();
        match progress(dc) {
            Progress::Stopped => deployments.stopped.push(name),
            Progress::Starting => deployments.starting.push(name),
            Progress::Ready => deployments.ready.push(name),
        }
    }
    deployments.stopped.sort();
    deployments.starting.sort();
    deployments.ready.sort();
    deployments
}

enum Progress {
    Stopped,
    Starting,
    Ready,
}

fn progress(dc: &DeploymentConfig) -> Progress {
    let ready = dc.status.as_ref().map(|s| s.ready_replicas).unwrap_or(0);
    if dc.spec.replicas == 0 {
        Progress::Stopped
    } else if ready < dc.spec.replicas {
        Progress::Starting
    } else {
        Progress::Ready
    }
}
