//! Capabilities shared by several kinds. Status filtering and update-time
//! sorting go through these instead of matching on concrete types.

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Namespace, PersistentVolume, PersistentVolumeClaim, Pod};
use kube::core::DynamicObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadState {
    Stopped,
    Running,
    Updating,
}

impl WorkloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadState::Stopped => "stopped",
            WorkloadState::Running => "running",
            WorkloadState::Updating => "updating",
        }
    }
}

/// Desired vs ready replicas. `desired == None` means the workload never
/// declared a replica count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaCounts {
    pub desired: Option<i32>,
    pub ready: i32,
}

impl ReplicaCounts {
    pub fn state(&self) -> WorkloadState {
        match self.desired {
            None => WorkloadState::Stopped,
            Some(0) if self.ready == 0 => WorkloadState::Stopped,
            Some(d) if d == self.ready => WorkloadState::Running,
            Some(_) => WorkloadState::Updating,
        }
    }
}

pub trait ReplicaStatus {
    fn replica_counts(&self) -> ReplicaCounts;

    fn workload_state(&self) -> WorkloadState {
        self.replica_counts().state()
    }
}

impl ReplicaStatus for Deployment {
    fn replica_counts(&self) -> ReplicaCounts {
        let status = self.status.as_ref();
        ReplicaCounts {
            desired: Some(status.and_then(|s| s.replicas).unwrap_or(0)),
            ready: status.and_then(|s| s.ready_replicas).unwrap_or(0),
        }
    }
}

impl ReplicaStatus for StatefulSet {
    fn replica_counts(&self) -> ReplicaCounts {
        ReplicaCounts {
            desired: self.spec.as_ref().and_then(|s| s.replicas),
            ready: self.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0),
        }
    }
}

impl ReplicaStatus for DaemonSet {
    fn replica_counts(&self) -> ReplicaCounts {
        let status = self.status.as_ref();
        ReplicaCounts {
            desired: Some(status.map(|s| s.desired_number_scheduled).unwrap_or(0)),
            ready: status.map(|s| s.number_ready).unwrap_or(0),
        }
    }
}

pub trait PhaseStatus {
    fn phase(&self) -> Option<&str>;
}

impl PhaseStatus for Pod {
    fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.phase.as_deref())
    }
}

impl PhaseStatus for PersistentVolumeClaim {
    fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.phase.as_deref())
    }
}

impl PhaseStatus for PersistentVolume {
    fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.phase.as_deref())
    }
}

impl PhaseStatus for Namespace {
    fn phase(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.phase.as_deref())
    }
}

/// Timestamps recorded on status conditions.
pub trait ConditionTimes {
    fn condition_times(&self) -> Vec<DateTime<Utc>>;

    fn latest_condition_time(&self) -> Option<DateTime<Utc>> {
        self.condition_times().into_iter().max()
    }
}

impl ConditionTimes for Deployment {
    fn condition_times(&self) -> Vec<DateTime<Utc>> {
        self.status
            .iter()
            .flat_map(|s| s.conditions.iter().flatten())
            .filter_map(|c| c.last_update_time.as_ref().map(|t| t.0))
            .collect()
    }
}

impl ConditionTimes for Job {
    fn condition_times(&self) -> Vec<DateTime<Utc>> {
        self.status
            .iter()
            .flat_map(|s| s.conditions.iter().flatten())
            .filter_map(|c| c.last_transition_time.as_ref().map(|t| t.0))
            .collect()
    }
}

/// Unstructured objects: `status.conditions[].lastUpdateTime` as RFC 3339.
impl ConditionTimes for DynamicObject {
    fn condition_times(&self) -> Vec<DateTime<Utc>> {
        self.data
            .pointer("/status/conditions")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|c| c.get("lastUpdateTime").and_then(|v| v.as_str()))
            .filter_map(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .collect()
    }
}
