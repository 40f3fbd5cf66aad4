use core::error::Error;
use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;

/// The parts of a pod that target discovery reads.
///
/// Snapshots are immutable once handed to the reconciler; an update is
/// delivered as a fresh snapshot next to the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodSnapshot {
    pub name: String,
    pub namespace: String,
    /// Empty until the pod has been scheduled and got an address.
    pub pod_ip: String,
    pub annotations: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

impl PodSnapshot {
    pub fn key(&self) -> PodKey {
        PodKey::new(self.namespace.clone(), self.name.clone())
    }
}

impl From<Pod> for PodSnapshot {
    fn from(pod: Pod) -> Self {
        let metadata = pod.metadata;
        Self {
            name: metadata.name.unwrap_or_default(),
            namespace: metadata.namespace.unwrap_or_default(),
            pod_ip: pod
                .status
                .and_then(|status| status.pod_ip)
                .unwrap_or_default(),
            annotations: metadata.annotations.unwrap_or_default(),
            labels: metadata.labels.unwrap_or_default(),
        }
    }
}

/// Key for identifying a pod across events
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: String, name: String) -> Self {
        Self { namespace, name }
    }
}

/// Pod lifecycle events consumed by the target reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodEvent {
    /// A pod appeared, either newly created or found by the initial list
    Added(PodSnapshot),
    /// A known pod changed
    Updated { old: PodSnapshot, new: PodSnapshot },
    /// A pod went away; carries its last known state
    Deleted(PodSnapshot),
}

/// Errors that can occur during Kubernetes operations.
#[derive(Debug, derive_more::Display)]
pub enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[display("Failed to watch pods: {message}")]
    WatchFailed { message: String },
    #[display("Pod event receiver has been dropped")]
    EventChannelClosed,
}

impl Error for KubernetesError {}
