//! Kubernetes integration module.
//!
//! Bridges the cluster pod watch to typed [`PodEvent`]s:
//! - [`PodWatcher`]: runs the watch and emits added/updated/deleted events
//! - [`PodStore`]: last-seen pod state used to pair updates and detect deletions
//! - [`PodSnapshot`]: the pod fields target discovery reads

pub mod kube_client;
pub mod pod_watcher;
pub mod types;

pub use pod_watcher::PodStore;
pub use pod_watcher::PodWatcher;
pub use types::KubernetesError;
pub use types::PodEvent;
pub use types::PodKey;
pub use types::PodSnapshot;
