use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use error_stack::Report;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::watcher;
use kube::runtime::watcher::Config;
use kube::Api;
use kube::Client;
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::k8s::kube_client;
use crate::k8s::types::KubernetesError;
use crate::k8s::types::PodEvent;
use crate::k8s::types::PodKey;
use crate::k8s::types::PodSnapshot;

/// Delay before a failed watch is restarted.
const WATCH_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Last-seen snapshot of every watched pod.
///
/// The Kubernetes watch only reports the current object, so the store keeps
/// the previous state to pair it with the new one on updates and to detect
/// pods that disappeared while the watch was re-listing.
#[derive(Debug, Default)]
pub struct PodStore {
    pods: HashMap<PodKey, PodSnapshot>,
}

impl PodStore {
    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    /// Translates one watch event into pod lifecycle events.
    pub fn apply(&mut self, event: watcher::Event<Pod>) -> Vec<PodEvent> {
        match event {
            watcher::Event::Applied(pod) => {
                self.upsert(PodSnapshot::from(pod)).into_iter().collect()
            }
            watcher::Event::Deleted(pod) => vec![self.remove(PodSnapshot::from(pod))],
            watcher::Event::Restarted(pods) => self.resync(pods),
        }
    }

    fn upsert(&mut self, snapshot: PodSnapshot) -> Option<PodEvent> {
        match self.pods.insert(snapshot.key(), snapshot.clone()) {
            None => Some(PodEvent::Added(snapshot)),
            // Changes outside the tracked fields (status conditions, etc.)
            Some(old) if old == snapshot => None,
            Some(old) => Some(PodEvent::Updated { old, new: snapshot }),
        }
    }

    fn remove(&mut self, snapshot: PodSnapshot) -> PodEvent {
        // Prefer the state we last reported, it is what the targets were built from.
        let last_known = self.pods.remove(&snapshot.key()).unwrap_or(snapshot);
        PodEvent::Deleted(last_known)
    }

    fn resync(&mut self, pods: Vec<Pod>) -> Vec<PodEvent> {
        let snapshots: Vec<PodSnapshot> = pods.into_iter().map(PodSnapshot::from).collect();
        let listed: HashSet<PodKey> = snapshots.iter().map(PodSnapshot::key).collect();

        let mut gone: Vec<PodKey> = self
            .pods
            .keys()
            .filter(|key| !listed.contains(*key))
            .cloned()
            .collect();
        gone.sort();

        // Deletions go first: a listed pod may have taken over a vanished pod's IP.
        let mut events = Vec::with_capacity(gone.len() + snapshots.len());
        for key in gone {
            if let Some(snapshot) = self.pods.remove(&key) {
                events.push(PodEvent::Deleted(snapshot));
            }
        }

        for snapshot in snapshots {
            events.extend(self.upsert(snapshot));
        }

        events
    }
}

/// Watches Kubernetes pods and emits [`PodEvent`]s.
///
/// The first list of a watch surfaces every running pod as an added event,
/// later changes arrive incrementally. Events for a single pod are sent in
/// the order they were observed.
pub struct PodWatcher {
    kubeconfig: Option<PathBuf>,
    namespace: Option<String>,
    node_name: Option<String>,
    label_selector: Option<String>,
}

impl PodWatcher {
    pub fn new(
        kubeconfig: Option<PathBuf>,
        namespace: Option<String>,
        node_name: Option<String>,
        label_selector: Option<String>,
    ) -> Self {
        Self {
            kubeconfig,
            namespace,
            node_name,
            label_selector,
        }
    }

    /// Start watching pods for changes.
    ///
    /// Runs until cancelled or until the event receiver goes away. A failed
    /// watch stream is restarted after a short delay; the pod store survives
    /// restarts so pods removed in the meantime are still reported.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::ConnectionFailed`] if the client cannot be created
    #[tracing::instrument(skip_all, fields(namespace = ?self.namespace, node_name = ?self.node_name))]
    pub async fn run(
        &self,
        event_sender: mpsc::Sender<PodEvent>,
        cancellation_token: CancellationToken,
    ) -> Result<(), Report<KubernetesError>> {
        info!("Starting pod watcher");
        let client = kube_client::init_kube_client(self.kubeconfig.as_deref()).await?;
        let mut store = PodStore::default();

        loop {
            select! {
                _ = cancellation_token.cancelled() => {
                    info!("Pod watcher shutdown requested");
                    break;
                }
                result = self.watch_pods(&client, &mut store, &event_sender) => {
                    match result {
                        Ok(()) => {
                            warn!("Pod watch stream ended unexpectedly, restarting...");
                        }
                        Err(e) if matches!(e.current_context(), KubernetesError::EventChannelClosed) => {
                            info!("Pod event receiver closed, stopping pod watcher");
                            break;
                        }
                        Err(e) => {
                            error!("Pod watch failed: {e:?}");
                            if !wait_before_retry(&cancellation_token).await {
                                info!("Pod watcher shutdown requested");
                                break;
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn watch_config(&self) -> Config {
        let mut config = Config::default();
        if let Some(selector) = &self.label_selector {
            config = config.labels(selector);
        }
        if let Some(node_name) = &self.node_name {
            config = config.fields(&format!("spec.nodeName={node_name}"));
        }
        config
    }

    /// Watch pods and forward events.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::WatchFailed`] if the watch stream fails
    /// - [`KubernetesError::EventChannelClosed`] if nobody consumes events anymore
    async fn watch_pods(
        &self,
        client: &Client,
        store: &mut PodStore,
        event_sender: &mpsc::Sender<PodEvent>,
    ) -> Result<(), Report<KubernetesError>> {
        let api: Api<Pod> = match &self.namespace {
            Some(ns) => Api::namespaced(client.clone(), ns),
            None => Api::all(client.clone()),
        };

        let mut stream = watcher(api, self.watch_config()).boxed();

        while let Some(event) = stream.next().await {
            let event = event.map_err(|e| {
                Report::new(KubernetesError::WatchFailed {
                    message: format!("Watch stream error: {e}"),
                })
            })?;

            if let watcher::Event::Restarted(pods) = &event {
                debug!(pods = pods.len(), known = store.len(), "Pod watch (re)listed");
            }

            for pod_event in store.apply(event) {
                event_sender
                    .send(pod_event)
                    .await
                    .map_err(|_| Report::new(KubernetesError::EventChannelClosed))?;
            }
        }

        Ok(())
    }
}

/// Sleeps for the watch retry delay. Returns `false` if cancelled meanwhile.
async fn wait_before_retry(cancellation_token: &CancellationToken) -> bool {
    select! {
        _ = cancellation_token.cancelled() => false,
        _ = tokio::time::sleep(WATCH_RETRY_DELAY) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use std::sync::Arc;

    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::discovery::Reconciler;
    use crate::discovery::TargetRegistry;

    fn create_test_pod(name: &str, ip: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                annotations: Some(BTreeMap::from([(
                    "prometheus.io/scrape".to_string(),
                    "true".to_string(),
                )])),
                ..Default::default()
            },
            spec: None,
            status: Some(PodStatus {
                pod_ip: Some(ip.to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn applied_unknown_pod_is_added() {
        let mut store = PodStore::default();

        let events = store.apply(watcher::Event::Applied(create_test_pod("p1", "10.0.0.1")));

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], PodEvent::Added(pod) if pod.name == "p1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn applied_known_pod_is_updated_with_previous_state() {
        let mut store = PodStore::default();
        store.apply(watcher::Event::Applied(create_test_pod("p1", "10.0.0.1")));

        let events = store.apply(watcher::Event::Applied(create_test_pod("p1", "10.0.0.2")));

        match events.as_slice() {
            [PodEvent::Updated { old, new }] => {
                assert_eq!(old.pod_ip, "10.0.0.1");
                assert_eq!(new.pod_ip, "10.0.0.2");
            }
            other => panic!("Expected a single Updated event, got {other:?}"),
        }
    }

    #[test]
    fn applied_unchanged_pod_is_ignored() {
        let mut store = PodStore::default();
        store.apply(watcher::Event::Applied(create_test_pod("p1", "10.0.0.1")));

        let events = store.apply(watcher::Event::Applied(create_test_pod("p1", "10.0.0.1")));

        assert!(events.is_empty());
    }

    #[test]
    fn deleted_pod_reports_last_known_state() {
        let mut store = PodStore::default();
        store.apply(watcher::Event::Applied(create_test_pod("p1", "10.0.0.1")));

        // The final object may already have lost its IP.
        let events = store.apply(watcher::Event::Deleted(create_test_pod("p1", "")));

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], PodEvent::Deleted(pod) if pod.pod_ip == "10.0.0.1"));
        assert!(store.is_empty());
    }

    #[test]
    fn deleted_unknown_pod_uses_event_object() {
        let mut store = PodStore::default();

        let events = store.apply(watcher::Event::Deleted(create_test_pod("p1", "10.0.0.9")));

        assert!(matches!(&events[0], PodEvent::Deleted(pod) if pod.pod_ip == "10.0.0.9"));
    }

    #[test]
    fn restart_diffs_against_known_pods() {
        let mut store = PodStore::default();
        store.apply(watcher::Event::Applied(create_test_pod("kept", "10.0.0.1")));
        store.apply(watcher::Event::Applied(create_test_pod("moved", "10.0.0.2")));
        store.apply(watcher::Event::Applied(create_test_pod("gone", "10.0.0.3")));

        let events = store.apply(watcher::Event::Restarted(vec![
            create_test_pod("kept", "10.0.0.1"),
            create_test_pod("moved", "10.0.0.20"),
            create_test_pod("new", "10.0.0.4"),
        ]));

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], PodEvent::Deleted(pod) if pod.name == "gone"));
        assert!(matches!(&events[1], PodEvent::Updated { new, .. } if new.name == "moved"));
        assert!(matches!(&events[2], PodEvent::Added(pod) if pod.name == "new"));
        assert_eq!(store.len(), 3);
    }

    #[test(tokio::test)]
    async fn resync_ip_reuse_keeps_new_target() {
        let registry = Arc::new(TargetRegistry::new());
        let reconciler = Reconciler::new(registry.clone());
        let mut store = PodStore::default();

        let mut events = store.apply(watcher::Event::Applied(create_test_pod("gone", "10.0.0.3")));
        // "gone" was deleted while the watch was down and "new" got its IP.
        events.extend(store.apply(watcher::Event::Restarted(vec![create_test_pod(
            "new", "10.0.0.3",
        )])));
        for event in events {
            reconciler.handle_event(event).await;
        }

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].url.as_str(), "http://10.0.0.3:9102/metrics");
        assert_eq!(snapshot[0].tags["pod_name"], "new");
    }

    #[test(tokio::test)]
    async fn retry_delay_is_cut_short_by_cancellation() {
        let token = CancellationToken::new();
        let waiter = tokio::spawn({
            let token = token.clone();
            async move { wait_before_retry(&token).await }
        });

        token.cancel();
        let retry = tokio::time::timeout(WATCH_RETRY_DELAY / 2, waiter)
            .await
            .expect("retry delay ignored cancellation")
            .unwrap();

        assert!(!retry);
    }

    #[test]
    fn initial_list_adds_every_pod() {
        let mut store = PodStore::default();

        let events = store.apply(watcher::Event::Restarted(vec![
            create_test_pod("a", "10.0.0.1"),
            create_test_pod("b", "10.0.0.2"),
        ]));

        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, PodEvent::Added(_))));
    }

    #[test]
    fn watch_config_applies_selectors() {
        let watcher = PodWatcher::new(
            None,
            None,
            Some("node-1".to_string()),
            Some("app=web".to_string()),
        );

        let config = watcher.watch_config();

        assert_eq!(config.label_selector.as_deref(), Some("app=web"));
        assert_eq!(config.field_selector.as_deref(), Some("spec.nodeName=node-1"));
    }

    #[test]
    fn watch_config_defaults_to_all_pods() {
        let watcher = PodWatcher::new(None, Some("monitoring".to_string()), None, None);

        let config = watcher.watch_config();

        assert!(config.label_selector.is_none());
        assert!(config.field_selector.is_none());
    }
}
