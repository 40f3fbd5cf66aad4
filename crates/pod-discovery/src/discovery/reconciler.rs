use std::sync::Arc;

use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::discovery::registry::TargetRegistry;
use crate::discovery::target;
use crate::discovery::target::ScrapeTarget;
use crate::k8s::PodEvent;
use crate::k8s::PodSnapshot;

/// Applies pod lifecycle events to the target registry.
///
/// Each event is handled to completion before the next one is taken, which
/// keeps registry mutations for a pod in the order its events arrived.
pub struct Reconciler {
    registry: Arc<TargetRegistry>,
}

impl Reconciler {
    pub fn new(registry: Arc<TargetRegistry>) -> Self {
        Self { registry }
    }

    /// Consume pod events until the channel closes or shutdown is requested.
    #[tracing::instrument(skip_all)]
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<PodEvent>,
        cancellation_token: CancellationToken,
    ) {
        info!("Starting target reconciler");
        loop {
            select! {
                _ = cancellation_token.cancelled() => {
                    info!("Target reconciler shutdown requested");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("Pod event channel closed, stopping target reconciler");
                        break;
                    };
                    self.handle_event(event).await;
                }
            }
        }
    }

    pub async fn handle_event(&self, event: PodEvent) {
        match event {
            PodEvent::Added(pod) => self.register(&pod).await,
            PodEvent::Deleted(pod) => self.unregister(&pod).await,
            PodEvent::Updated { old, new } => self.update(&old, &new).await,
        }
    }

    async fn register(&self, pod: &PodSnapshot) {
        let Some(target) = resolve_target(pod) else {
            return;
        };
        debug!(url = %target.url, "will scrape metrics from pod");
        self.registry.add_or_update(target).await;
    }

    async fn unregister(&self, pod: &PodSnapshot) {
        let Some(url) = resolve_url(pod) else {
            return;
        };
        debug!(
            pod_name = %pod.name,
            namespace = %pod.namespace,
            "registered a delete request for pod"
        );
        if self.registry.remove_by_url(&url).await {
            debug!(url = %url, "will stop scraping");
        }
    }

    async fn update(&self, old: &PodSnapshot, new: &PodSnapshot) {
        let old_url = resolve_url(old);
        let new_target = resolve_target(new);
        if old_url.is_none() && new_target.is_none() {
            return;
        }

        let removed = self.registry.replace(old_url.as_deref(), new_target).await;
        if let (true, Some(url)) = (removed, &old_url) {
            debug!(
                pod_name = %old.name,
                namespace = %old.namespace,
                url = %url,
                "replaced scrape target of updated pod"
            );
        }
    }
}

/// URL a pod is (or would be) registered under. Silent on parse failures,
/// a URL that does not parse was never registered.
fn resolve_url(pod: &PodSnapshot) -> Option<String> {
    let url = target::scrape_url(pod)?;
    target::parse_url(&url).ok().map(|_| url)
}

fn resolve_target(pod: &PodSnapshot) -> Option<ScrapeTarget> {
    let descriptor = target::build_target(pod)?;
    match ScrapeTarget::parse(descriptor) {
        Ok(target) => Some(target),
        Err(e) => {
            warn!(
                pod_name = %pod.name,
                namespace = %pod.namespace,
                "could not parse scrape URL, pod will not be scraped: {e:?}"
            );
            None
        }
    }
}
