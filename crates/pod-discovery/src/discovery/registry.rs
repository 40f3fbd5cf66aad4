//! Shared list of active scrape targets.

use tokio::sync::RwLock;

use crate::discovery::target::ScrapeTarget;

/// Registry of active scrape targets, keyed by scrape URL.
///
/// Every read and write goes through the registry lock, so readers never see
/// a half-applied mutation. Holds at most one target per URL.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: RwLock<Vec<ScrapeTarget>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a target, replacing in place an entry with the same URL.
    pub async fn add_or_update(&self, target: ScrapeTarget) {
        let mut targets = self.targets.write().await;
        upsert(&mut targets, target);
    }

    /// Removes the target with the given URL. Returns `false` if there was none.
    pub async fn remove_by_url(&self, url: &str) -> bool {
        let mut targets = self.targets.write().await;
        remove(&mut targets, url)
    }

    /// Removes `old_url` and then adds `target` while holding the lock once,
    /// so concurrent readers observe either the state before or after.
    ///
    /// Returns whether an entry for `old_url` was removed.
    pub async fn replace(&self, old_url: Option<&str>, target: Option<ScrapeTarget>) -> bool {
        let mut targets = self.targets.write().await;
        let removed = old_url.is_some_and(|url| remove(&mut targets, url));
        if let Some(target) = target {
            upsert(&mut targets, target);
        }
        removed
    }

    /// Returns a copy of all registered targets, in insertion order.
    pub async fn snapshot(&self) -> Vec<ScrapeTarget> {
        self.targets.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.targets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.targets.read().await.is_empty()
    }
}

fn upsert(targets: &mut Vec<ScrapeTarget>, target: ScrapeTarget) {
    match targets.iter_mut().find(|existing| existing.url == target.url) {
        Some(existing) => *existing = target,
        None => targets.push(target),
    }
}

fn remove(targets: &mut Vec<ScrapeTarget>, url: &str) -> bool {
    let before = targets.len();
    targets.retain(|target| target.url != url);
    targets.len() != before
}
