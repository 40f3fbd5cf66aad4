pub mod tasks;

use std::sync::Arc;

use anyhow::Result;

use crate::app::tasks::Tasks;
use crate::config::DaemonArgs;
use crate::discovery::TargetRegistry;
use crate::k8s::PodWatcher;

/// Application core structure with explicit dependencies
pub struct Application {
    registry: Arc<TargetRegistry>,
    pod_watcher: Arc<PodWatcher>,
    daemon_args: DaemonArgs,
}

impl Application {
    pub fn new(daemon_args: DaemonArgs) -> Self {
        let pod_watcher = PodWatcher::new(
            daemon_args.kubeconfig.clone(),
            daemon_args.namespace.clone(),
            daemon_args.node_name.clone(),
            daemon_args.label_selector.clone(),
        );

        Self {
            registry: Arc::new(TargetRegistry::new()),
            pod_watcher: Arc::new(pod_watcher),
            daemon_args,
        }
    }

    /// Shared target registry, readable by any scraper embedded in the process
    pub fn registry(&self) -> &Arc<TargetRegistry> {
        &self.registry
    }

    pub fn pod_watcher(&self) -> &Arc<PodWatcher> {
        &self.pod_watcher
    }

    pub fn daemon_args(&self) -> &DaemonArgs {
        &self.daemon_args
    }

    /// Run application, start all tasks and wait for completion
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting all application tasks...");

        let mut tasks = Tasks::new();
        tasks.spawn_all_tasks(self);

        if let Err(e) = tasks.wait_for_completion().await {
            tracing::error!("Error during task execution: {}", e);
            return Err(e);
        }

        tracing::info!("Application run completed");
        Ok(())
    }
}
