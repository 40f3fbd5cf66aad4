use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::server::ApiServer;
use crate::app::Application;
use crate::discovery::Reconciler;
use crate::k8s::PodEvent;

/// How long running tasks get to finish after shutdown was requested.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Task manager, responsible for starting and managing all background tasks
pub struct Tasks {
    tasks: Vec<JoinHandle<Result<()>>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start all background tasks
    pub fn spawn_all_tasks(&mut self, app: &Application) {
        let capacity = app.daemon_args().event_channel_capacity.max(1);
        let (event_sender, event_receiver) = mpsc::channel::<PodEvent>(capacity);

        let reconciler_task = self.spawn_reconciler_task(app, event_receiver);
        self.tasks.push(reconciler_task);

        let watcher_task = self.spawn_pod_watcher_task(app, event_sender);
        self.tasks.push(watcher_task);

        let api_server_task = self.spawn_api_server_task(app);
        self.tasks.push(api_server_task);
    }

    /// wait for tasks to complete or receive shutdown signal
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        let signal_handler = {
            use tokio::signal::unix::signal;
            use tokio::signal::unix::SignalKind;
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;

            tokio::spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    }
                    _ = sigint.recv() => {
                        tracing::info!("Received SIGINT, initiating graceful shutdown");
                    }
                }
            })
        };

        let outcome = tokio::select! {
            _ = signal_handler => {
                tracing::info!("Shutdown signal received, cancelling all tasks");
                Ok(())
            }
            (result, _, _) = futures::future::select_all(&mut self.tasks) => {
                task_outcome(result)
            }
        };

        self.cancellation_token.cancel();
        self.wait_for_tasks_with_timeout(SHUTDOWN_TIMEOUT).await;
        outcome
    }

    async fn wait_for_tasks_with_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            for task in &mut self.tasks {
                if task.is_finished() {
                    continue;
                }
                match task.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!("Task failed during shutdown: {e:?}"),
                    Err(e) => tracing::error!("Task panicked during shutdown: {e}"),
                }
            }
        })
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        });
    }

    fn spawn_reconciler_task(
        &self,
        app: &Application,
        event_receiver: mpsc::Receiver<PodEvent>,
    ) -> JoinHandle<Result<()>> {
        let reconciler = Reconciler::new(app.registry().clone());
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            reconciler.run(event_receiver, token).await;
            tracing::info!("Target reconciler task completed");
            Ok(())
        })
    }

    fn spawn_pod_watcher_task(
        &self,
        app: &Application,
        event_sender: mpsc::Sender<PodEvent>,
    ) -> JoinHandle<Result<()>> {
        let pod_watcher = app.pod_watcher().clone();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            tracing::info!("Starting Kubernetes pod watcher task");
            pod_watcher
                .run(event_sender, token)
                .await
                .map_err(|e| anyhow::anyhow!("Kubernetes pod watcher failed: {e:?}"))?;
            tracing::info!("Kubernetes pod watcher completed");
            Ok(())
        })
    }

    fn spawn_api_server_task(&self, app: &Application) -> JoinHandle<Result<()>> {
        let registry = app.registry().clone();
        let listen_addr = app.daemon_args().api_listen_addr.clone();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            let api_server = ApiServer::new(registry, listen_addr);
            api_server
                .run(token)
                .await
                .map_err(|e| anyhow::anyhow!("API server failed: {e:?}"))?;
            tracing::info!("API server completed");
            Ok(())
        })
    }
}

/// Maps the result of the first task to finish to the daemon's outcome.
fn task_outcome(result: Result<Result<()>, JoinError>) -> Result<()> {
    match result {
        Ok(Ok(())) => {
            tracing::warn!("Task completed unexpectedly, shutting down");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!("Task completed with error: {e}");
            Err(e)
        }
        Err(e) => {
            tracing::error!("Task panicked: {e}");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test(tokio::test)]
    async fn failed_task_fails_the_daemon() {
        let handle: JoinHandle<Result<()>> =
            tokio::spawn(async { Err(anyhow::anyhow!("cannot create client")) });

        let outcome = task_outcome(handle.await);

        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("cannot create client"));
    }

    #[test(tokio::test)]
    async fn panicked_task_fails_the_daemon() {
        let handle: JoinHandle<Result<()>> = tokio::spawn(async { panic!("boom") });

        assert!(task_outcome(handle.await).is_err());
    }

    #[test(tokio::test)]
    async fn finished_task_is_not_an_error() {
        let handle: JoinHandle<Result<()>> = tokio::spawn(async { Ok(()) });

        assert!(task_outcome(handle.await).is_ok());
    }
}
