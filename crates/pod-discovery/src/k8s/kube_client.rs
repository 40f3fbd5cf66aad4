use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;
use tracing::info;

use crate::k8s::KubernetesError;

/// Creates a Kubernetes client.
///
/// With an explicit kubeconfig path that file is used; otherwise the client
/// falls back to `$KUBECONFIG`, the in-cluster service account or `~/.kube/config`.
pub async fn init_kube_client(
    kubeconfig: Option<&Path>,
) -> Result<Client, Report<KubernetesError>> {
    let Some(kubeconfig_path) = kubeconfig else {
        info!("Using default Kubernetes client configuration");
        return Client::try_default()
            .await
            .change_context(KubernetesError::ConnectionFailed {
                message: "Failed to create Kubernetes client".to_string(),
            });
    };

    info!(path = %kubeconfig_path.display(), "Loading kubeconfig");
    let config = config_from_file(kubeconfig_path).await?;

    Client::try_from(config).change_context(KubernetesError::ConnectionFailed {
        message: "Failed to create Kubernetes client from custom kubeconfig".to_string(),
    })
}

async fn config_from_file(path: &Path) -> Result<Config, Report<KubernetesError>> {
    let kubeconfig =
        Kubeconfig::read_from(path).change_context(KubernetesError::ConnectionFailed {
            message: format!("Failed to read kubeconfig file: {}", path.display()),
        })?;

    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .change_context(KubernetesError::ConnectionFailed {
            message: format!("Failed to create config from kubeconfig: {}", path.display()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_kubeconfig_file_is_connection_error() {
        let result = init_kube_client(Some(Path::new("/nonexistent/kubeconfig.yaml"))).await;

        let Err(report) = result else {
            panic!("reading a missing kubeconfig should fail");
        };
        assert!(matches!(
            report.current_context(),
            KubernetesError::ConnectionFailed { .. }
        ));
    }
}
