use std::path::PathBuf;

use clap::Parser;

/// Default capacity of the pod event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Parser, Clone, Debug)]
pub struct DaemonArgs {
    #[arg(
        long,
        value_hint = clap::ValueHint::FilePath,
        help = "Path to a kubeconfig file (default: $KUBECONFIG, in-cluster or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "POD_DISCOVERY_NAMESPACE",
        help = "Kubernetes namespace to watch (empty for all namespaces)"
    )]
    pub namespace: Option<String>,

    #[arg(
        long,
        env = "NODE_NAME",
        help = "Only discover pods scheduled on this node"
    )]
    pub node_name: Option<String>,

    #[arg(
        long,
        env = "POD_DISCOVERY_LABEL_SELECTOR",
        help = "Label selector restricting the watched pods, e.g. app=web"
    )]
    pub label_selector: Option<String>,

    #[arg(
        long,
        env = "POD_DISCOVERY_API_ADDR",
        default_value = "0.0.0.0:9120",
        help = "Listen address of the target listing API"
    )]
    pub api_listen_addr: String,

    #[arg(
        long,
        default_value_t = DEFAULT_EVENT_CHANNEL_CAPACITY,
        help = "Number of pod events buffered between the watcher and the reconciler"
    )]
    pub event_channel_capacity: usize,

    #[arg(
        long,
        env = "POD_DISCOVERY_LOG_PATH",
        value_hint = clap::ValueHint::DirPath,
        help = "Directory for daily rotated log files, stderr only when unset"
    )]
    pub log_path: Option<PathBuf>,
}
