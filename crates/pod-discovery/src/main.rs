use anyhow::Result;
use clap::Parser;
use pod_discovery::app::Application;
use pod_discovery::config::Cli;
use pod_discovery::config::Commands;
use pod_discovery::config::DaemonArgs;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon(daemon_args) => run_daemon(*daemon_args).await,
    }
}

async fn run_daemon(daemon_args: DaemonArgs) -> Result<()> {
    let _guard = utils::logging::init(daemon_args.log_path.as_ref())?;

    tracing::info!("Starting pod discovery daemon {}", &**version::VERSION);

    let app = Application::new(daemon_args);
    app.run().await
}
