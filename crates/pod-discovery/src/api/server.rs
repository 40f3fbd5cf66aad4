use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use poem::get;
use poem::listener::TcpListener;
use poem::middleware::Tracing;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use super::handlers::health;
use super::handlers::list_targets;
use super::ApiError;
use crate::discovery::TargetRegistry;

/// Time given to in-flight requests on shutdown.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the API routes over a target registry.
pub fn routes(registry: Arc<TargetRegistry>) -> impl Endpoint {
    Route::new()
        .at("/api/v1/targets", get(list_targets))
        .at("/healthz", get(health))
        .data(registry)
        .with(Tracing)
}

/// HTTP API server for querying discovered scrape targets
pub struct ApiServer {
    registry: Arc<TargetRegistry>,
    listen_addr: String,
}

impl ApiServer {
    pub fn new(registry: Arc<TargetRegistry>, listen_addr: String) -> Self {
        Self {
            registry,
            listen_addr,
        }
    }

    /// Start the API server and serve until cancelled
    ///
    /// # Errors
    ///
    /// - [`ApiError::ServerError`] if the server fails to start or bind to the address
    pub async fn run(self, cancellation_token: CancellationToken) -> Result<(), Report<ApiError>> {
        info!("Starting HTTP API server on {}", self.listen_addr);

        let listener = TcpListener::bind(self.listen_addr.as_str());
        let result = Server::new(listener)
            .run_with_graceful_shutdown(
                routes(self.registry),
                async move { cancellation_token.cancelled().await },
                Some(GRACEFUL_SHUTDOWN_TIMEOUT),
            )
            .await;

        match result {
            Ok(()) => {
                info!("API server stopped");
                Ok(())
            }
            Err(e) => {
                error!("API server failed: {e}");
                Err(Report::new(ApiError::ServerError {
                    message: format!("Server failed: {e}"),
                }))
            }
        }
    }
}
