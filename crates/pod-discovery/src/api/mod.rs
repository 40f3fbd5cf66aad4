//! HTTP API exposing the discovered scrape targets
//!
//! # API Endpoints
//!
//! - `GET /api/v1/targets` - All registered targets, optionally filtered with
//!   `?namespace=<ns>` on the `namespace` tag
//! - `GET /healthz` - Liveness and the number of registered targets

use core::error::Error;

pub use api_types::HealthResponse;
pub use api_types::TargetInfo;
pub use api_types::TargetsResponse;

pub mod handlers;
pub mod server;

/// API errors
#[derive(Debug, derive_more::Display)]
pub enum ApiError {
    #[display("Server error: {message}")]
    ServerError { message: String },
}

impl Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_formatting() {
        let server_error = ApiError::ServerError {
            message: "address in use".to_string(),
        };
        assert_eq!(server_error.to_string(), "Server error: address in use");
    }
}
