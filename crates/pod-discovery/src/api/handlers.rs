use std::sync::Arc;

use poem::handler;
use poem::web::Data;
use poem::web::Json;
use poem::web::Query;
use serde::Deserialize;

use super::HealthResponse;
use super::TargetInfo;
use super::TargetsResponse;
use crate::discovery::target::NAMESPACE_TAG;
use crate::discovery::TargetRegistry;

/// Query parameters for the target listing
#[derive(Debug, Default, Deserialize)]
pub struct TargetsQuery {
    pub namespace: Option<String>,
}

/// List registered scrape targets
#[handler]
pub async fn list_targets(
    Query(query): Query<TargetsQuery>,
    registry: Data<&Arc<TargetRegistry>>,
) -> Json<TargetsResponse> {
    let targets = registry
        .snapshot()
        .await
        .iter()
        .filter(|target| match &query.namespace {
            Some(ns) => target.tags.get(NAMESPACE_TAG) == Some(ns),
            None => true,
        })
        .map(TargetInfo::from)
        .collect();

    Json(TargetsResponse { targets })
}

#[handler]
pub async fn health(registry: Data<&Arc<TargetRegistry>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        targets: registry.len().await,
    })
}
