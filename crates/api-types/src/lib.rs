//! Shared API type definitions
//!
//! This crate contains the wire types served by the pod discovery HTTP API,
//! so scrapers can consume the discovered target list without depending on
//! the discovery daemon itself.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

/// A scrape target as exposed over the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    /// URL the scraper should poll
    pub url: String,
    /// Host component of the URL (the pod IP)
    pub address: String,
    /// URL as originally computed from the pod, before address resolution
    pub original_url: String,
    /// Tags attached to every metric scraped from this target
    pub tags: BTreeMap<String, String>,
}

/// Response format for the target listing API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetsResponse {
    pub targets: Vec<TargetInfo>,
}

/// Response format for the health API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Number of currently registered targets
    pub targets: usize,
}
