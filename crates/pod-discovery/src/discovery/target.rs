use core::error::Error;
use std::collections::BTreeMap;

use api_types::TargetInfo;
use error_stack::Report;
use error_stack::ResultExt;
use url::Host;
use url::Url;

use crate::k8s::PodSnapshot;

/// Annotation that must be exactly `"true"` for a pod to be scraped.
pub const SCRAPE_ANNOTATION: &str = "prometheus.io/scrape";
/// Annotation overriding the metrics path.
pub const PATH_ANNOTATION: &str = "prometheus.io/path";
/// Annotation overriding the metrics port.
pub const PORT_ANNOTATION: &str = "prometheus.io/port";

pub const DEFAULT_PORT: &str = "9102";
pub const DEFAULT_PATH: &str = "/metrics";

pub const POD_NAME_TAG: &str = "pod_name";
pub const NAMESPACE_TAG: &str = "namespace";

/// Scrape URL and tags derived from a single pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub url: String,
    pub tags: BTreeMap<String, String>,
}

/// A registered scrape target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    /// URL the scraper polls, exactly as built; identifies the target in the registry
    pub url: String,
    /// Host part of the URL, without IPv6 brackets
    pub address: String,
    /// URL as computed from the pod before address resolution
    pub original_url: String,
    pub tags: BTreeMap<String, String>,
}

/// Errors turning a descriptor into a scrape target.
#[derive(Debug, derive_more::Display)]
pub enum TargetError {
    #[display("Invalid scrape URL: {url}")]
    InvalidUrl { url: String },
    #[display("Scrape URL has no host: {url}")]
    MissingHost { url: String },
}

impl Error for TargetError {}

/// Computes the scrape URL of a pod, or `None` if it is not a target.
///
/// A pod without an IP is not a target yet; it will be looked at again when
/// the next event for it arrives.
pub fn scrape_url(pod: &PodSnapshot) -> Option<String> {
    if pod.pod_ip.is_empty() {
        return None;
    }

    if pod.annotations.get(SCRAPE_ANNOTATION).map(String::as_str) != Some("true") {
        return None;
    }

    let port = annotation_or(pod, PORT_ANNOTATION, DEFAULT_PORT);
    let path = annotation_or(pod, PATH_ANNOTATION, DEFAULT_PATH);
    let separator = if path.starts_with('/') { "" } else { "/" };

    Some(format!("http://{}:{port}{separator}{path}", pod.pod_ip))
}

/// Builds the target descriptor for a pod, or `None` if it is not a target.
pub fn build_target(pod: &PodSnapshot) -> Option<TargetDescriptor> {
    let url = scrape_url(pod)?;
    Some(TargetDescriptor {
        url,
        tags: target_tags(pod),
    })
}

/// Tags of a pod's target: every annotation, then pod name and namespace,
/// then every label. Later sources overwrite earlier ones on key collision.
pub fn target_tags(pod: &PodSnapshot) -> BTreeMap<String, String> {
    let mut tags = pod.annotations.clone();
    tags.insert(POD_NAME_TAG.to_string(), pod.name.clone());
    tags.insert(NAMESPACE_TAG.to_string(), pod.namespace.clone());
    tags.extend(
        pod.labels
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    tags
}

fn annotation_or<'a>(pod: &'a PodSnapshot, key: &str, default: &'a str) -> &'a str {
    pod.annotations
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

impl ScrapeTarget {
    /// Validates the descriptor URL and turns it into a target.
    ///
    /// The URL string is kept as built, parsing only checks it and extracts
    /// the address.
    ///
    /// # Errors
    ///
    /// - [`TargetError::InvalidUrl`] if the URL does not parse (bad port, bare IPv6 literal)
    /// - [`TargetError::MissingHost`] if the URL has no host
    pub fn parse(descriptor: TargetDescriptor) -> Result<Self, Report<TargetError>> {
        let parsed = parse_url(&descriptor.url)?;
        let address = match parsed.host() {
            Some(Host::Ipv6(addr)) => addr.to_string(),
            Some(host) => host.to_string(),
            None => {
                return Err(Report::new(TargetError::MissingHost {
                    url: descriptor.url,
                }))
            }
        };

        Ok(Self {
            url: descriptor.url.clone(),
            address,
            original_url: descriptor.url,
            tags: descriptor.tags,
        })
    }
}

/// Parses a scrape URL string.
///
/// # Errors
///
/// - [`TargetError::InvalidUrl`] if the URL does not parse
pub fn parse_url(url: &str) -> Result<Url, Report<TargetError>> {
    Url::parse(url).change_context(TargetError::InvalidUrl {
        url: url.to_string(),
    })
}

impl From<&ScrapeTarget> for TargetInfo {
    fn from(target: &ScrapeTarget) -> Self {
        Self {
            url: target.url.clone(),
            address: target.address.clone(),
            original_url: target.original_url.clone(),
            tags: target.tags.clone(),
        }
    }
}
