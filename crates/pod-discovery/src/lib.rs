//! Discovers Prometheus scrape targets from Kubernetes pods.
//!
//! Pods annotated with `prometheus.io/scrape: "true"` are turned into scrape
//! targets and kept in a shared [`discovery::TargetRegistry`] that follows
//! pod creation, updates and deletion.

pub mod api;
pub mod app;
pub mod config;
pub mod discovery;
pub mod k8s;
