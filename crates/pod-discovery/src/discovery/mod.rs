//! Scrape target discovery.
//!
//! Pods opt in with the `prometheus.io/scrape: "true"` annotation. The
//! [`target`] builder turns a pod into a scrape URL plus tags, the
//! [`TargetRegistry`] holds the active targets, and the [`Reconciler`]
//! keeps the registry in line with pod events.

pub mod reconciler;
pub mod registry;
pub mod target;

pub use reconciler::Reconciler;
pub use registry::TargetRegistry;
pub use target::ScrapeTarget;
pub use target::TargetDescriptor;
