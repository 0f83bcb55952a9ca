//! Persistence Layer for Derived Metrics
//!
//! Append-only time-series storage of per-(team, service) poll results, read
//! back by the rollup reporter.

pub mod metric_store;

pub use metric_store::MetricStore;
