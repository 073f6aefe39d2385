//! # Utility Modules
//!
//! Supporting utilities for logging and metrics.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` initialization from configuration
//! - **Metrics**: Thread-safe counters for cycles, traffic and failures

pub mod logging;
pub mod metrics;

pub use metrics::{global_metrics, Metrics, MetricsSnapshot};
