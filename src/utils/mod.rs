//! # Utility Modules
//!
//! Supporting utilities for observability.
//!
//! ## Components
//! - **Metrics**: per-session atomic counters and an operation timer
//! - **Logging**: `tracing-subscriber` setup from [`crate::config::LoggingConfig`]

pub mod logging;
pub mod metrics;

pub use metrics::{MetricsSnapshot, SessionMetrics};
