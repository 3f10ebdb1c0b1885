//! Quake Sidecar - orchestration bridge for Quake 3 dedicated servers
//!
//! This crate runs a Quake 3 dedicated server, keeps the orchestration agent
//! informed of its liveness and players, and exports game statistics as
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod orchestration;
pub mod service;
pub mod status;
pub mod types;

// Re-export commonly used types and traits
pub use error::{Result, SidecarError};
pub use types::*;

// Re-export key components
pub use metrics::MetricsSink;
pub use monitor::{HealthMonitor, StatusPoller};
pub use orchestration::OrchestrationClient;
pub use service::{Supervisor, SupervisorExit};
pub use status::StatusSource;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
