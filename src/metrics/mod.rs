//! Metrics and monitoring for the sidecar
//!
//! This module provides the Prometheus metrics sink fed from game-server
//! status snapshots and the HTTP endpoints that expose it.

pub mod collector;
pub mod server;

pub use collector::MetricsSink;
pub use server::{MetricsServer, MetricsServerConfig};
