//! Orchestration platform integration
//!
//! This module wraps the lifecycle SDK the orchestrator exposes to game
//! servers: readiness, liveness pings and player tracking.

pub mod agones;
pub mod client;

pub use agones::{AgonesClient, AgonesConfig};
pub use client::{OrchestrationClient, StandaloneOrchestrator};
