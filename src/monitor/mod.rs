//! Background loops bridging the game server to the orchestrator
//!
//! Both loops tick on a fixed interval and share one cancellation token
//! owned by the supervisor.

pub mod health;
pub mod status;

pub use health::{HealthMonitor, HealthState, MonitorExit};
pub use status::{PollOutcome, StatusPoller};
