//! Service layer for the sidecar
//!
//! This module contains the game-server process handling and the supervisor
//! that ties the process and the monitoring loops to one lifecycle.

pub mod process;
pub mod supervisor;

pub use process::{GameServer, GameServerExit, Quake3Server};
pub use supervisor::{Supervisor, SupervisorExit, SupervisorSettings};
