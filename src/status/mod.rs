//! Game-server status channel
//!
//! This module queries the dedicated server for its current map and
//! connected players.

pub mod client;
pub mod protocol;

pub use client::{Quake3StatusClient, StatusSource};
pub use protocol::{encode_status_request, parse_status_response};
