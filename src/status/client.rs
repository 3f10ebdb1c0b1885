//! Game-server status client
//!
//! One request, one reply, no retries. Retry policy belongs to the poller.

use crate::error::SidecarError;
use crate::status::protocol::{encode_status_request, parse_status_response};
use crate::types::StatusSnapshot;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

/// Largest datagram a Quake 3 server sends in one packet
const MAX_PACKET_SIZE: usize = 16 * 1024;

/// Source of status snapshots for a game-server address
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Query the server at `address` once
    async fn query(&self, address: &str) -> Result<StatusSnapshot, SidecarError>;
}

/// UDP client for the Quake 3 `getstatus` query
#[derive(Debug, Clone)]
pub struct Quake3StatusClient {
    timeout: Duration,
}

impl Quake3StatusClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn resolve(address: &str) -> Result<SocketAddr, SidecarError> {
        let mut addrs = lookup_host(address)
            .await
            .map_err(|e| SidecarError::unreachable(address, e))?;
        let target = addrs
            .next()
            .ok_or_else(|| SidecarError::unreachable(address, "address did not resolve"))?;

        // The server usually binds 0.0.0.0; query it over loopback instead.
        if target.ip().is_unspecified() {
            let loopback: IpAddr = if target.is_ipv4() {
                std::net::Ipv4Addr::LOCALHOST.into()
            } else {
                std::net::Ipv6Addr::LOCALHOST.into()
            };
            return Ok(SocketAddr::new(loopback, target.port()));
        }
        Ok(target)
    }

    async fn exchange(&self, address: &str, target: SocketAddr) -> Result<Vec<u8>, SidecarError> {
        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| SidecarError::unreachable(address, e))?;
        socket
            .connect(target)
            .await
            .map_err(|e| SidecarError::unreachable(address, e))?;
        socket
            .send(&encode_status_request())
            .await
            .map_err(|e| SidecarError::unreachable(address, e))?;

        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let len = socket
            .recv(&mut buf)
            .await
            .map_err(|e| SidecarError::unreachable(address, e))?;
        buf.truncate(len);
        Ok(buf)
    }
}

impl Default for Quake3StatusClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

#[async_trait]
impl StatusSource for Quake3StatusClient {
    async fn query(&self, address: &str) -> Result<StatusSnapshot, SidecarError> {
        let exchange = async {
            let target = Self::resolve(address).await?;
            self.exchange(address, target).await
        };

        let payload = timeout(self.timeout, exchange).await.map_err(|_| {
            SidecarError::unreachable(address, format!("no reply within {:?}", self.timeout))
        })??;

        debug!("Status reply from {}: {} bytes", address, payload.len());
        parse_status_response(&payload)
    }
}
