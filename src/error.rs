//! Error types for the sidecar
//!
//! Application plumbing uses anyhow; the bridging components return the typed
//! `SidecarError` so callers can decide which failures are recoverable.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Errors raised by the status, orchestration and process components
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SidecarError {
    #[error("Game server {address} unreachable: {message}")]
    Unreachable { address: String, message: String },

    #[error("Malformed status reply: {reason}")]
    MalformedReply { reason: String },

    #[error("Orchestration agent call to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Player registration rejected for '{player}': {message}")]
    Registration { player: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Game server process error: {message}")]
    Process { message: String },
}

impl SidecarError {
    pub fn unreachable(address: impl Into<String>, message: impl ToString) -> Self {
        Self::Unreachable {
            address: address.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedReply {
            reason: reason.into(),
        }
    }

    pub fn transport(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// True for failures to reach either the game server or the agent
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SidecarError::unreachable("127.0.0.1:27960", "timed out after 3s");
        assert_eq!(
            err.to_string(),
            "Game server 127.0.0.1:27960 unreachable: timed out after 3s"
        );

        let err = SidecarError::Registration {
            player: "Ann".to_string(),
            message: "HTTP 500".to_string(),
        };
        assert!(err.to_string().contains("'Ann'"));
    }

    #[test]
    fn test_transport_classification() {
        assert!(SidecarError::unreachable("a", "b").is_transport());
        assert!(SidecarError::transport("/health", "refused").is_transport());
        assert!(!SidecarError::malformed("bad header").is_transport());
    }
}
