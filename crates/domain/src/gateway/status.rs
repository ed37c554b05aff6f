use serde::{Deserialize, Serialize};

/// Why a gateway connection ended up in the error state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum StatusReason {
    /// Missing or invalid configuration; not retried automatically
    Configuration(String),
    /// Handshake or discovery failed; reattach to retry
    Connection(String),
    /// A subscription stream failed after the connection was established
    Transport(String),
}

impl std::fmt::Display for StatusReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration: {}", msg),
            Self::Connection(msg) => write!(f, "connection: {}", msg),
            Self::Transport(msg) => write!(f, "transport: {}", msg),
        }
    }
}

/// Connection status of a gateway, as surfaced to configurations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionStatus {
    /// No session
    #[default]
    Disconnected,
    /// Handshake or discovery in progress
    Connecting,
    /// Session established and devices discovered
    Connected,
    /// Failed; see reason
    Error(StatusReason),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::Error(StatusReason::Configuration(message.into()))
    }

    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::Error(StatusReason::Connection(message.into()))
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::Error(StatusReason::Transport(message.into()))
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Error(reason) => write!(f, "ERROR ({})", reason),
        }
    }
}
