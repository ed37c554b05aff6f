use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Missing or invalid gateway configuration. Fatal to that configuration.
    #[error("Invalid gateway configuration: {0}")]
    Configuration(String),

    /// Handshake or discovery failure.
    #[error("Gateway connection failed: {0}")]
    Connection(String),

    /// A single request or subscription failed at the transport layer.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unsupported command '{attribute}' for device {device}")]
    UnsupportedCommand { device: String, attribute: String },

    #[error("Attribute is not bound to a device: {0}")]
    UnboundAttribute(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Failed to decode payload: {0}")]
    Decode(String),
}

impl DomainError {
    /// Short category name, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Connection(_) => "connection",
            Self::Transport(_) => "transport",
            Self::UnsupportedCommand { .. } => "unsupported_command",
            Self::UnboundAttribute(_) => "unbound_attribute",
            Self::InvalidValue(_) => "invalid_value",
            Self::Decode(_) => "decode",
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
