use crate::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Value object identifying a gateway on the network.
///
/// Rules:
/// - Must be non-empty after trimming
/// - Surrounding whitespace is not significant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatewayAddress(String);

impl GatewayAddress {
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let host = host.into();
        let trimmed = host.trim();

        if trimmed.is_empty() {
            return Err(DomainError::Configuration(
                "Gateway host cannot be empty".to_string(),
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GatewayAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address plus the pre-shared security code used for the handshake
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub address: GatewayAddress,
    pub security_code: String,
}

impl GatewayCredentials {
    pub fn new(address: GatewayAddress, security_code: impl Into<String>) -> Self {
        Self {
            address,
            security_code: security_code.into(),
        }
    }
}

// The security code never ends up in logs.
impl std::fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("address", &self.address)
            .field("security_code", &"<redacted>")
            .finish()
    }
}
