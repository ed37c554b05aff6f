use serde::{Deserialize, Serialize};

use crate::attribute::ConfigurationId;
use crate::error::{DomainError, Result};
use crate::gateway::{GatewayAddress, GatewayCredentials};

/// One gateway attachment as configured in the model layer.
///
/// Rules:
/// - `gateway_host` is required and must not be blank
/// - `security_code` is optional and defaults to empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfiguration {
    pub id: ConfigurationId,
    pub gateway_host: Option<String>,
    #[serde(default)]
    pub security_code: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ProtocolConfiguration {
    pub fn new(id: impl Into<String>, gateway_host: impl Into<String>) -> Self {
        Self {
            id: ConfigurationId::new(id),
            gateway_host: Some(gateway_host.into()),
            security_code: None,
            enabled: true,
        }
    }

    pub fn with_security_code(mut self, security_code: impl Into<String>) -> Self {
        self.security_code = Some(security_code.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Validate and extract the connection key
    pub fn credentials(&self) -> Result<GatewayCredentials> {
        let host = self.gateway_host.as_deref().ok_or_else(|| {
            DomainError::Configuration(format!(
                "No gateway host provided for configuration {}",
                self.id
            ))
        })?;
        let address = GatewayAddress::new(host)?;
        Ok(GatewayCredentials::new(
            address,
            self.security_code.clone().unwrap_or_default(),
        ))
    }
}
