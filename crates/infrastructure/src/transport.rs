use std::sync::Arc;

use domain::DomainError;
use domain::transport::Transport;
use serde::{Deserialize, Serialize};

use crate::config::TransportConfig;
use crate::simulator::SimulatedGateway;

/// Transport implementations the agent can be wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-memory gateway
    Simulator,
    /// CoAP over DTLS, provided by an external client library
    Coap,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simulator => "simulator",
            Self::Coap => "coap",
        }
    }
}

/// Factory for creating transports
pub struct TransportFactory;

impl TransportFactory {
    /// Create a transport from configuration
    pub fn create(config: &TransportConfig) -> Result<Arc<dyn Transport>, DomainError> {
        match config.kind {
            TransportKind::Simulator => {
                tracing::info!(
                    devices = config.devices.len(),
                    "Using simulated gateway transport"
                );
                Ok(Arc::new(SimulatedGateway::from_devices(
                    config.security_code.clone(),
                    &config.devices,
                )) as Arc<dyn Transport>)
            }
            TransportKind::Coap => Err(DomainError::Configuration(
                "CoAP/DTLS transport is not bundled with this build".to_string(),
            )),
        }
    }
}
