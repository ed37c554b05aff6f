use config::{Config, ConfigError, Environment, File};
use domain::ProtocolConfiguration;
use domain::attribute::ConfigurationId;
use serde::{Deserialize, Serialize};

use crate::simulator::SimulatedDeviceConfig;
use crate::transport::TransportKind;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_transport_kind")]
    pub kind: TransportKind,
    /// Security code the simulated gateway expects
    #[serde(default)]
    pub security_code: String,
    /// Devices served by the simulated gateway
    #[serde(default)]
    pub devices: Vec<SimulatedDeviceConfig>,
}

fn default_transport_kind() -> TransportKind {
    TransportKind::Simulator
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
            security_code: String::new(),
            devices: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    pub id: String,
    pub host: Option<String>,
    pub security_code: Option<String>,
    pub enabled: Option<bool>,
}

impl GatewayConfig {
    pub fn to_protocol_configuration(&self) -> ProtocolConfiguration {
        ProtocolConfiguration {
            id: ConfigurationId::new(self.id.clone()),
            gateway_host: self.host.clone(),
            security_code: self.security_code.clone(),
            enabled: self.enabled.unwrap_or(true),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    pub agent_id: String,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub gateways: Vec<GatewayConfig>,
}

impl AgentConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("agent_id", "bridge-agent")?
            .set_default("transport.kind", "simulator")?
            // Local config file, required so the agent never starts unconfigured
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(true))
            // Per run mode overrides, e.g. config/development.toml
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. BRIDGE__AGENT_ID=lab-bridge)
            .add_source(Environment::with_prefix("BRIDGE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Configurations to attach at startup
    pub fn protocol_configurations(&self) -> Vec<ProtocolConfiguration> {
        self.gateways
            .iter()
            .map(GatewayConfig::to_protocol_configuration)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::device::DeviceKind;

    #[test]
    fn test_gateway_config_defaults_to_enabled() {
        let gateway = GatewayConfig {
            id: "living-room".to_string(),
            host: Some("10.0.0.9".to_string()),
            security_code: None,
            enabled: None,
        };
        let config = gateway.to_protocol_configuration();
        assert!(config.enabled);
        assert_eq!(config.id.as_str(), "living-room");
        assert_eq!(config.credentials().unwrap().security_code, "");
    }

    #[test]
    fn test_deserialize_agent_config() {
        let raw = serde_json::json!({
            "agent_id": "lab",
            "transport": {
                "kind": "simulator",
                "security_code": "psk",
                "devices": [
                    {"instance_id": 65537, "name": "Lamp", "kind": "Light", "brightness": 128}
                ]
            },
            "gateways": [{"id": "gw-1", "host": "10.0.0.9", "security_code": "psk"}]
        });
        let config: AgentConfig = serde_json::from_value(raw).unwrap();
        assert_eq!(config.transport.devices[0].kind, DeviceKind::Light);
        assert_eq!(config.protocol_configurations().len(), 1);
    }
}
