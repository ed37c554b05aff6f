use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use domain::attribute::{AttributeId, ConfigurationId};
use domain::device::Device;

use crate::gateway::GatewayConnection;

/// Where writes to an attribute go
#[derive(Clone)]
pub struct AttributeBinding {
    pub attribute: AttributeId,
    pub configuration: ConfigurationId,
    pub connection: Arc<GatewayConnection>,
    pub device: Arc<Device>,
}

/// Attribute → (connection, device) routing for outbound commands
#[derive(Default)]
pub struct AttributeBindingTable {
    bindings: DashMap<AttributeId, AttributeBinding>,
}

impl AttributeBindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// First writer wins: returns false if the attribute is already bound.
    pub fn bind(
        &self,
        attribute: AttributeId,
        configuration: ConfigurationId,
        connection: Arc<GatewayConnection>,
        device: Arc<Device>,
    ) -> bool {
        match self.bindings.entry(attribute) {
            Entry::Occupied(entry) => {
                debug!(attribute = %entry.key(), "Attribute already bound");
                false
            }
            Entry::Vacant(entry) => {
                info!(
                    attribute = %entry.key(),
                    configuration = %configuration,
                    device = %device.key(),
                    "Attribute bound"
                );
                let attribute = entry.key().clone();
                entry.insert(AttributeBinding {
                    attribute,
                    configuration,
                    connection,
                    device,
                });
                true
            }
        }
    }

    pub fn unbind(&self, attribute: &AttributeId) -> Option<AttributeBinding> {
        self.bindings.remove(attribute).map(|(_, binding)| binding)
    }

    pub fn resolve(&self, attribute: &AttributeId) -> Option<AttributeBinding> {
        self.bindings.get(attribute).map(|entry| entry.value().clone())
    }

    /// Remove every binding owned by `configuration`
    pub fn unbind_configuration(&self, configuration: &ConfigurationId) -> usize {
        let owned: Vec<AttributeId> = self
            .bindings
            .iter()
            .filter(|entry| entry.value().configuration == *configuration)
            .map(|entry| entry.key().clone())
            .collect();

        owned
            .iter()
            .filter(|attribute| {
                self.bindings
                    .remove_if(*attribute, |_, binding| binding.configuration == *configuration)
                    .is_some()
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::device::{DeviceInfo, DeviceProperties, PlugProperties};
    use domain::gateway::{GatewayAddress, GatewayCredentials};
    use infrastructure::simulator::SimulatedGateway;

    fn connection() -> Arc<GatewayConnection> {
        let credentials =
            GatewayCredentials::new(GatewayAddress::new("10.0.0.1").unwrap(), "secret");
        GatewayConnection::new(credentials, Arc::new(SimulatedGateway::new("secret")))
    }

    fn plug(instance_id: u32) -> Arc<Device> {
        Arc::new(Device::new(
            instance_id,
            "Plug",
            chrono::Utc::now(),
            DeviceInfo::default(),
            DeviceProperties::Plug(PlugProperties { on: false }),
        ))
    }

    #[test]
    fn test_first_binding_wins() {
        let table = AttributeBindingTable::new();
        let connection = connection();
        let attribute = AttributeId::new("asset-1", "plugOnOrOff");

        assert!(table.bind(
            attribute.clone(),
            ConfigurationId::new("a"),
            connection.clone(),
            plug(1)
        ));
        assert!(!table.bind(
            attribute.clone(),
            ConfigurationId::new("b"),
            connection,
            plug(2)
        ));

        let binding = table.resolve(&attribute).unwrap();
        assert_eq!(binding.attribute, attribute);
        assert_eq!(binding.configuration, ConfigurationId::new("a"));
        assert_eq!(binding.device.instance_id(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unbind_configuration_leaves_others() {
        let table = AttributeBindingTable::new();
        let connection = connection();
        let device = plug(1);

        for (asset, configuration) in [("x", "a"), ("y", "a"), ("z", "b")] {
            table.bind(
                AttributeId::new(asset, "plugOnOrOff"),
                ConfigurationId::new(configuration),
                connection.clone(),
                device.clone(),
            );
        }

        assert_eq!(table.unbind_configuration(&ConfigurationId::new("a")), 2);
        assert_eq!(table.len(), 1);
        assert!(table.resolve(&AttributeId::new("z", "plugOnOrOff")).is_some());
        assert!(table.unbind(&AttributeId::new("z", "plugOnOrOff")).is_some());
        assert!(table.is_empty());
    }
}
