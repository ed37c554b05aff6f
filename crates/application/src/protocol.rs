use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use domain::attribute::{AttributeId, ConfigurationId};
use domain::configuration::ProtocolConfiguration;
use domain::device::{Device, DeviceKey};
use domain::event::{ChangeEvent, EventHandler, HandlerId};
use domain::gateway::{ConnectionStatus, GatewayAddress, ListenerId, StatusListener};
use domain::model::AssetModel;
use domain::transport::Transport;

use crate::binding::{AttributeBinding, AttributeBindingTable};
use crate::dispatch::{CommandDispatcher, ConfigurationState, DispatchOutcome};
use crate::gateway::{GatewayConnection, GatewayConnectionRegistry};

struct Attachment {
    enabled: bool,
    lease: Option<(GatewayAddress, ListenerId)>,
    handlers: Vec<(Arc<Device>, HandlerId)>,
}

/// Attached configurations and whether they accept writes
#[derive(Default)]
pub struct ConfigurationStore {
    attachments: DashMap<ConfigurationId, Attachment>,
}

impl ConfigurationStore {
    fn address_of(&self, configuration: &ConfigurationId) -> Option<GatewayAddress> {
        self.attachments
            .get(configuration)
            .and_then(|attachment| attachment.lease.as_ref().map(|(address, _)| address.clone()))
    }

    pub fn contains(&self, configuration: &ConfigurationId) -> bool {
        self.attachments.contains_key(configuration)
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }
}

impl ConfigurationState for ConfigurationStore {
    fn is_enabled(&self, configuration: &ConfigurationId) -> bool {
        self.attachments
            .get(configuration)
            .is_some_and(|attachment| attachment.enabled)
    }
}

/// Entry point for the asset model: attaches gateway configurations,
/// links attributes to devices and routes writes.
pub struct GatewayProtocol {
    registry: GatewayConnectionRegistry,
    bindings: Arc<AttributeBindingTable>,
    configurations: Arc<ConfigurationStore>,
    dispatcher: CommandDispatcher,
    model: Arc<dyn AssetModel>,
    /// Serialises attach/detach per configuration id
    guards: DashMap<ConfigurationId, Arc<Mutex<()>>>,
}

impl GatewayProtocol {
    pub fn new(transport: Arc<dyn Transport>, model: Arc<dyn AssetModel>) -> Self {
        let bindings = Arc::new(AttributeBindingTable::new());
        let configurations = Arc::new(ConfigurationStore::default());
        let dispatcher = CommandDispatcher::new(bindings.clone(), configurations.clone());

        Self {
            registry: GatewayConnectionRegistry::new(transport),
            bindings,
            configurations,
            dispatcher,
            model,
            guards: DashMap::new(),
        }
    }

    fn guard(&self, configuration: &ConfigurationId) -> Arc<Mutex<()>> {
        self.guards.entry(configuration.clone()).or_default().clone()
    }

    pub fn registry(&self) -> &GatewayConnectionRegistry {
        &self.registry
    }

    pub fn bindings(&self) -> &AttributeBindingTable {
        &self.bindings
    }

    pub fn configurations(&self) -> &ConfigurationStore {
        &self.configurations
    }

    /// Attach a configuration and connect to its gateway.
    ///
    /// Problems are reported through [`AssetModel::on_status_change`]; the
    /// returned status is the connection's status once attaching finished.
    pub async fn attach(&self, configuration: &ProtocolConfiguration) -> ConnectionStatus {
        let id = configuration.id.clone();
        let guard = self.guard(&id);
        let _attaching = guard.lock().await;

        if self.configurations.contains(&id) {
            info!(configuration = %id, "Re-attaching configuration");
            self.detach_attached(&id).await;
        }

        let credentials = match configuration.credentials() {
            Ok(credentials) => credentials,
            Err(e) => {
                error!(configuration = %id, error = %e, "Invalid gateway configuration");
                self.configurations.attachments.insert(
                    id.clone(),
                    Attachment {
                        enabled: configuration.enabled,
                        lease: None,
                        handlers: Vec::new(),
                    },
                );
                let status = ConnectionStatus::configuration_error(e.to_string());
                self.model.on_status_change(&id, &status);
                return status;
            }
        };

        let model = self.model.clone();
        let listener_config = id.clone();
        let listener: Arc<dyn StatusListener> = Arc::new(move |status: &ConnectionStatus| {
            model.on_status_change(&listener_config, status)
        });

        let (connection, listener_id) = self.registry.acquire(&credentials, listener).await;
        self.configurations.attachments.insert(
            id.clone(),
            Attachment {
                enabled: configuration.enabled,
                lease: Some((credentials.address.clone(), listener_id)),
                handlers: Vec::new(),
            },
        );

        info!(configuration = %id, host = %credentials.address, "Attaching configuration");
        match connection.connect().await {
            Ok(devices) => self.announce_devices(&id, &devices),
            Err(e) => warn!(configuration = %id, error = %e, "Gateway not connected"),
        }

        connection.status()
    }

    fn announce_devices(&self, configuration: &ConfigurationId, devices: &[Arc<Device>]) {
        let mut handlers = Vec::with_capacity(devices.len());
        for device in devices {
            self.model.on_device_discovered(configuration, device);

            let model = self.model.clone();
            let owner = configuration.clone();
            let handler: Arc<dyn EventHandler> = Arc::new(move |event: &ChangeEvent| {
                model.on_device_event(&owner, event)
            });
            handlers.push((device.clone(), device.add_event_handler(handler)));
        }

        match self.configurations.attachments.get_mut(configuration) {
            Some(mut attachment) => attachment.handlers.extend(handlers),
            None => {
                warn!(configuration = %configuration, "Configuration vanished while attaching");
                for (device, handler) in handlers {
                    device.remove_event_handler(handler);
                }
            }
        }
    }

    /// Tear down everything the configuration set up. Unknown ids are ignored.
    pub async fn detach(&self, configuration: &ConfigurationId) {
        let guard = self.guard(configuration);
        let _detaching = guard.lock().await;
        self.detach_attached(configuration).await;
    }

    async fn detach_attached(&self, configuration: &ConfigurationId) {
        let Some((_, attachment)) = self.configurations.attachments.remove(configuration) else {
            return;
        };

        for (device, handler) in attachment.handlers {
            device.remove_event_handler(handler);
        }

        let unbound = self.bindings.unbind_configuration(configuration);
        info!(configuration = %configuration, unbound, "Detaching configuration");

        if let Some((address, listener_id)) = attachment.lease {
            self.registry.release(&address, listener_id).await;
        }
    }

    /// Link an attribute to one of the configuration's devices.
    /// Returns false when the device is unknown, accepts no commands or
    /// the attribute is already linked.
    pub async fn link_attribute(
        &self,
        attribute: AttributeId,
        configuration: &ConfigurationId,
        device: &DeviceKey,
    ) -> bool {
        let Some((connection, found)) = self
            .find_device(configuration, |d| d.key() == *device)
            .await
        else {
            warn!(attribute = %attribute, device = %device, "No such device for attribute");
            return false;
        };
        self.bind(attribute, configuration, connection, found)
    }

    /// Link an attribute to the device whose asset id matches the attribute's
    pub async fn link_asset_attribute(
        &self,
        attribute: AttributeId,
        configuration: &ConfigurationId,
    ) -> bool {
        let asset_id = attribute.asset_id.clone();
        let Some((connection, found)) = self
            .find_device(configuration, |d| d.key().asset_id() == asset_id)
            .await
        else {
            warn!(attribute = %attribute, "No device matches the attribute's asset");
            return false;
        };
        self.bind(attribute, configuration, connection, found)
    }

    async fn find_device(
        &self,
        configuration: &ConfigurationId,
        matches: impl Fn(&Device) -> bool,
    ) -> Option<(Arc<GatewayConnection>, Arc<Device>)> {
        let address = self.configurations.address_of(configuration)?;
        let connection = self.registry.lookup(&address).await?;
        let device = connection.devices().into_iter().find(|d| matches(d.as_ref()))?;
        Some((connection, device))
    }

    fn bind(
        &self,
        attribute: AttributeId,
        configuration: &ConfigurationId,
        connection: Arc<GatewayConnection>,
        device: Arc<Device>,
    ) -> bool {
        if !device.kind().is_controllable() {
            warn!(attribute = %attribute, device = %device.key(), "Device accepts no commands");
            return false;
        }
        self.bindings
            .bind(attribute, configuration.clone(), connection, device)
    }

    pub fn unlink_attribute(&self, attribute: &AttributeId) -> Option<AttributeBinding> {
        self.bindings.unbind(attribute)
    }

    pub async fn write(&self, attribute: &AttributeId, value: Value) -> DispatchOutcome {
        self.dispatcher.dispatch(attribute, value).await
    }

    /// Returns false for unknown configurations
    pub fn set_enabled(&self, configuration: &ConfigurationId, enabled: bool) -> bool {
        match self.configurations.attachments.get_mut(configuration) {
            Some(mut attachment) => {
                attachment.enabled = enabled;
                info!(configuration = %configuration, enabled, "Configuration toggled");
                true
            }
            None => false,
        }
    }

    /// Detach every configuration
    pub async fn shutdown(&self) {
        let ids: Vec<ConfigurationId> = self
            .configurations
            .attachments
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for id in ids {
            self.detach(&id).await;
        }
    }
}
