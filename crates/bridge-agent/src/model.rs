use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use domain::attribute::{AttributeId, ConfigurationId, DeviceAttribute};
use domain::device::{Device, DeviceKey, DeviceKind};
use domain::event::ChangeEvent;
use domain::gateway::ConnectionStatus;
use domain::model::AssetModel;

/// Asset model of the standalone agent: logs everything and remembers the
/// discovered devices so their primary attribute can be linked.
#[derive(Default)]
pub struct LoggingAssetModel {
    discovered: Mutex<Vec<(ConfigurationId, DeviceKey)>>,
}

impl LoggingAssetModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices discovered since the last call
    pub fn take_discovered(&self) -> Vec<(ConfigurationId, DeviceKey)> {
        std::mem::take(&mut *self.discovered.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Attribute driving the device's main state, if it accepts commands
pub fn primary_attribute(key: &DeviceKey) -> Option<AttributeId> {
    let attribute = match key.kind {
        DeviceKind::Light => DeviceAttribute::LightStatus,
        DeviceKind::Plug => DeviceAttribute::PlugStatus,
        _ => return None,
    };
    Some(AttributeId::new(key.asset_id(), attribute.name()))
}

impl AssetModel for LoggingAssetModel {
    fn on_device_discovered(&self, configuration: &ConfigurationId, device: &Arc<Device>) {
        info!(
            configuration = %configuration,
            device = %device,
            kind = device.kind().as_str(),
            model = %device.info().model_number,
            "🔎 Device discovered"
        );
        self.discovered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((configuration.clone(), device.key()));
    }

    fn on_status_change(&self, configuration: &ConfigurationId, status: &ConnectionStatus) {
        if status.is_error() {
            warn!(configuration = %configuration, status = %status, "⚠️ Gateway status");
        } else {
            info!(configuration = %configuration, status = %status, "📡 Gateway status");
        }
    }

    fn on_device_event(&self, configuration: &ConfigurationId, event: &ChangeEvent) {
        let device = event.device();
        match event {
            ChangeEvent::LightOnOff { new, .. } => info!(
                configuration = %configuration,
                device = %device,
                on = new.on,
                "💡 Light switched"
            ),
            ChangeEvent::LightDimLevel { old, new, .. } => info!(
                configuration = %configuration,
                device = %device,
                from = old.brightness,
                to = new.brightness,
                "💡 Light dimmed"
            ),
            ChangeEvent::PlugOnOff { new, .. } => info!(
                configuration = %configuration,
                device = %device,
                on = new.on,
                "🔌 Plug switched"
            ),
            other => info!(
                configuration = %configuration,
                device = %device,
                event = other.event_type(),
                "Device event"
            ),
        }
    }
}
