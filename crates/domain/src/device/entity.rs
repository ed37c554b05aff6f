use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::{DeviceInfo, DeviceKey, DeviceKind, DeviceProperties};
use crate::event::{EventHandler, HandlerId};

/// A device discovered on a gateway.
///
/// Identity (key, creation date, metadata) is fixed at discovery. The name
/// and the properties snapshot change as the gateway pushes updates.
/// Shared as `Arc<Device>` between the owning connection, attribute
/// bindings and change events.
pub struct Device {
    key: DeviceKey,
    created_at: DateTime<Utc>,
    info: DeviceInfo,
    state: RwLock<DeviceState>,
    handlers: Mutex<Vec<(HandlerId, Arc<dyn EventHandler>)>>,
}

struct DeviceState {
    name: String,
    properties: Arc<DeviceProperties>,
}

impl Device {
    /// The device kind is taken from the initial properties snapshot
    pub fn new(
        instance_id: u32,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        info: DeviceInfo,
        properties: DeviceProperties,
    ) -> Self {
        Self {
            key: DeviceKey::new(properties.kind(), instance_id),
            created_at,
            info,
            state: RwLock::new(DeviceState {
                name: name.into(),
                properties: Arc::new(properties),
            }),
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn key(&self) -> DeviceKey {
        self.key
    }

    pub fn kind(&self) -> DeviceKind {
        self.key.kind
    }

    pub fn instance_id(&self) -> u32 {
        self.key.instance_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn name(&self) -> String {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .name
            .clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .name = name.into();
    }

    /// Current properties snapshot
    pub fn properties(&self) -> Arc<DeviceProperties> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .properties
            .clone()
    }

    /// Install a new snapshot and return the one it replaced.
    ///
    /// A snapshot of a different kind is ignored and the current one is
    /// returned unchanged.
    pub fn replace_properties(&self, properties: DeviceProperties) -> Arc<DeviceProperties> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if properties.kind() != self.key.kind {
            tracing::warn!(
                device = %self.key,
                received = properties.kind().as_str(),
                "Ignoring properties snapshot of a different kind"
            );
            return state.properties.clone();
        }
        std::mem::replace(&mut state.properties, Arc::new(properties))
    }

    /// Gateway path of this device's resource
    pub fn endpoint(&self) -> String {
        crate::transport::endpoints::device(self.key.instance_id)
    }

    pub fn add_event_handler(&self, handler: Arc<dyn EventHandler>) -> HandlerId {
        let id = HandlerId::new();
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }

    pub fn remove_event_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    /// Snapshot of the registered handlers, in registration order.
    /// Dispatching iterates this copy so handlers may (un)register freely.
    pub fn event_handlers(&self) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect()
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("key", &self.key)
            .field("name", &self.name())
            .field("created_at", &self.created_at)
            .field("info", &self.info)
            .field("properties", &self.properties())
            .finish()
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{LightProperties, PlugProperties};
    use crate::event::ChangeEvent;

    fn light(brightness: u8) -> Device {
        Device::new(
            65537,
            "Kitchen",
            Utc::now(),
            DeviceInfo::default(),
            DeviceProperties::Light(LightProperties {
                on: true,
                brightness,
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_device_creation() {
        let device = light(10);
        assert_eq!(device.kind(), DeviceKind::Light);
        assert_eq!(device.instance_id(), 65537);
        assert_eq!(device.name(), "Kitchen");
        assert_eq!(device.endpoint(), "15001/65537");
    }

    #[test]
    fn test_replace_properties_returns_previous_snapshot() {
        let device = light(10);
        let before = device.properties();

        let old = device.replace_properties(DeviceProperties::Light(LightProperties {
            on: true,
            brightness: 20,
            ..Default::default()
        }));

        assert!(Arc::ptr_eq(&before, &old));
        assert_eq!(device.properties().as_light().unwrap().brightness, 20);
        // The old snapshot is untouched
        assert_eq!(old.as_light().unwrap().brightness, 10);
    }

    #[test]
    fn test_replace_properties_rejects_other_kind() {
        let device = light(10);
        let returned =
            device.replace_properties(DeviceProperties::Plug(PlugProperties { on: true }));
        assert_eq!(returned.kind(), DeviceKind::Light);
        assert_eq!(device.properties().as_light().unwrap().brightness, 10);
    }

    #[test]
    fn test_handlers_keep_registration_order_and_can_be_removed() {
        let device = light(10);
        let first: Arc<dyn EventHandler> = Arc::new(|_: &ChangeEvent| {});
        let second: Arc<dyn EventHandler> = Arc::new(|_: &ChangeEvent| {});

        let first_id = device.add_event_handler(first.clone());
        device.add_event_handler(second.clone());

        let snapshot = device.event_handlers();
        assert_eq!(snapshot.len(), 2);
        assert!(Arc::ptr_eq(&snapshot[0], &first));
        assert!(Arc::ptr_eq(&snapshot[1], &second));

        assert!(device.remove_event_handler(first_id));
        assert!(!device.remove_event_handler(first_id));
        assert_eq!(device.event_handlers().len(), 1);
    }

    #[test]
    fn test_rename() {
        let device = light(10);
        device.set_name("Hallway");
        assert_eq!(device.name(), "Hallway");
        assert_eq!(device.to_string(), "Hallway (light:65537)");
    }
}
