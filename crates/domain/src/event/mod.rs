use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::{Device, DeviceProperties, LightProperties, PlugProperties};

type LightEventCtor = fn(Arc<Device>, LightProperties, LightProperties) -> ChangeEvent;

/// Typed state change of a single device.
///
/// Stateful variants carry the device and the snapshots from before and
/// after the change; remote and motion events carry only the device.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    LightOnOff {
        device: Arc<Device>,
        old: LightProperties,
        new: LightProperties,
    },
    LightDimLevel {
        device: Arc<Device>,
        old: LightProperties,
        new: LightProperties,
    },
    LightColourHex {
        device: Arc<Device>,
        old: LightProperties,
        new: LightProperties,
    },
    LightColourX {
        device: Arc<Device>,
        old: LightProperties,
        new: LightProperties,
    },
    LightColourY {
        device: Arc<Device>,
        old: LightProperties,
        new: LightProperties,
    },
    PlugOnOff {
        device: Arc<Device>,
        old: PlugProperties,
        new: PlugProperties,
    },
    /// A remote reported activity (button press)
    Remote { device: Arc<Device> },
    MotionDetected { device: Arc<Device> },
}

impl ChangeEvent {
    /// Compare two snapshots of `device` field by field and produce one
    /// event per changed field.
    ///
    /// Remotes and motion sensors have no comparable state: every
    /// notification yields exactly one event for them. Snapshots of
    /// mismatched kinds produce nothing.
    pub fn between(
        device: &Arc<Device>,
        old: &DeviceProperties,
        new: &DeviceProperties,
    ) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        match (old, new) {
            (DeviceProperties::Light(old), DeviceProperties::Light(new)) => {
                let changed: [(bool, LightEventCtor); 5] = [
                    (old.on != new.on, Self::light_on_off),
                    (old.brightness != new.brightness, Self::light_dim_level),
                    (old.colour_hex != new.colour_hex, Self::light_colour_hex),
                    (old.colour_x != new.colour_x, Self::light_colour_x),
                    (old.colour_y != new.colour_y, Self::light_colour_y),
                ];
                for (is_changed, ctor) in changed {
                    if is_changed {
                        events.push(ctor(device.clone(), old.clone(), new.clone()));
                    }
                }
            }
            (DeviceProperties::Plug(old), DeviceProperties::Plug(new)) => {
                if old.on != new.on {
                    events.push(Self::PlugOnOff {
                        device: device.clone(),
                        old: *old,
                        new: *new,
                    });
                }
            }
            (DeviceProperties::Remote, DeviceProperties::Remote) => {
                events.push(Self::Remote {
                    device: device.clone(),
                });
            }
            (DeviceProperties::MotionSensor, DeviceProperties::MotionSensor) => {
                events.push(Self::MotionDetected {
                    device: device.clone(),
                });
            }
            _ => {}
        }
        events
    }

    fn light_on_off(device: Arc<Device>, old: LightProperties, new: LightProperties) -> Self {
        Self::LightOnOff { device, old, new }
    }

    fn light_dim_level(device: Arc<Device>, old: LightProperties, new: LightProperties) -> Self {
        Self::LightDimLevel { device, old, new }
    }

    fn light_colour_hex(device: Arc<Device>, old: LightProperties, new: LightProperties) -> Self {
        Self::LightColourHex { device, old, new }
    }

    fn light_colour_x(device: Arc<Device>, old: LightProperties, new: LightProperties) -> Self {
        Self::LightColourX { device, old, new }
    }

    fn light_colour_y(device: Arc<Device>, old: LightProperties, new: LightProperties) -> Self {
        Self::LightColourY { device, old, new }
    }

    pub fn device(&self) -> &Arc<Device> {
        match self {
            Self::LightOnOff { device, .. }
            | Self::LightDimLevel { device, .. }
            | Self::LightColourHex { device, .. }
            | Self::LightColourX { device, .. }
            | Self::LightColourY { device, .. }
            | Self::PlugOnOff { device, .. }
            | Self::Remote { device }
            | Self::MotionDetected { device } => device,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::LightOnOff { .. } => "LightOnOff",
            Self::LightDimLevel { .. } => "LightDimLevel",
            Self::LightColourHex { .. } => "LightColourHex",
            Self::LightColourX { .. } => "LightColourX",
            Self::LightColourY { .. } => "LightColourY",
            Self::PlugOnOff { .. } => "PlugOnOff",
            Self::Remote { .. } => "Remote",
            Self::MotionDetected { .. } => "MotionDetected",
        }
    }
}

/// Handle returned when an event handler is registered on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerId(Uuid);

impl HandlerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives change events for a device
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &ChangeEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_event(&self, event: &ChangeEvent) {
        self(event)
    }
}
