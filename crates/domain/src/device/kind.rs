use serde::{Deserialize, Serialize};

/// Closed set of device classes the bridge understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Light,
    Plug,
    Remote,
    MotionSensor,
    Unknown,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Plug => "plug",
            Self::Remote => "remote",
            Self::MotionSensor => "motion_sensor",
            Self::Unknown => "unknown",
        }
    }

    /// Whether devices of this kind accept commands
    pub fn is_controllable(&self) -> bool {
        matches!(self, Self::Light | Self::Plug)
    }
}

/// Structured device key: kind tag plus the gateway-assigned instance id.
///
/// Two devices sharing a display name never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceKey {
    pub kind: DeviceKind,
    pub instance_id: u32,
}

impl DeviceKey {
    pub fn new(kind: DeviceKind, instance_id: u32) -> Self {
        Self { kind, instance_id }
    }

    /// Stable id for the asset mirroring this device in the model layer
    pub fn asset_id(&self) -> String {
        format!("tradfri_{}", self.instance_id)
    }
}

impl std::fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_asset_id() {
        let key = DeviceKey::new(DeviceKind::Light, 65537);
        assert_eq!(key.to_string(), "light:65537");
        assert_eq!(key.asset_id(), "tradfri_65537");
    }

    #[test]
    fn test_keys_differ_by_kind() {
        let light = DeviceKey::new(DeviceKind::Light, 1);
        let plug = DeviceKey::new(DeviceKind::Plug, 1);
        assert_ne!(light, plug);
    }

    #[test]
    fn test_only_lights_and_plugs_are_controllable() {
        assert!(DeviceKind::Light.is_controllable());
        assert!(DeviceKind::Plug.is_controllable());
        assert!(!DeviceKind::Remote.is_controllable());
        assert!(!DeviceKind::MotionSensor.is_controllable());
        assert!(!DeviceKind::Unknown.is_controllable());
    }
}
