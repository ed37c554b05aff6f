use serde::{Deserialize, Serialize};

use super::DeviceKind;

/// State of a light at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LightProperties {
    pub on: bool,
    /// Dim level, 0-255
    pub brightness: u8,
    pub colour_hex: Option<String>,
    /// CIE X chromaticity, 0-65535
    pub colour_x: Option<u16>,
    /// CIE Y chromaticity, 0-65535
    pub colour_y: Option<u16>,
    /// Colour temperature in mireds
    pub colour_temperature: Option<u16>,
    /// Transition time in tenths of a second
    pub transition_time: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlugProperties {
    pub on: bool,
}

/// Immutable snapshot of a device's variant-specific state.
///
/// Updates never mutate a snapshot; they replace it, so an observer can
/// compare the previous and the new value without racing the writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DeviceProperties {
    Light(LightProperties),
    Plug(PlugProperties),
    Remote,
    MotionSensor,
    Unknown,
}

impl DeviceProperties {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Light(_) => DeviceKind::Light,
            Self::Plug(_) => DeviceKind::Plug,
            Self::Remote => DeviceKind::Remote,
            Self::MotionSensor => DeviceKind::MotionSensor,
            Self::Unknown => DeviceKind::Unknown,
        }
    }

    /// Empty snapshot for a kind, used before the first state is known
    pub fn empty(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Light => Self::Light(LightProperties::default()),
            DeviceKind::Plug => Self::Plug(PlugProperties::default()),
            DeviceKind::Remote => Self::Remote,
            DeviceKind::MotionSensor => Self::MotionSensor,
            DeviceKind::Unknown => Self::Unknown,
        }
    }

    pub fn as_light(&self) -> Option<&LightProperties> {
        match self {
            Self::Light(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_plug(&self) -> Option<&PlugProperties> {
        match self {
            Self::Plug(props) => Some(props),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            DeviceProperties::Light(LightProperties::default()).kind(),
            DeviceKind::Light
        );
        assert_eq!(
            DeviceProperties::Plug(PlugProperties { on: true }).kind(),
            DeviceKind::Plug
        );
        assert_eq!(DeviceProperties::Remote.kind(), DeviceKind::Remote);
    }

    #[test]
    fn test_empty_round_trips_kind() {
        for kind in [
            DeviceKind::Light,
            DeviceKind::Plug,
            DeviceKind::Remote,
            DeviceKind::MotionSensor,
            DeviceKind::Unknown,
        ] {
            assert_eq!(DeviceProperties::empty(kind).kind(), kind);
        }
    }

    #[test]
    fn test_accessors() {
        let plug = DeviceProperties::Plug(PlugProperties { on: true });
        assert!(plug.as_light().is_none());
        assert_eq!(plug.as_plug(), Some(&PlugProperties { on: true }));
    }
}
