use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to an attribute of an asset in the model layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeId {
    pub asset_id: String,
    pub name: String,
}

impl AttributeId {
    pub fn new(asset_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for AttributeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.asset_id, self.name)
    }
}

/// Identifier of a protocol configuration (one gateway attachment)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigurationId(String);

impl ConfigurationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Writable device attributes understood by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceAttribute {
    /// Light on/off (bool)
    LightStatus,
    /// Light dim level (integer 0-255)
    LightDimLevel,
    /// Light colour (hex string or {r, g, b})
    LightColour,
    /// Light chromaticity ({x, y})
    LightColourXy,
    /// Plug on/off (bool)
    PlugStatus,
}

impl DeviceAttribute {
    pub const ALL: [DeviceAttribute; 5] = [
        Self::LightStatus,
        Self::LightDimLevel,
        Self::LightColour,
        Self::LightColourXy,
        Self::PlugStatus,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::LightStatus => "lightStatus",
            Self::LightDimLevel => "lightDimLevel",
            Self::LightColour => "colorGBW",
            Self::LightColourXy => "lightColourXY",
            Self::PlugStatus => "plugOnOrOff",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.name() == name)
    }
}

/// A generic write intent coming from the model layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandIntent {
    pub attribute: String,
    pub value: Value,
}

impl CommandIntent {
    pub fn new(attribute: impl Into<String>, value: Value) -> Self {
        Self {
            attribute: attribute.into(),
            value,
        }
    }

    pub fn for_attribute(attribute: DeviceAttribute, value: Value) -> Self {
        Self::new(attribute.name(), value)
    }
}
