use serde::{Deserialize, Serialize};

/// Power source reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PowerSource {
    #[default]
    Unknown,
    InternalBattery,
    ExternalBattery,
    Battery,
    PowerOverEthernet,
    Usb,
    AcPower,
    Solar,
}

impl PowerSource {
    /// Map the gateway's numeric power source code
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::InternalBattery,
            2 => Self::ExternalBattery,
            3 => Self::Battery,
            4 => Self::PowerOverEthernet,
            5 => Self::Usb,
            6 => Self::AcPower,
            7 => Self::Solar,
            _ => Self::Unknown,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::InternalBattery => 1,
            Self::ExternalBattery => 2,
            Self::Battery => 3,
            Self::PowerOverEthernet => 4,
            Self::Usb => 5,
            Self::AcPower => 6,
            Self::Solar => 7,
        }
    }
}

/// Static device metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model_number: String,
    pub firmware_version: String,
    pub power_source: PowerSource,
    pub battery_level: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_source_codes() {
        for source in [
            PowerSource::Unknown,
            PowerSource::InternalBattery,
            PowerSource::ExternalBattery,
            PowerSource::Battery,
            PowerSource::PowerOverEthernet,
            PowerSource::Usb,
            PowerSource::AcPower,
            PowerSource::Solar,
        ] {
            assert_eq!(PowerSource::from_code(source.code()), source);
        }
        assert_eq!(PowerSource::from_code(42), PowerSource::Unknown);
    }
}
