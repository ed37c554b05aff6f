use serde_json::{Map, Value};

use domain::attribute::{CommandIntent, DeviceAttribute};
use domain::device::{Device, DeviceKind};
use domain::error::DomainError;
use infrastructure::codec::{self, fields};

/// Translate a model-level write into the gateway payload for `device`.
pub fn translate(device: &Device, intent: &CommandIntent) -> Result<Value, DomainError> {
    let unsupported = || DomainError::UnsupportedCommand {
        device: device.key().to_string(),
        attribute: intent.attribute.clone(),
    };
    let attribute = DeviceAttribute::from_name(&intent.attribute).ok_or_else(unsupported)?;

    match (device.kind(), attribute) {
        (DeviceKind::Light, DeviceAttribute::LightStatus) => {
            let on = switch(&intent.value)?;
            Ok(codec::light_control(entry([(fields::ON_OFF, Value::from(u8::from(on)))])))
        }
        (DeviceKind::Light, DeviceAttribute::LightDimLevel) => {
            let level = dim_level(&intent.value)?;
            Ok(codec::light_control(entry([(fields::DIMMER, Value::from(level))])))
        }
        (DeviceKind::Light, DeviceAttribute::LightColour) => {
            let hex = colour_hex(&intent.value)?;
            Ok(codec::light_control(entry([(fields::COLOUR_HEX, Value::from(hex))])))
        }
        (DeviceKind::Light, DeviceAttribute::LightColourXy) => {
            let (x, y) = colour_xy(&intent.value)?;
            Ok(codec::light_control(entry([
                (fields::COLOUR_X, Value::from(x)),
                (fields::COLOUR_Y, Value::from(y)),
            ])))
        }
        (DeviceKind::Plug, DeviceAttribute::PlugStatus) => {
            Ok(codec::plug_control(switch(&intent.value)?))
        }
        _ => Err(unsupported()),
    }
}

fn entry<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn switch(value: &Value) -> Result<bool, DomainError> {
    value
        .as_bool()
        .ok_or_else(|| DomainError::InvalidValue(format!("Expected a boolean, got {}", value)))
}

fn integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn dim_level(value: &Value) -> Result<u8, DomainError> {
    let level = integer(value)
        .ok_or_else(|| DomainError::InvalidValue(format!("Expected a dim level, got {}", value)))?;
    u8::try_from(level).map_err(|_| {
        DomainError::InvalidValue(format!("Dim level {} is outside 0-255", level))
    })
}

/// Accepts `"rrggbb"`, `"#rrggbb"` or `{ "r", "g", "b" }` (a `w` channel is ignored)
fn colour_hex(value: &Value) -> Result<String, DomainError> {
    match value {
        Value::String(s) => {
            let hex = s.trim().trim_start_matches('#');
            if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                Ok(hex.to_ascii_lowercase())
            } else {
                Err(DomainError::InvalidValue(format!(
                    "Colour must be six hex digits, got '{}'",
                    s
                )))
            }
        }
        Value::Object(map) => {
            let channel = |name: &str| {
                map.get(name)
                    .and_then(integer)
                    .and_then(|c| u8::try_from(c).ok())
                    .ok_or_else(|| {
                        DomainError::InvalidValue(format!(
                            "Colour channel '{}' must be an integer 0-255",
                            name
                        ))
                    })
            };
            Ok(format!(
                "{:02x}{:02x}{:02x}",
                channel("r")?,
                channel("g")?,
                channel("b")?
            ))
        }
        other => Err(DomainError::InvalidValue(format!(
            "Expected a colour, got {}",
            other
        ))),
    }
}

fn colour_xy(value: &Value) -> Result<(u16, u16), DomainError> {
    let coordinate = |name: &str| {
        value
            .get(name)
            .and_then(integer)
            .and_then(|c| u16::try_from(c).ok())
            .ok_or_else(|| {
                DomainError::InvalidValue(format!(
                    "Colour coordinate '{}' must be an integer 0-65535",
                    name
                ))
            })
    };
    Ok((coordinate("x")?, coordinate("y")?))
}
