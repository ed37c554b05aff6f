//! Gateway payload codec.
//!
//! Payloads are JSON objects keyed by numeric field ids. Unknown fields are
//! ignored on decode so newer firmware does not break older bridges.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use domain::DomainError;
use domain::device::{
    Device, DeviceInfo, DeviceKind, DeviceProperties, LightProperties, PlugProperties,
    PowerSource,
};

/// Field identifiers used by the gateway
pub mod fields {
    pub const NAME: &str = "9001";
    pub const CREATION_DATE: &str = "9002";
    pub const INSTANCE_ID: &str = "9003";
    pub const TYPE: &str = "5750";

    pub const DEVICE_INFO: &str = "3";
    pub const MANUFACTURER: &str = "0";
    pub const MODEL_NUMBER: &str = "1";
    pub const FIRMWARE_VERSION: &str = "3";
    pub const POWER_SOURCE: &str = "6";
    pub const BATTERY_LEVEL: &str = "9";

    pub const LIGHT: &str = "3311";
    pub const PLUG: &str = "3312";
    pub const REMOTE: &str = "15009";
    pub const SENSOR: &str = "3300";

    pub const ON_OFF: &str = "5850";
    pub const DIMMER: &str = "5851";
    pub const COLOUR_HEX: &str = "5706";
    pub const COLOUR_X: &str = "5709";
    pub const COLOUR_Y: &str = "5710";
    pub const COLOUR_TEMPERATURE: &str = "5711";
    pub const TRANSITION_TIME: &str = "5712";
}

/// Device type codes reported in the `5750` field
mod type_codes {
    pub const REMOTE: i64 = 0;
    pub const LIGHT: i64 = 2;
    pub const PLUG: i64 = 3;
    pub const MOTION_SENSOR: i64 = 4;
}

fn as_object<'a>(payload: &'a Value, what: &str) -> Result<&'a Map<String, Value>, DomainError> {
    payload
        .as_object()
        .ok_or_else(|| DomainError::Decode(format!("{} payload is not an object", what)))
}

/// First element of a control list such as `"3311": [{...}]`
fn control_entry<'a>(
    object: &'a Map<String, Value>,
    field: &str,
) -> Option<&'a Map<String, Value>> {
    object
        .get(field)?
        .as_array()?
        .first()?
        .as_object()
}

fn int_field(object: &Map<String, Value>, field: &str) -> Option<i64> {
    object.get(field).and_then(Value::as_i64)
}

/// Absent keeps `current`, null clears it
fn u16_field(
    object: &Map<String, Value>,
    field: &str,
    current: Option<u16>,
) -> Result<Option<u16>, DomainError> {
    match object.get(field) {
        None => Ok(current),
        Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| DomainError::Decode(format!("field {} out of range: {}", field, value))),
    }
}

/// On/off is sent as 0/1 by the gateway; booleans are accepted too
fn on_off_field(object: &Map<String, Value>, current: bool) -> Result<bool, DomainError> {
    match object.get(fields::ON_OFF) {
        None => Ok(current),
        Some(Value::Bool(on)) => Ok(*on),
        Some(value) => value
            .as_i64()
            .map(|n| n != 0)
            .ok_or_else(|| DomainError::Decode(format!("invalid on/off value: {}", value))),
    }
}

/// Classify a device from its reported capabilities.
///
/// Capability lists take precedence; the type code is the fallback.
pub fn classify(payload: &Value) -> DeviceKind {
    let Some(object) = payload.as_object() else {
        return DeviceKind::Unknown;
    };

    if object.contains_key(fields::LIGHT) {
        return DeviceKind::Light;
    }
    if object.contains_key(fields::PLUG) {
        return DeviceKind::Plug;
    }
    if object.contains_key(fields::REMOTE) {
        return DeviceKind::Remote;
    }
    if object.contains_key(fields::SENSOR) {
        return DeviceKind::MotionSensor;
    }

    match int_field(object, fields::TYPE) {
        Some(type_codes::LIGHT) => DeviceKind::Light,
        Some(type_codes::PLUG) => DeviceKind::Plug,
        Some(type_codes::REMOTE) => DeviceKind::Remote,
        Some(type_codes::MOTION_SENSOR) => DeviceKind::MotionSensor,
        _ => DeviceKind::Unknown,
    }
}

/// Decode the variant-specific state of a device of the given kind
pub fn decode_properties(
    kind: DeviceKind,
    payload: &Value,
) -> Result<DeviceProperties, DomainError> {
    decode_properties_over(&DeviceProperties::empty(kind), payload)
}

/// Decode a possibly partial state update on top of `current`.
///
/// Fields the payload leaves out keep their value from `current`; the
/// control entry itself must be present.
pub fn decode_properties_over(
    current: &DeviceProperties,
    payload: &Value,
) -> Result<DeviceProperties, DomainError> {
    let object = as_object(payload, "device")?;

    match current {
        DeviceProperties::Light(light) => {
            let control = control_entry(object, fields::LIGHT).ok_or_else(|| {
                DomainError::Decode("light payload without 3311 entry".to_string())
            })?;

            let brightness = match int_field(control, fields::DIMMER) {
                None => light.brightness,
                Some(n) => u8::try_from(n)
                    .map_err(|_| DomainError::Decode(format!("dim level out of range: {}", n)))?,
            };
            let colour_hex = match control.get(fields::COLOUR_HEX) {
                None => light.colour_hex.clone(),
                Some(value) => value.as_str().map(str::to_string),
            };

            Ok(DeviceProperties::Light(LightProperties {
                on: on_off_field(control, light.on)?,
                brightness,
                colour_hex,
                colour_x: u16_field(control, fields::COLOUR_X, light.colour_x)?,
                colour_y: u16_field(control, fields::COLOUR_Y, light.colour_y)?,
                colour_temperature: u16_field(
                    control,
                    fields::COLOUR_TEMPERATURE,
                    light.colour_temperature,
                )?,
                transition_time: u16_field(
                    control,
                    fields::TRANSITION_TIME,
                    light.transition_time,
                )?,
            }))
        }
        DeviceProperties::Plug(plug) => {
            let control = control_entry(object, fields::PLUG).ok_or_else(|| {
                DomainError::Decode("plug payload without 3312 entry".to_string())
            })?;
            Ok(DeviceProperties::Plug(PlugProperties {
                on: on_off_field(control, plug.on)?,
            }))
        }
        other => Ok(other.clone()),
    }
}

pub fn decode_name(payload: &Value) -> Option<String> {
    payload
        .get(fields::NAME)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn decode_info(object: &Map<String, Value>) -> DeviceInfo {
    let Some(info) = object.get(fields::DEVICE_INFO).and_then(Value::as_object) else {
        return DeviceInfo::default();
    };
    let text = |field: &str| {
        info.get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    DeviceInfo {
        manufacturer: text(fields::MANUFACTURER),
        model_number: text(fields::MODEL_NUMBER),
        firmware_version: text(fields::FIRMWARE_VERSION),
        power_source: int_field(info, fields::POWER_SOURCE)
            .map(PowerSource::from_code)
            .unwrap_or_default(),
        battery_level: int_field(info, fields::BATTERY_LEVEL).and_then(|n| u8::try_from(n).ok()),
    }
}

/// Decode a full device description as returned by `GET 15001/<id>`
pub fn decode_device(payload: &Value) -> Result<Device, DomainError> {
    let object = as_object(payload, "device")?;

    let instance_id = int_field(object, fields::INSTANCE_ID)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| DomainError::Decode("device payload without instance id".to_string()))?;

    let created_at = int_field(object, fields::CREATION_DATE)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_default();

    let kind = classify(payload);
    let properties = decode_properties(kind, payload)?;

    Ok(Device::new(
        instance_id,
        decode_name(payload).unwrap_or_default(),
        created_at,
        decode_info(object),
        properties,
    ))
}

/// Decode the instance id list returned by `GET 15001`
pub fn decode_instance_ids(payload: &Value) -> Result<Vec<u32>, DomainError> {
    payload
        .as_array()
        .ok_or_else(|| DomainError::Decode("device list is not an array".to_string()))?
        .iter()
        .map(|id| {
            id.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| DomainError::Decode(format!("invalid instance id: {}", id)))
        })
        .collect()
}

/// Wrap a light control entry: `{"3311": [entry]}`
pub fn light_control(entry: Map<String, Value>) -> Value {
    json!({ (fields::LIGHT): [entry] })
}

/// Wrap a plug control entry: `{"3312": [{"5850": 0|1}]}`
pub fn plug_control(on: bool) -> Value {
    json!({ (fields::PLUG): [{ (fields::ON_OFF): u8::from(on) }] })
}

pub fn encode_light_properties(props: &LightProperties) -> Value {
    let mut entry = Map::new();
    entry.insert(fields::ON_OFF.to_string(), json!(u8::from(props.on)));
    entry.insert(fields::DIMMER.to_string(), json!(props.brightness));

    let optional = [
        (fields::COLOUR_X, props.colour_x),
        (fields::COLOUR_Y, props.colour_y),
        (fields::COLOUR_TEMPERATURE, props.colour_temperature),
        (fields::TRANSITION_TIME, props.transition_time),
    ];
    for (field, value) in optional {
        if let Some(value) = value {
            entry.insert(field.to_string(), json!(value));
        }
    }
    if let Some(hex) = &props.colour_hex {
        entry.insert(fields::COLOUR_HEX.to_string(), json!(hex));
    }

    light_control(entry)
}

pub fn encode_properties(props: &DeviceProperties) -> Value {
    match props {
        DeviceProperties::Light(light) => encode_light_properties(light),
        DeviceProperties::Plug(plug) => plug_control(plug.on),
        DeviceProperties::Remote => json!({ (fields::REMOTE): [{ (fields::INSTANCE_ID): 0 }] }),
        DeviceProperties::MotionSensor => {
            json!({ (fields::SENSOR): [{ (fields::INSTANCE_ID): 0 }] })
        }
        DeviceProperties::Unknown => json!({}),
    }
}

fn type_code(kind: DeviceKind) -> Option<i64> {
    match kind {
        DeviceKind::Light => Some(type_codes::LIGHT),
        DeviceKind::Plug => Some(type_codes::PLUG),
        DeviceKind::Remote => Some(type_codes::REMOTE),
        DeviceKind::MotionSensor => Some(type_codes::MOTION_SENSOR),
        DeviceKind::Unknown => None,
    }
}

/// Encode a full device description, the inverse of [`decode_device`]
pub fn encode_device(device: &Device) -> Value {
    let info = device.info();
    let mut payload = match encode_properties(&device.properties()) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    payload.insert(fields::NAME.to_string(), json!(device.name()));
    payload.insert(
        fields::CREATION_DATE.to_string(),
        json!(device.created_at().timestamp()),
    );
    payload.insert(fields::INSTANCE_ID.to_string(), json!(device.instance_id()));
    if let Some(code) = type_code(device.kind()) {
        payload.insert(fields::TYPE.to_string(), json!(code));
    }

    let mut info_map = Map::new();
    info_map.insert(fields::MANUFACTURER.to_string(), json!(info.manufacturer));
    info_map.insert(fields::MODEL_NUMBER.to_string(), json!(info.model_number));
    info_map.insert(fields::FIRMWARE_VERSION.to_string(), json!(info.firmware_version));
    info_map.insert(fields::POWER_SOURCE.to_string(), json!(info.power_source.code()));
    if let Some(level) = info.battery_level {
        info_map.insert(fields::BATTERY_LEVEL.to_string(), json!(level));
    }
    payload.insert(fields::DEVICE_INFO.to_string(), Value::Object(info_map));

    Value::Object(payload)
}
