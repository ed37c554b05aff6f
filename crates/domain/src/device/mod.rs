mod entity;
mod info;
mod kind;
mod properties;

pub use entity::Device;
pub use info::{DeviceInfo, PowerSource};
pub use kind::{DeviceKey, DeviceKind};
pub use properties::{DeviceProperties, LightProperties, PlugProperties};
