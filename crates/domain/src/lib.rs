//! Domain layer - Pure device and gateway model with no I/O
//!
//! This crate contains:
//! - Device model (kinds, metadata, property snapshots)
//! - Change events and handlers
//! - Gateway addressing and connection status
//! - Transport and model-layer contracts (traits)
//!
//! Principles:
//! - No dependencies on infrastructure
//! - Snapshots are immutable; updates replace them

pub mod attribute;
pub mod configuration;
pub mod device;
pub mod error;
pub mod event;
pub mod gateway;
pub mod model;
pub mod transport;

// Re-export commonly used types
pub use attribute::{AttributeId, CommandIntent, ConfigurationId, DeviceAttribute};
pub use configuration::ProtocolConfiguration;
pub use device::{Device, DeviceKey, DeviceKind, DeviceProperties};
pub use error::DomainError;
pub use event::ChangeEvent;
pub use gateway::{ConnectionStatus, GatewayAddress, GatewayCredentials};
