//! Infrastructure layer - Wire format, transports and configuration

pub mod codec;
pub mod config;
pub mod simulator;
pub mod transport;

pub use simulator::{RecordedRequest, SimulatedDeviceConfig, SimulatedGateway};
pub use transport::{TransportFactory, TransportKind};
