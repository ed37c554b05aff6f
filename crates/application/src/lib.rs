//! Application layer - Gateway connections, device observation and command routing

pub mod binding;
pub mod dispatch;
pub mod gateway;
pub mod observer;
pub mod protocol;

pub use binding::{AttributeBinding, AttributeBindingTable};
pub use dispatch::{CommandDispatcher, ConfigurationState, DispatchOutcome};
pub use gateway::{GatewayConnection, GatewayConnectionRegistry};
pub use observer::DeviceObserver;
pub use protocol::{ConfigurationStore, GatewayProtocol};
