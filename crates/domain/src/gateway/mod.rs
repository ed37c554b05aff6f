mod address;
mod listener;
mod status;

pub use address::{GatewayAddress, GatewayCredentials};
pub use listener::{ListenerId, StatusListener};
pub use status::{ConnectionStatus, StatusReason};
