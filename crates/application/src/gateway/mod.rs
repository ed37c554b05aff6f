pub mod command;
mod connection;
mod registry;

pub use connection::GatewayConnection;
pub use registry::GatewayConnectionRegistry;
