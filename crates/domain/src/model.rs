use std::sync::Arc;

use crate::attribute::ConfigurationId;
use crate::device::Device;
use crate::event::ChangeEvent;
use crate::gateway::ConnectionStatus;

/// Outward callback surface towards the asset/attribute model layer.
///
/// Calls happen on the task that performed the work; implementations
/// must not block.
pub trait AssetModel: Send + Sync {
    /// A device was discovered on the gateway of `configuration`.
    /// Called for every kind, including ones that accept no commands.
    fn on_device_discovered(&self, configuration: &ConfigurationId, device: &Arc<Device>);

    fn on_status_change(&self, configuration: &ConfigurationId, status: &ConnectionStatus);

    /// A device of `configuration` changed state
    fn on_device_event(&self, configuration: &ConfigurationId, event: &ChangeEvent) {
        let _ = (configuration, event);
    }
}
