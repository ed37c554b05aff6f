use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use domain::attribute::{AttributeId, CommandIntent, ConfigurationId};
use domain::error::DomainError;

use crate::binding::AttributeBindingTable;

/// Tells the dispatcher whether a configuration currently accepts writes
pub trait ConfigurationState: Send + Sync {
    fn is_enabled(&self, configuration: &ConfigurationId) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The gateway accepted the command
    Sent,
    /// The owning configuration is disabled
    Ignored,
    /// The write failed and was logged
    Dropped(DomainError),
}

impl DispatchOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Routes attribute writes to the bound device's connection.
/// Failures never leave this boundary; they are logged and reported in the outcome.
pub struct CommandDispatcher {
    bindings: Arc<AttributeBindingTable>,
    configurations: Arc<dyn ConfigurationState>,
}

impl CommandDispatcher {
    pub fn new(
        bindings: Arc<AttributeBindingTable>,
        configurations: Arc<dyn ConfigurationState>,
    ) -> Self {
        Self {
            bindings,
            configurations,
        }
    }

    pub async fn dispatch(&self, attribute: &AttributeId, value: Value) -> DispatchOutcome {
        let Some(binding) = self.bindings.resolve(attribute) else {
            warn!(attribute = %attribute, "Write to unbound attribute dropped");
            return DispatchOutcome::Dropped(DomainError::UnboundAttribute(attribute.to_string()));
        };

        if !self.configurations.is_enabled(&binding.configuration) {
            debug!(
                attribute = %attribute,
                configuration = %binding.configuration,
                "Configuration disabled, write ignored"
            );
            return DispatchOutcome::Ignored;
        }

        let intent = CommandIntent::new(attribute.name.clone(), value);
        match binding
            .connection
            .control_device(&binding.device, &intent)
            .await
        {
            Ok(()) => {
                debug!(attribute = %attribute, device = %binding.device.key(), "Write sent");
                DispatchOutcome::Sent
            }
            Err(e) => {
                warn!(
                    attribute = %attribute,
                    device = %binding.device.key(),
                    kind = e.kind(),
                    error = %e,
                    "Write dropped"
                );
                DispatchOutcome::Dropped(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct AllEnabled;

    impl ConfigurationState for AllEnabled {
        fn is_enabled(&self, _: &ConfigurationId) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_unbound_attribute_is_dropped() {
        let dispatcher =
            CommandDispatcher::new(Arc::new(AttributeBindingTable::new()), Arc::new(AllEnabled));

        let outcome = dispatcher
            .dispatch(&AttributeId::new("asset", "lightStatus"), json!(true))
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Dropped(DomainError::UnboundAttribute("asset:lightStatus".to_string()))
        );
    }
}
