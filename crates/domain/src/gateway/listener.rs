use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ConnectionStatus;

/// Handle returned when a status listener is registered on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receives every status transition of a gateway connection.
///
/// Called synchronously from the task performing the transition, never
/// while the connection holds its own lock. Implementations must not block.
#[cfg_attr(test, mockall::automock)]
pub trait StatusListener: Send + Sync {
    fn on_status(&self, status: &ConnectionStatus);
}

impl<F> StatusListener for F
where
    F: Fn(&ConnectionStatus) + Send + Sync,
{
    fn on_status(&self, status: &ConnectionStatus) {
        self(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = move |status: &ConnectionStatus| sink.lock().unwrap().push(status.clone());

        listener.on_status(&ConnectionStatus::Connecting);
        listener.on_status(&ConnectionStatus::Connected);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
        );
    }

    #[test]
    fn test_mock_listener_receives_status() {
        let mut mock = MockStatusListener::new();
        mock.expect_on_status()
            .withf(|status| status.is_connected())
            .times(1)
            .return_const(());

        let listener: Arc<dyn StatusListener> = Arc::new(mock);
        listener.on_status(&ConnectionStatus::Connected);
    }

    #[test]
    fn test_listener_ids_are_unique() {
        assert_ne!(ListenerId::new(), ListenerId::new());
    }
}
