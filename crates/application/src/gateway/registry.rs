use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use domain::gateway::{GatewayAddress, GatewayCredentials, ListenerId, StatusListener};
use domain::transport::Transport;

use super::GatewayConnection;

struct Lease {
    connection: Arc<GatewayConnection>,
    listeners: HashSet<ListenerId>,
}

enum Slot {
    Open(Lease),
    /// Last lease released; cancelled once `disconnect()` has finished
    Closing(CancellationToken),
}

/// Shares one [`GatewayConnection`] per gateway host.
///
/// Each `acquire` takes a lease identified by its listener; the connection
/// is disconnected when the last lease is released. A host whose connection
/// is still closing gets a new one only after the old one is gone.
pub struct GatewayConnectionRegistry {
    transport: Arc<dyn Transport>,
    slots: Mutex<HashMap<GatewayAddress, Slot>>,
}

impl GatewayConnectionRegistry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the connection for the host and attach `listener`.
    ///
    /// Does not connect; the caller drives `connect()` afterwards. The
    /// security code is only used when the connection is created.
    pub async fn acquire(
        &self,
        credentials: &GatewayCredentials,
        listener: Arc<dyn StatusListener>,
    ) -> (Arc<GatewayConnection>, ListenerId) {
        let id = ListenerId::new();
        let connection = loop {
            let closed = {
                let mut slots = self.slots.lock().await;
                let slot = slots.entry(credentials.address.clone()).or_insert_with(|| {
                    info!(host = %credentials.address, "Creating gateway connection");
                    Slot::Open(Lease {
                        connection: GatewayConnection::new(
                            credentials.clone(),
                            self.transport.clone(),
                        ),
                        listeners: HashSet::new(),
                    })
                });

                match slot {
                    Slot::Closing(closed) => closed.clone(),
                    Slot::Open(lease) => {
                        if lease.connection.credentials().security_code
                            != credentials.security_code
                        {
                            warn!(
                                host = %credentials.address,
                                "Security code differs, keeping the shared connection"
                            );
                        }
                        lease.listeners.insert(id);
                        break lease.connection.clone();
                    }
                }
            };

            debug!(host = %credentials.address, "Waiting for the previous connection to close");
            closed.cancelled().await;
        };

        connection.add_status_listener_as(id, listener);
        (connection, id)
    }

    /// Release a lease. Returns true when it was the last one and the
    /// connection has been torn down.
    pub async fn release(&self, address: &GatewayAddress, id: ListenerId) -> bool {
        let (connection, closing) = {
            let mut slots = self.slots.lock().await;
            let Some(Slot::Open(lease)) = slots.get_mut(address) else {
                return false;
            };
            if !lease.listeners.remove(&id) {
                return false;
            }

            let connection = lease.connection.clone();
            let closing = if lease.listeners.is_empty() {
                connection.mark_released();
                let closed = CancellationToken::new();
                slots.insert(address.clone(), Slot::Closing(closed.clone()));
                Some(closed)
            } else {
                None
            };
            (connection, closing)
        };

        connection.remove_status_listener(id);
        let Some(closed) = closing else {
            return false;
        };

        connection.disconnect().await;
        self.slots.lock().await.remove(address);
        closed.cancel();
        info!(host = %address, "Released gateway connection");
        true
    }

    pub async fn lookup(&self, address: &GatewayAddress) -> Option<Arc<GatewayConnection>> {
        match self.slots.lock().await.get(address) {
            Some(Slot::Open(lease)) => Some(lease.connection.clone()),
            _ => None,
        }
    }

    /// Number of hosts with an open connection
    pub async fn len(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| matches!(slot, Slot::Open(_)))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
