use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error, info, warn};

use domain::attribute::CommandIntent;
use domain::device::{Device, DeviceKey};
use domain::error::DomainError;
use domain::gateway::{ConnectionStatus, GatewayCredentials, ListenerId, StatusListener};
use domain::transport::{Method, Session, Transport, endpoints};
use infrastructure::codec;

use super::command;
use crate::observer::DeviceObserver;

struct ConnectionState {
    status: ConnectionStatus,
    listeners: Vec<(ListenerId, Arc<dyn StatusListener>)>,
    devices: BTreeMap<u32, Arc<Device>>,
    /// Set once the registry gave up its last lease; never cleared
    released: bool,
}

/// One authenticated session with a gateway, shared by every configuration
/// that targets the same host.
///
/// `connect`/`disconnect` are serialised by the session slot. Status
/// listeners are invoked outside the state lock, in transition order.
pub struct GatewayConnection {
    credentials: GatewayCredentials,
    transport: Arc<dyn Transport>,
    session: tokio::sync::Mutex<Option<Arc<dyn Session>>>,
    state: Mutex<ConnectionState>,
    delivery: Mutex<()>,
    observer: DeviceObserver,
}

impl GatewayConnection {
    pub fn new(credentials: GatewayCredentials, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let observer = DeviceObserver::new(Arc::new(move |key: &DeviceKey, e: DomainError| {
                if let Some(connection) = weak.upgrade() {
                    connection.report_stream_failure(key, e);
                }
            }));

            Self {
                credentials,
                transport,
                session: tokio::sync::Mutex::new(None),
                state: Mutex::new(ConnectionState {
                    status: ConnectionStatus::Disconnected,
                    listeners: Vec::new(),
                    devices: BTreeMap::new(),
                    released: false,
                }),
                delivery: Mutex::new(()),
                observer,
            }
        })
    }

    fn state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn credentials(&self) -> &GatewayCredentials {
        &self.credentials
    }

    pub fn host(&self) -> &str {
        self.credentials.address.as_str()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state().status.clone()
    }

    /// Devices discovered by the last successful connect, ordered by instance id
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.state().devices.values().cloned().collect()
    }

    pub fn device(&self, key: &DeviceKey) -> Option<Arc<Device>> {
        self.state()
            .devices
            .get(&key.instance_id)
            .filter(|device| device.key() == *key)
            .cloned()
    }

    /// Opens the session, discovers devices and starts observing them.
    ///
    /// A connected instance returns its current devices without touching
    /// the gateway. A released instance refuses to connect.
    pub async fn connect(&self) -> Result<Vec<Arc<Device>>, DomainError> {
        let mut slot = self.session.lock().await;
        if self.is_released() {
            warn!(host = %self.host(), "Refusing to connect a released gateway connection");
            return Err(DomainError::Connection(format!(
                "Gateway connection {} has been released",
                self.host()
            )));
        }
        if slot.is_some() {
            return Ok(self.devices());
        }

        self.set_status(ConnectionStatus::Connecting);
        info!(host = %self.host(), "Connecting to gateway");

        let (session, devices) = match self.establish().await {
            Ok(established) => established,
            Err(e) => {
                let message = match e {
                    DomainError::Connection(message) => message,
                    other => other.to_string(),
                };
                error!(host = %self.host(), error = %message, "Failed to connect to gateway");
                self.set_status(ConnectionStatus::connection_error(message.clone()));
                return Err(DomainError::Connection(message));
            }
        };

        self.state().devices = devices
            .iter()
            .map(|device| (device.instance_id(), device.clone()))
            .collect();

        for device in &devices {
            if !self.observer.start(device.clone(), &session).await {
                warn!(
                    host = %self.host(),
                    device = %device.key(),
                    "Device will not report state changes"
                );
            }
        }

        *slot = Some(session);
        info!(host = %self.host(), devices = devices.len(), "✅ Connected to gateway");
        self.set_status(ConnectionStatus::Connected);
        Ok(devices)
    }

    async fn establish(&self) -> Result<(Arc<dyn Session>, Vec<Arc<Device>>), DomainError> {
        let session = self
            .transport
            .secure_session(self.host(), &self.credentials.security_code)
            .await?;

        match self.discover(&session).await {
            Ok(devices) => Ok((session, devices)),
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }

    async fn discover(&self, session: &Arc<dyn Session>) -> Result<Vec<Arc<Device>>, DomainError> {
        let listing = session.request(endpoints::DEVICES, Method::Get, None).await?;
        let instance_ids = codec::decode_instance_ids(&listing)?;

        let mut devices = Vec::with_capacity(instance_ids.len());
        for instance_id in instance_ids {
            let payload = session
                .request(&endpoints::device(instance_id), Method::Get, None)
                .await?;
            match codec::decode_device(&payload) {
                Ok(device) => {
                    debug!(host = %self.host(), device = %device, "Discovered device");
                    devices.push(Arc::new(device));
                }
                Err(e) => {
                    warn!(
                        host = %self.host(),
                        instance_id,
                        error = %e,
                        "Skipping undecodable device"
                    );
                }
            }
        }
        Ok(devices)
    }

    pub fn is_released(&self) -> bool {
        self.state().released
    }

    /// Called by the registry when the last lease goes away
    pub(crate) fn mark_released(&self) {
        self.state().released = true;
    }

    /// Stops every observer, closes the session and forgets the devices.
    /// Calling it on a disconnected instance changes nothing.
    pub async fn disconnect(&self) {
        let mut slot = self.session.lock().await;
        self.observer.stop_all().await;

        if let Some(session) = slot.take() {
            session.close().await;
            info!(host = %self.host(), "Disconnected from gateway");
        }

        self.state().devices.clear();
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Translate `intent` and send it to the device
    pub async fn control_device(
        &self,
        device: &Device,
        intent: &CommandIntent,
    ) -> Result<(), DomainError> {
        let owned = self
            .device(&device.key())
            .is_some_and(|known| std::ptr::eq(known.as_ref(), device));
        if !owned {
            return Err(DomainError::UnsupportedCommand {
                device: device.key().to_string(),
                attribute: intent.attribute.clone(),
            });
        }

        let payload = command::translate(device, intent)?;
        let session = self
            .session
            .lock()
            .await
            .clone()
            .ok_or_else(|| {
                DomainError::Connection(format!("Gateway {} is not connected", self.host()))
            })?;

        debug!(host = %self.host(), device = %device.key(), payload = %payload, "Sending command");
        session
            .request(&device.endpoint(), Method::Put, Some(payload))
            .await
            .map(|_| ())
    }

    /// Registers a listener and immediately reports the current status to it
    pub fn add_status_listener(&self, listener: Arc<dyn StatusListener>) -> ListenerId {
        let id = ListenerId::new();
        self.add_status_listener_as(id, listener);
        id
    }

    pub(crate) fn add_status_listener_as(&self, id: ListenerId, listener: Arc<dyn StatusListener>) {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let current = {
            let mut state = self.state();
            state.listeners.push((id, listener.clone()));
            state.status.clone()
        };
        listener.on_status(&current);
    }

    pub fn remove_status_listener(&self, id: ListenerId) -> bool {
        let mut state = self.state();
        let before = state.listeners.len();
        state.listeners.retain(|(listener_id, _)| *listener_id != id);
        state.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    fn set_status(&self, status: ConnectionStatus) {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let listeners = {
            let mut state = self.state();
            if state.status == status {
                return;
            }
            state.status = status.clone();
            state
                .listeners
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect::<Vec<_>>()
        };

        debug!(host = %self.host(), status = %status, "Gateway status changed");
        for listener in listeners {
            listener.on_status(&status);
        }
    }

    fn report_stream_failure(&self, key: &DeviceKey, e: DomainError) {
        if !self.status().is_connected() {
            return;
        }
        warn!(host = %self.host(), device = %key, error = %e, "Observe stream failed");
        let message = match e {
            DomainError::Transport(message) => message,
            other => other.to_string(),
        };
        self.set_status(ConnectionStatus::transport_error(message));
    }
}
