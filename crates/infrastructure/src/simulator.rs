use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use domain::DomainError;
use domain::device::{
    Device, DeviceInfo, DeviceKind, DeviceProperties, LightProperties, PlugProperties, PowerSource,
};
use domain::transport::{Method, Notification, Session, Subscription, Transport, endpoints};

use crate::codec::{self, fields};

const OBSERVE_BUFFER: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated device as declared in configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimulatedDeviceConfig {
    pub instance_id: u32,
    pub name: String,
    pub kind: DeviceKind,
    #[serde(default)]
    pub on: bool,
    #[serde(default)]
    pub brightness: u8,
    #[serde(default)]
    pub colour_hex: Option<String>,
}

impl SimulatedDeviceConfig {
    pub fn to_payload(&self) -> Value {
        let properties = match self.kind {
            DeviceKind::Light => DeviceProperties::Light(LightProperties {
                on: self.on,
                brightness: self.brightness,
                colour_hex: self.colour_hex.clone(),
                ..Default::default()
            }),
            DeviceKind::Plug => DeviceProperties::Plug(PlugProperties { on: self.on }),
            kind => DeviceProperties::empty(kind),
        };
        device_payload(self.instance_id, &self.name, properties)
    }
}

/// Full gateway description of a device, as served by `GET 15001/<id>`
pub fn device_payload(instance_id: u32, name: &str, properties: DeviceProperties) -> Value {
    let power_source = match properties.kind() {
        DeviceKind::Remote | DeviceKind::MotionSensor => PowerSource::InternalBattery,
        _ => PowerSource::AcPower,
    };
    let device = Device::new(
        instance_id,
        name,
        Utc::now(),
        DeviceInfo {
            manufacturer: "IKEA of Sweden".to_string(),
            model_number: format!("TRADFRI {}", properties.kind().as_str()),
            firmware_version: "2.3.086".to_string(),
            power_source,
            battery_level: None,
        },
        properties,
    );
    codec::encode_device(&device)
}

/// A request as seen by the simulated gateway
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub host: String,
    pub path: String,
    pub method: Method,
    pub payload: Option<Value>,
}

struct Observer {
    session_id: u64,
    instance_id: u32,
    tx: mpsc::Sender<Notification>,
}

struct GatewayState {
    security_code: String,
    devices: Mutex<BTreeMap<u32, Value>>,
    observers: Mutex<Vec<Observer>>,
    requests: Mutex<Vec<RecordedRequest>>,
    refuse_sessions: AtomicBool,
    fail_requests: AtomicBool,
    reject_subscriptions: AtomicBool,
    sessions_opened: AtomicUsize,
    next_session: AtomicU64,
}

impl GatewayState {
    fn senders_for(&self, instance_id: u32) -> Vec<mpsc::Sender<Notification>> {
        lock(&self.observers)
            .iter()
            .filter(|observer| observer.instance_id == instance_id)
            .map(|observer| observer.tx.clone())
            .collect()
    }

    async fn notify(&self, instance_id: u32, notification: Notification) -> usize {
        let mut delivered = 0;
        for tx in self.senders_for(instance_id) {
            if tx.send(notification.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Apply a patch and return the resulting full device state
    fn apply(&self, instance_id: u32, patch: &Value) -> Option<Value> {
        let mut devices = lock(&self.devices);
        let device = devices.get_mut(&instance_id)?;
        merge(device, patch);
        Some(device.clone())
    }
}

/// Merge a gateway patch into a device description.
/// Control lists (`"3311": [{..}]`) are merged entry-wise, everything else replaced.
fn merge(target: &mut Value, patch: &Value) {
    let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) else {
        return;
    };

    for (key, value) in patch {
        let merged_entry = match (target.get_mut(key), value.as_array()) {
            (Some(Value::Array(existing)), Some(incoming)) => {
                match (existing.first_mut(), incoming.first()) {
                    (Some(Value::Object(existing)), Some(Value::Object(incoming))) => {
                        for (field, v) in incoming {
                            existing.insert(field.clone(), v.clone());
                        }
                        true
                    }
                    _ => false,
                }
            }
            _ => false,
        };
        if !merged_entry {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn parse_device_path(path: &str) -> Option<u32> {
    path.strip_prefix(endpoints::DEVICES)?
        .strip_prefix('/')?
        .parse()
        .ok()
}

/// In-memory gateway implementing the transport contract.
///
/// Serves a fixed device set, validates the security code, applies `PUT`
/// requests to its state and pushes the resulting state to observers.
/// Failure switches let callers exercise the error paths.
#[derive(Clone)]
pub struct SimulatedGateway {
    state: Arc<GatewayState>,
}

impl SimulatedGateway {
    pub fn new(security_code: impl Into<String>) -> Self {
        Self {
            state: Arc::new(GatewayState {
                security_code: security_code.into(),
                devices: Mutex::new(BTreeMap::new()),
                observers: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                refuse_sessions: AtomicBool::new(false),
                fail_requests: AtomicBool::new(false),
                reject_subscriptions: AtomicBool::new(false),
                sessions_opened: AtomicUsize::new(0),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    pub fn from_devices(
        security_code: impl Into<String>,
        devices: &[SimulatedDeviceConfig],
    ) -> Self {
        let gateway = Self::new(security_code);
        for device in devices {
            gateway.add_device(device.to_payload());
        }
        gateway
    }

    pub fn with_device(self, payload: Value) -> Self {
        self.add_device(payload);
        self
    }

    /// Register a device description. Payloads without an instance id are ignored.
    pub fn add_device(&self, payload: Value) {
        let Some(instance_id) = payload
            .get(fields::INSTANCE_ID)
            .and_then(Value::as_u64)
            .and_then(|id| u32::try_from(id).ok())
        else {
            tracing::warn!("Simulated device without instance id ignored");
            return;
        };
        lock(&self.state.devices).insert(instance_id, payload);
    }

    pub fn device_state(&self, instance_id: u32) -> Option<Value> {
        lock(&self.state.devices).get(&instance_id).cloned()
    }

    pub fn refuse_sessions(&self, refuse: bool) {
        self.state.refuse_sessions.store(refuse, Ordering::SeqCst);
    }

    pub fn fail_requests(&self, fail: bool) {
        self.state.fail_requests.store(fail, Ordering::SeqCst);
    }

    pub fn reject_subscriptions(&self, reject: bool) {
        self.state.reject_subscriptions.store(reject, Ordering::SeqCst);
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }

    pub fn requests_with(&self, method: Method) -> Vec<RecordedRequest> {
        lock(&self.state.requests)
            .iter()
            .filter(|request| request.method == method)
            .cloned()
            .collect()
    }

    /// Number of live subscriptions on a device
    pub fn observer_count(&self, instance_id: u32) -> usize {
        lock(&self.state.observers)
            .iter()
            .filter(|observer| observer.instance_id == instance_id && !observer.tx.is_closed())
            .count()
    }

    /// Push a raw payload to every observer of a device.
    /// Returns how many subscriptions received it.
    pub async fn push(&self, instance_id: u32, payload: Value) -> usize {
        self.state.notify(instance_id, Ok(payload)).await
    }

    pub async fn push_error(&self, instance_id: u32, error: DomainError) -> usize {
        self.state.notify(instance_id, Err(error)).await
    }

    /// Change a device's state as if it happened physically, notifying observers
    pub async fn update_device(&self, instance_id: u32, patch: Value) -> usize {
        match self.state.apply(instance_id, &patch) {
            Some(full) => self.state.notify(instance_id, Ok(full)).await,
            None => 0,
        }
    }

    /// End every subscription on a device
    pub fn drop_subscriptions(&self, instance_id: u32) {
        lock(&self.state.observers).retain(|observer| observer.instance_id != instance_id);
    }
}

#[async_trait]
impl Transport for SimulatedGateway {
    async fn secure_session(
        &self,
        host: &str,
        credential: &str,
    ) -> Result<Arc<dyn Session>, DomainError> {
        if self.state.refuse_sessions.load(Ordering::SeqCst) {
            return Err(DomainError::Connection(format!(
                "DTLS handshake with {} timed out",
                host
            )));
        }
        if credential != self.state.security_code {
            return Err(DomainError::Connection(format!(
                "Gateway {} rejected the security code",
                host
            )));
        }

        let id = self.state.next_session.fetch_add(1, Ordering::SeqCst);
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        tracing::info!(host = %host, session = id, "Simulated gateway session opened");

        Ok(Arc::new(SimulatedSession {
            id,
            host: host.to_string(),
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct SimulatedSession {
    id: u64,
    host: String,
    state: Arc<GatewayState>,
    closed: AtomicBool,
}

impl SimulatedSession {
    fn ensure_usable(&self) -> Result<(), DomainError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DomainError::Transport("Session closed".to_string()));
        }
        if self.state.fail_requests.load(Ordering::SeqCst) {
            return Err(DomainError::Transport(
                "Simulated request failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for SimulatedSession {
    async fn request(
        &self,
        path: &str,
        method: Method,
        payload: Option<Value>,
    ) -> Result<Value, DomainError> {
        lock(&self.state.requests).push(RecordedRequest {
            host: self.host.clone(),
            path: path.to_string(),
            method,
            payload: payload.clone(),
        });
        self.ensure_usable()?;
        tracing::debug!(
            host = %self.host,
            method = method.as_str(),
            path,
            "Simulated gateway request"
        );

        let not_found = || DomainError::Transport(format!("4.04 Not Found: {}", path));

        match (method, path) {
            (Method::Get, endpoints::DEVICES) => {
                let ids: Vec<u32> = lock(&self.state.devices).keys().copied().collect();
                Ok(json!(ids))
            }
            (Method::Get, _) => {
                let instance_id = parse_device_path(path).ok_or_else(not_found)?;
                lock(&self.state.devices)
                    .get(&instance_id)
                    .cloned()
                    .ok_or_else(not_found)
            }
            (Method::Put, _) => {
                let instance_id = parse_device_path(path).ok_or_else(not_found)?;
                let patch = payload.ok_or_else(|| {
                    DomainError::Transport("4.00 Bad Request: empty payload".to_string())
                })?;
                let full = self.state.apply(instance_id, &patch).ok_or_else(not_found)?;
                self.state.notify(instance_id, Ok(full)).await;
                Ok(json!({}))
            }
        }
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, DomainError> {
        self.ensure_usable()?;
        if self.state.reject_subscriptions.load(Ordering::SeqCst) {
            return Err(DomainError::Transport(format!(
                "Observe rejected for {}",
                path
            )));
        }

        let instance_id = parse_device_path(path)
            .filter(|id| lock(&self.state.devices).contains_key(id))
            .ok_or_else(|| DomainError::Transport(format!("4.04 Not Found: {}", path)))?;

        let (tx, rx) = mpsc::channel(OBSERVE_BUFFER);
        lock(&self.state.observers).push(Observer {
            session_id: self.id,
            instance_id,
            tx,
        });
        Ok(Subscription::new(rx))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.state.observers).retain(|observer| observer.session_id != self.id);
        tracing::info!(host = %self.host, session = self.id, "Simulated gateway session closed");
    }
}
