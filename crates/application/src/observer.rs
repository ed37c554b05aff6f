use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use domain::device::{Device, DeviceKey};
use domain::error::DomainError;
use domain::event::ChangeEvent;
use domain::transport::{Session, Subscription};
use infrastructure::codec;

/// Receives stream failures (transport errors and terminated subscriptions)
pub type FailureSink = Arc<dyn Fn(&DeviceKey, DomainError) + Send + Sync>;

/// Keeps one observe subscription per device and turns its notifications
/// into [`ChangeEvent`]s for the device's handlers.
pub struct DeviceObserver {
    subscriptions: Mutex<HashMap<DeviceKey, (JoinHandle<()>, CancellationToken)>>,
    on_failure: FailureSink,
}

impl DeviceObserver {
    pub fn new(on_failure: FailureSink) -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            on_failure,
        }
    }

    /// Subscribes to the device's resource and starts delivering events.
    ///
    /// Returns false when the device is already observed or the gateway
    /// rejected the subscription.
    pub async fn start(&self, device: Arc<Device>, session: &Arc<dyn Session>) -> bool {
        let key = device.key();
        let mut subscriptions = self.subscriptions.lock().await;

        if subscriptions.contains_key(&key) {
            warn!(device = %key, "Device is already observed");
            return false;
        }

        let subscription = match session.subscribe(&device.endpoint()).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(device = %key, error = %e, "Gateway rejected the observe request");
                return false;
            }
        };

        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();
        let on_failure = self.on_failure.clone();
        let handle = tokio::spawn(async move {
            debug!(device = %key, "Observing device");
            observe(device, subscription, task_token, on_failure).await;
            debug!(device = %key, "Stopped observing device");
        });

        subscriptions.insert(key, (handle, cancel_token));
        true
    }

    /// Cancels the device's subscription and waits for its task to finish.
    /// No handler of that device runs after this returns.
    pub async fn stop(&self, key: &DeviceKey) -> bool {
        let entry = self.subscriptions.lock().await.remove(key);
        match entry {
            Some((handle, token)) => {
                token.cancel();
                let _ = handle.await;
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        let drained: Vec<_> = self.subscriptions.lock().await.drain().collect();
        for (_, (_, token)) in &drained {
            token.cancel();
        }
        for (key, (handle, _)) in drained {
            if let Err(e) = handle.await {
                warn!(device = %key, error = %e, "Observer task ended abnormally");
            }
        }
    }

    pub async fn active_count(&self) -> usize {
        self.subscriptions.lock().await.len()
    }
}

async fn observe(
    device: Arc<Device>,
    mut subscription: Subscription,
    cancel_token: CancellationToken,
    on_failure: FailureSink,
) {
    let key = device.key();
    loop {
        let notification = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            notification = subscription.recv() => notification,
        };

        match notification {
            Some(Ok(payload)) => apply_notification(&device, &payload),
            Some(Err(e)) => {
                warn!(device = %key, error = %e, "Observe stream reported an error");
                on_failure(&key, e);
            }
            None => {
                info!(device = %key, "Observe stream ended");
                on_failure(
                    &key,
                    DomainError::Transport(format!("Observe stream for {} ended", key)),
                );
                break;
            }
        }
    }
}

/// Decode a notification, swap the device's snapshot and deliver the diff
fn apply_notification(device: &Arc<Device>, payload: &serde_json::Value) {
    // Notifications may carry only the fields that changed
    let properties = match codec::decode_properties_over(&device.properties(), payload) {
        Ok(properties) => properties,
        Err(e) => {
            warn!(device = %device.key(), error = %e, "Skipping undecodable notification");
            return;
        }
    };

    if let Some(name) = codec::decode_name(payload) {
        if name != device.name() {
            debug!(device = %device.key(), name = %name, "Device renamed");
            device.set_name(name);
        }
    }

    let old = device.replace_properties(properties);
    let new = device.properties();
    let events = ChangeEvent::between(device, &old, &new);
    if events.is_empty() {
        return;
    }

    let handlers = device.event_handlers();
    for event in &events {
        debug!(device = %device.key(), event = event.event_type(), "Device changed");
        for handler in &handlers {
            handler.on_event(event);
        }
    }
}
