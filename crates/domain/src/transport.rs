//! Contract of the secured datagram transport.
//!
//! Handshake, retransmission and encryption live behind these traits. The
//! core only issues requests and consumes observe streams.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::DomainError;

/// Resource paths exposed by the gateway
pub mod endpoints {
    /// Device collection
    pub const DEVICES: &str = "15001";

    pub fn device(instance_id: u32) -> String {
        format!("{}/{}", DEVICES, instance_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

/// A single pushed payload, or the failure that interrupted the stream
pub type Notification = Result<Value, DomainError>;

/// Stream of push notifications for one observed resource.
///
/// The stream ends when the transport drops the subscription or the
/// session is closed.
pub struct Subscription {
    rx: mpsc::Receiver<Notification>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<Notification>) -> Self {
        Self { rx }
    }

    /// Next notification, `None` once the stream has ended
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }
}

/// Establishes authenticated sessions with gateways
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the secured handshake with a pre-shared credential.
    /// Fails with [`DomainError::Connection`].
    async fn secure_session(
        &self,
        host: &str,
        credential: &str,
    ) -> Result<Arc<dyn Session>, DomainError>;
}

/// An authenticated session with one gateway
#[async_trait]
pub trait Session: Send + Sync {
    /// Request/response exchange. Fails with [`DomainError::Transport`].
    async fn request(
        &self,
        path: &str,
        method: Method,
        payload: Option<Value>,
    ) -> Result<Value, DomainError>;

    /// Observe a resource. Fails with [`DomainError::Transport`] if the
    /// gateway rejects the subscription.
    async fn subscribe(&self, path: &str) -> Result<Subscription, DomainError>;

    /// Release the session. Open subscriptions end.
    async fn close(&self);
}
