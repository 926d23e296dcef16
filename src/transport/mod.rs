//! Messaging Transport Boundary
//!
//! The relay never talks to WhatsApp (or any other messaging network)
//! directly. Delivery goes through the narrow [`MessageTransport`] trait, and
//! the gateway holds a [`TransportHandle`] so it can run (and keep logging
//! outbound messages) before any transport is attached.

mod log;

pub use log::LogTransport;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{RelayError, Result};
use crate::router::DeliveryInstruction;

/// External messaging collaborator. Implementations perform the actual
/// (potentially slow, externally rate-limited) send; the router never calls
/// this; delivery always happens outside its lock.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver the message, reporting failures as
    /// [`RelayError::Transport`] / [`RelayError::NotConnected`].
    async fn deliver(&self, instruction: &DeliveryInstruction) -> Result<()>;

    /// Whether the underlying connection is currently usable.
    fn is_connected(&self) -> bool {
        true
    }

    /// Short human-readable label for logs.
    fn describe(&self) -> &str;
}

/// Shared transport slot. Set when a transport connects; cleared when it
/// drops. Reading the slot and performing the delivery never hold the lock
/// at the same time.
#[derive(Default)]
pub struct TransportHandle {
    inner: Mutex<Option<Arc<dyn MessageTransport>>>,
}

impl TransportHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the connected transport.
    pub async fn set_connected(&self, transport: Arc<dyn MessageTransport>) {
        tracing::info!("transport: {} attached", transport.describe());
        *self.inner.lock().await = Some(transport);
    }

    /// Clear the slot (transport dropped or logged out).
    pub async fn disconnect(&self) {
        *self.inner.lock().await = None;
    }

    pub async fn is_connected(&self) -> bool {
        match self.inner.lock().await.as_ref() {
            Some(transport) => transport.is_connected(),
            None => false,
        }
    }

    /// Deliver through the attached transport, or fail with
    /// [`RelayError::NotConnected`] when none is attached.
    pub async fn deliver(&self, instruction: &DeliveryInstruction) -> Result<()> {
        let transport = self.inner.lock().await.clone();
        match transport {
            Some(transport) if transport.is_connected() => transport.deliver(instruction).await,
            _ => Err(RelayError::NotConnected),
        }
    }
}
