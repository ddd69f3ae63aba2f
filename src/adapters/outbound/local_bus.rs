//! Local Bus
//!
//! In-process control channel backed by a tokio broadcast channel. Anything
//! that can hand messages to [`LocalBus::send`] (a NATS bridge, a test, the
//! binary itself) can drive the router through it.

use crate::domain::ports::{ChannelError, ControlChannel};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

/// A message travelling over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Bytes,
}

/// Broadcast-backed [`ControlChannel`].
pub struct LocalBus {
    tx: broadcast::Sender<BusMessage>,
    reconnecting: AtomicBool,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus buffering up to `capacity` messages per slow subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            reconnecting: AtomicBool::new(false),
        }
    }

    /// Receive every message published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }

    /// Flag the connection as (not) reconnecting.
    pub fn set_reconnecting(&self, reconnecting: bool) {
        let was = self.reconnecting.swap(reconnecting, Ordering::SeqCst);
        if was != reconnecting {
            tracing::info!("control channel reconnecting={}", reconnecting);
        }
    }

    /// Publish without awaiting; returns how many subscribers got the message.
    pub fn send(&self, subject: &str, payload: impl Into<Bytes>) -> usize {
        let message = BusMessage {
            subject: subject.to_string(),
            payload: payload.into(),
        };
        // No subscribers is not an error; the message just goes nowhere
        self.tx.send(message).unwrap_or(0)
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlChannel for LocalBus {
    fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::SeqCst)
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), ChannelError> {
        let delivered = self.send(subject, payload);
        tracing::trace!("published on {} to {} subscribers", subject, delivered);
        Ok(())
    }
}
