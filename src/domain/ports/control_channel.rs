//! Control Channel Port
//!
//! Defines the interface to the publish/subscribe transport that carries
//! registration traffic in and metrics out.

use async_trait::async_trait;
use bytes::Bytes;

/// Subject registration messages arrive on.
pub const REGISTER_SUBJECT: &str = "router.register";
/// Subject unregistration messages arrive on.
pub const UNREGISTER_SUBJECT: &str = "router.unregister";
/// Subject compressed active-app batches are published to.
pub const ACTIVE_APPS_SUBJECT: &str = "router.active_apps";

/// Errors surfaced by a control channel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("control channel closed")]
    Closed,
}

/// Outbound side of the control-channel transport.
///
/// Implementations wrap whatever message bus the platform runs (NATS and the
/// like); the router only needs to publish and to know whether the connection
/// is currently being re-established.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Whether the transport is reconnecting and heartbeats may be missing.
    fn is_reconnecting(&self) -> bool;

    /// Publish a payload on a subject.
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), ChannelError>;
}
