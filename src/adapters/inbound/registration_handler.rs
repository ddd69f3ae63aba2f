//! Registration Handler
//!
//! Decodes `router.register` / `router.unregister` messages from the control
//! channel and fans them out to the registry, one call per uri. Malformed
//! messages are logged and dropped; they never reach the registry.

use crate::adapters::outbound::BusMessage;
use crate::application::Registry;
use crate::domain::entities::Registration;
use crate::domain::ports::{REGISTER_SUBJECT, UNREGISTER_SUBJECT};
use crate::infrastructure::shutdown::ShutdownController;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Errors decoding a control-channel message.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("invalid {subject} message: {source}")]
    Malformed {
        subject: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no handler for subject {0}")]
    UnknownSubject(String),
}

/// Body of a `router.register` message.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterMessage {
    pub uris: Vec<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub tags: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub app: Option<Value>,
    #[serde(default)]
    pub private_instance_id: Option<String>,
}

/// Body of a `router.unregister` message.
#[derive(Debug, Clone, Deserialize)]
pub struct UnregisterMessage {
    pub uris: Vec<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

/// A decoded control-channel message.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    Register(RegisterMessage),
    Unregister(UnregisterMessage),
}

impl ControlMessage {
    /// Decode the JSON payload of a message received on `subject`.
    pub fn decode(subject: &str, payload: &[u8]) -> Result<Self, MessageError> {
        let malformed = |source| MessageError::Malformed {
            subject: subject.to_string(),
            source,
        };

        match subject {
            REGISTER_SUBJECT => serde_json::from_slice(payload)
                .map(Self::Register)
                .map_err(malformed),
            UNREGISTER_SUBJECT => serde_json::from_slice(payload)
                .map(Self::Unregister)
                .map_err(malformed),
            other => Err(MessageError::UnknownSubject(other.to_string())),
        }
    }
}

impl RegisterMessage {
    /// One registration per uri.
    pub fn registrations(&self) -> Vec<Registration> {
        let tags: Vec<(Option<String>, Option<String>)> = self
            .tags
            .iter()
            .flatten()
            .map(|(k, v)| (Some(k.clone()), scalar(v)))
            .collect();
        let app = self.app.as_ref().and_then(scalar);

        self.uris
            .iter()
            .map(|uri| Registration {
                route: uri.clone(),
                host: self.host.clone(),
                port: self.port,
                tags: Default::default(),
                app: app.clone(),
                session: self.private_instance_id.clone(),
            }
            .tags(tags.clone()))
            .collect()
    }
}

/// Render a JSON scalar as a string; null and containers have no value.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Applies control-channel messages to a [`Registry`].
#[derive(Clone)]
pub struct RegistrationHandler {
    registry: Arc<Registry>,
}

impl RegistrationHandler {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Decode and apply one raw message.
    ///
    /// Returns the number of uris the message carried.
    pub fn handle(&self, subject: &str, payload: &[u8]) -> Result<usize, MessageError> {
        let message = ControlMessage::decode(subject, payload)?;
        Ok(self.apply(message))
    }

    /// Apply a decoded message.
    pub fn apply(&self, message: ControlMessage) -> usize {
        match message {
            ControlMessage::Register(msg) => {
                let registrations = msg.registrations();
                let count = registrations.len();
                for registration in registrations {
                    self.registry.register(registration);
                }
                count
            }
            ControlMessage::Unregister(msg) => {
                let (Some(host), Some(port)) = (msg.host.as_deref(), msg.port) else {
                    tracing::warn!("ignoring unregister for {:?} without host and port", msg.uris);
                    return 0;
                };
                for uri in &msg.uris {
                    self.registry.unregister(uri, host, port);
                }
                msg.uris.len()
            }
        }
    }

    /// Consume bus messages until the bus closes or shutdown is signalled.
    pub fn run(
        self,
        mut rx: broadcast::Receiver<BusMessage>,
        shutdown: &ShutdownController,
    ) -> JoinHandle<()> {
        let mut stop = shutdown.subscribe();
        let guard = shutdown.task_guard();

        tokio::spawn(async move {
            let _guard = guard;
            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Ok(msg) => self.on_bus_message(&msg),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("registration handler lagged, {} messages lost", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = stop.recv() => break,
                }
            }
            tracing::debug!("registration handler stopped");
        })
    }

    fn on_bus_message(&self, msg: &BusMessage) {
        if msg.subject != REGISTER_SUBJECT && msg.subject != UNREGISTER_SUBJECT {
            return;
        }
        if let Err(e) = self.handle(&msg.subject, &msg.payload) {
            tracing::warn!("dropping message: {}", e);
        }
    }
}
