//! Adapters Layer
//!
//! Inbound adapters drive the registry (control-channel messages, the status
//! endpoint); outbound adapters implement the domain ports.

pub mod inbound;
pub mod outbound;
