//! Infrastructure Layer
//!
//! Cross-cutting concerns: periodic background tasks and graceful shutdown.

pub mod periodic;
pub mod shutdown;

pub use periodic::spawn_periodic;
pub use shutdown::{shutdown_signal, ShutdownController, TaskGuard};
