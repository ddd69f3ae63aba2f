mod registration_handler;
mod status_server;

pub use registration_handler::{
    ControlMessage, MessageError, RegisterMessage, RegistrationHandler, UnregisterMessage,
};
pub use status_server::{StatusServer, StatusState};
