mod local_bus;

pub use local_bus::{BusMessage, LocalBus};
