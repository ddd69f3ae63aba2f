mod control_channel;

pub use control_channel::{
    ChannelError, ControlChannel, ACTIVE_APPS_SUBJECT, REGISTER_SUBJECT, UNREGISTER_SUBJECT,
};
