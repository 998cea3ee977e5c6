//! Arduino steering controller over UDP

pub mod protocol;
pub mod udp;

pub use protocol::{parse_line, AimConfig, AimState, ControllerEvent, ControllerState};
pub use udp::{ControllerListener, DEFAULT_CONTROLLER_PORT};
