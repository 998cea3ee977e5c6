//! HUD WebSocket endpoint and wire types

pub mod handler;
pub mod protocol;

pub use handler::ws_handler;
