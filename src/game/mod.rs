//! Game simulation modules

pub mod catch;
pub mod coins;
pub mod combat;
pub mod frame;
pub mod player;
pub mod police;
pub mod pool;
pub mod runner;
pub mod sections;
pub mod session;
pub mod snapshot;
pub mod spawner;
pub mod traffic;

pub use runner::{GameSession, SessionCommand};
pub use session::GameTuning;
