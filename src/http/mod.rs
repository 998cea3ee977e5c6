//! HTTP surface: health, HUD polling and session control

pub mod routes;

pub use routes::build_router;
