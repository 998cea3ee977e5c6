//! Shared utilities

pub mod math;
pub mod rate_limit;
pub mod time;
