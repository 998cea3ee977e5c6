//! Time utilities for the simulation loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 30; // 30 ticks per second
pub const HUD_TPS: u32 = 10; // 10 HUD refreshes per second

/// Delta time of one simulation tick (in seconds)
pub fn tick_delta() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Wall-clock duration of one simulation tick
pub fn tick_duration() -> Duration {
    Duration::from_micros(1_000_000 / SIMULATION_TPS as u64)
}

/// Number of simulation ticks between two HUD broadcasts
pub fn hud_interval_ticks() -> u32 {
    (SIMULATION_TPS / HUD_TPS).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_delta_matches_tick_rate() {
        assert!((tick_delta() * SIMULATION_TPS as f32 - 1.0).abs() < 1e-6);
        assert_eq!(hud_interval_ticks(), 3);
    }

    #[test]
    fn uptime_is_zero_right_after_init() {
        init_server_time();
        assert!(uptime_secs() < 5);
    }
}
