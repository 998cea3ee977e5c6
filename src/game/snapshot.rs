//! HUD snapshot building

use crate::ws::protocol::{GameEvent, HudSnapshot};

use super::session::SessionState;

/// Builds HUD snapshots at a fixed tick cadence, batching events in between
pub struct HudBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
    /// Events since the last snapshot went out
    pending_events: Vec<GameEvent>,
}

impl HudBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            pending_events: Vec::new(),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (session end, restart)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    pub fn record(&mut self, events: Vec<GameEvent>) {
        self.pending_events.extend(events);
    }

    /// Drop batched events (a restart makes them meaningless)
    pub fn clear(&mut self) {
        self.pending_events.clear();
    }

    /// Build a snapshot of the session, draining batched events
    pub fn build(&mut self, state: &SessionState) -> HudSnapshot {
        HudSnapshot {
            session_id: state.id(),
            tick: state.tick_count(),
            distance_text: format_distance(state.distance()),
            coins_text: state.coins().to_string(),
            countdown_text: format_countdown(state.countdown_remaining()),
            game_over: state.is_ended(),
            loss_reason: state.loss_reason(),
            traffic_count: state.traffic_count(),
            police_count: state.police_count(),
            audible_siren: state.audible_siren(),
            countdown_owner: state.countdown_owner(),
            aim_yaw_degrees: state.aim_yaw(),
            armed_bombs: state.armed_bombs(),
            bomb_cooldown: state.bomb_cooldown(),
            coins_on_road: state.coins_on_road(),
            controller_frames: state.controller_frames(),
            events: std::mem::take(&mut self.pending_events),
        }
    }
}

/// Distance as shown on the HUD: whole metres, six digits
pub fn format_distance(metres: u32) -> String {
    format!("{:06}", metres)
}

/// Whole seconds left, rounded up; empty when nobody is counting
pub fn format_countdown(remaining: Option<f32>) -> String {
    match remaining {
        Some(secs) => (secs.max(0.0).ceil() as u32).to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::GameTuning;
    use uuid::Uuid;

    #[test]
    fn sends_every_interval_and_on_demand() {
        let mut builder = HudBuilder::new(3);
        assert!(!builder.should_send());
        assert!(!builder.should_send());
        assert!(builder.should_send());
        assert!(!builder.should_send());

        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn distance_and_countdown_text() {
        assert_eq!(format_distance(0), "000000");
        assert_eq!(format_distance(1234), "001234");
        assert_eq!(format_countdown(None), "");
        assert_eq!(format_countdown(Some(2.1)), "3");
        assert_eq!(format_countdown(Some(0.0)), "0");
    }

    #[test]
    fn build_drains_recorded_events() {
        let state = SessionState::new(Uuid::nil(), 1, GameTuning::default()).unwrap();
        let mut builder = HudBuilder::new(3);
        builder.record(vec![GameEvent::WallHit]);

        let hud = builder.build(&state);
        assert_eq!(hud.events, vec![GameEvent::WallHit]);
        assert_eq!(hud.distance_text, "000000");
        assert_eq!(hud.coins_text, "0");
        assert!(!hud.game_over);
        assert_eq!(hud.countdown_owner, None);
        assert_eq!(hud.armed_bombs, 0);
        assert_eq!(hud.controller_frames, 0);
        assert!(hud.coins_on_road >= 10 * 4);

        assert!(builder.build(&state).events.is_empty());
    }
}
