//! HUD WebSocket protocol message definitions
//! These are the wire types between the simulation server and HUD clients

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::pool::ActorId;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Keyboard/gamepad drive input, latest wins
    Drive {
        /// Throttle input (-1.0 = full brake, 1.0 = full forward)
        throttle: f32,
        /// Steering input (-1.0 = full left, 1.0 = full right)
        steer: f32,
    },

    /// Start a fresh session (the loss popup's restart button)
    Restart,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        session_id: Uuid,
        server_time: u64,
    },

    /// Periodic HUD state
    Hud {
        snapshot: HudSnapshot,
    },

    /// The player lost; the session is frozen until restarted
    SessionEnded {
        session_id: Uuid,
        reason: LossReason,
        distance: u32,
        coins: u32,
    },

    /// A new session replaced the previous one
    SessionRestarted {
        session_id: Uuid,
        seed: u64,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossReason {
    /// A police car held the catch countdown until it ran out
    Caught,
    /// The player drove into a road-side wall
    Wall,
}

/// Everything the HUD shows, rendered as text where the UI shows text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HudSnapshot {
    pub session_id: Uuid,
    /// Server tick number
    pub tick: u64,
    /// Whole metres travelled, zero padded to six digits
    pub distance_text: String,
    pub coins_text: String,
    /// Whole seconds left on the catch countdown, empty when nobody owns it
    pub countdown_text: String,
    pub game_over: bool,
    pub loss_reason: Option<LossReason>,
    pub traffic_count: usize,
    pub police_count: usize,
    /// Police car whose siren is playing
    pub audible_siren: Option<ActorId>,
    /// Police car running the catch countdown
    pub countdown_owner: Option<ActorId>,
    /// Crosshair yaw relative to the car, degrees
    pub aim_yaw_degrees: f32,
    pub armed_bombs: usize,
    /// Seconds until another bomb can be dropped
    pub bomb_cooldown: f32,
    /// Uncollected coins on the active road
    pub coins_on_road: usize,
    /// Controller frames received this session
    pub controller_frames: u64,
    /// Events since the previous HUD snapshot
    pub events: Vec<GameEvent>,
}

/// Simulation events surfaced to HUD clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A road section moved from behind the player to the leading edge
    SectionRecycled {
        slot: usize,
        section: usize,
        variant: String,
        from_z: f32,
        to_z: f32,
    },

    TrafficSpawned {
        car: ActorId,
    },

    TrafficDespawned {
        car: ActorId,
    },

    PoliceSpawned {
        car: ActorId,
    },

    PoliceDespawned {
        car: ActorId,
    },

    /// A car blew up (traffic collision, police destroyed)
    Explosion {
        x: f32,
        y: f32,
        z: f32,
    },

    /// Police car destroyed by shots or a bomb
    PoliceDestroyed {
        car: ActorId,
    },

    /// A police car took ownership of the catch countdown
    CountdownStarted {
        car: ActorId,
    },

    /// The countdown owner fell back; the countdown is free again
    CountdownReleased {
        car: ActorId,
    },

    /// The countdown ran out
    Caught {
        car: ActorId,
    },

    CoinsCollected {
        amount: u32,
        total: u32,
    },

    /// Crosshair shot fired
    Shot {
        hits: usize,
    },

    BombDropped {
        x: f32,
        z: f32,
    },

    /// Bomb press ignored while on cooldown
    BombCoolingDown {
        remaining: f32,
    },

    /// Player drove into a wall
    WallHit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_tagged() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"drive","throttle":1.0,"steer":-0.5}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Drive { throttle, steer } if throttle == 1.0 && steer == -0.5));

        let msg: ClientMsg = serde_json::from_str(r#"{"type":"restart"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Restart));

        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"join_match"}"#).is_err());
    }

    #[test]
    fn session_end_serializes_reason_in_snake_case() {
        let msg = ServerMsg::SessionEnded {
            session_id: Uuid::nil(),
            reason: LossReason::Caught,
            distance: 120,
            coins: 7,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "session_ended");
        assert_eq!(json["reason"], "caught");
    }

    #[test]
    fn events_carry_their_own_tag() {
        let json = serde_json::to_value(GameEvent::CoinsCollected { amount: 2, total: 9 }).unwrap();
        assert_eq!(json["event_type"], "coins_collected");
        assert_eq!(json["total"], 9);

        let json = serde_json::to_value(GameEvent::WallHit).unwrap();
        assert_eq!(json["event_type"], "wall_hit");
    }
}
