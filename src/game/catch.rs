//! Police catch arbitration: one police car at a time may run the catch
//! countdown; finishing it ends the session.

use tracing::info;

use super::pool::ActorId;

#[derive(Debug, Clone)]
pub struct CatchConfig {
    /// How far ahead of the player (player-local z) a police car must be
    pub pass_distance_ahead: f32,
    /// Seconds a car must stay ahead to catch the player
    pub time_to_catch: f32,
}

impl Default for CatchConfig {
    fn default() -> Self {
        Self {
            pass_distance_ahead: 10.0,
            time_to_catch: 3.0,
        }
    }
}

/// What one observation did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CatchOutcome {
    /// Nothing changed for this car
    Inert,
    /// This car took ownership of the countdown
    Acquired,
    /// This car still owns the countdown
    Counting { elapsed: f32 },
    /// This car fell back and gave up ownership
    Released,
    /// This car finished the countdown; the session is lost
    Caught,
}

#[derive(Debug, Clone)]
pub struct CatchArbiter {
    config: CatchConfig,
    owner: Option<ActorId>,
    countdown: f32,
    game_over: bool,
}

impl CatchArbiter {
    pub fn new(config: CatchConfig) -> Self {
        Self {
            config,
            owner: None,
            countdown: 0.0,
            game_over: false,
        }
    }

    /// Feed one police car's player-local z for this tick
    pub fn observe(&mut self, car: ActorId, local_z: f32, dt: f32) -> CatchOutcome {
        if self.game_over {
            return CatchOutcome::Inert;
        }

        let ahead = local_z > self.config.pass_distance_ahead;
        match self.owner {
            Some(owner) if owner == car => {
                if !ahead {
                    self.release();
                    return CatchOutcome::Released;
                }
                self.accumulate(car, dt)
                    .unwrap_or(CatchOutcome::Counting {
                        elapsed: self.countdown,
                    })
            }
            Some(_) => CatchOutcome::Inert,
            None if ahead => {
                self.owner = Some(car);
                self.countdown = 0.0;
                info!(car = ?car, "Police car passed the player, catch countdown started");
                self.accumulate(car, dt).unwrap_or(CatchOutcome::Acquired)
            }
            None => CatchOutcome::Inert,
        }
    }

    /// Add time for the owner; returns `Caught` once the countdown completes
    fn accumulate(&mut self, car: ActorId, dt: f32) -> Option<CatchOutcome> {
        self.countdown += dt;
        if self.countdown < self.config.time_to_catch {
            return None;
        }
        self.game_over = true;
        self.release();
        info!(car = ?car, "Player caught by police, mission failed");
        Some(CatchOutcome::Caught)
    }

    /// Drop ownership if `car` holds it (car destroyed or despawned)
    pub fn release_if_owner(&mut self, car: ActorId) -> bool {
        if self.owner == Some(car) {
            self.release();
            true
        } else {
            false
        }
    }

    fn release(&mut self) {
        self.owner = None;
        self.countdown = 0.0;
    }

    /// Police car currently running the countdown
    pub fn owner(&self) -> Option<ActorId> {
        self.owner
    }

    /// Seconds left before the owner catches the player
    pub fn remaining(&self) -> Option<f32> {
        self.owner
            .map(|_| (self.config.time_to_catch - self.countdown).max(0.0))
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }
}
