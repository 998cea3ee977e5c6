//! Session task: the fixed-rate tick loop that owns the simulation

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{error, info};
use uuid::Uuid;

use crate::util::time::{hud_interval_ticks, tick_delta, tick_duration};
use crate::ws::protocol::{HudSnapshot, ServerMsg};

use super::sections::RecyclerError;
use super::session::{GameTuning, SessionState};
use super::snapshot::HudBuilder;

/// Commands from HTTP/WS handlers to the session task
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Drive { throttle: f32, steer: f32 },
    Restart,
    Shutdown,
}

/// Identity of the session currently running
#[derive(Debug, Clone, Copy)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub seed: u64,
    pub tick: u64,
}

/// Handle to the running session
#[derive(Clone)]
pub struct SessionHandle {
    pub command_tx: mpsc::Sender<SessionCommand>,
    pub hud_tx: broadcast::Sender<ServerMsg>,
    latest_hud: Arc<RwLock<Option<HudSnapshot>>>,
    info: Arc<RwLock<SessionInfo>>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.hud_tx.subscribe()
    }

    /// Queue a command; false once the session task is gone
    pub async fn send(&self, command: SessionCommand) -> bool {
        self.command_tx.send(command).await.is_ok()
    }

    pub fn latest_hud(&self) -> Option<HudSnapshot> {
        self.latest_hud.read().clone()
    }

    pub fn info(&self) -> SessionInfo {
        *self.info.read()
    }
}

/// The authoritative game session
pub struct GameSession {
    state: SessionState,
    tuning: GameTuning,
    /// Reused on every restart when set
    fixed_seed: Option<u64>,
    command_rx: mpsc::Receiver<SessionCommand>,
    controller_rx: Option<mpsc::UnboundedReceiver<String>>,
    hud_tx: broadcast::Sender<ServerMsg>,
    hud_builder: HudBuilder,
    latest_hud: Arc<RwLock<Option<HudSnapshot>>>,
    info: Arc<RwLock<SessionInfo>>,
}

impl GameSession {
    /// Create the first session
    pub fn new(
        tuning: GameTuning,
        fixed_seed: Option<u64>,
        controller_rx: Option<mpsc::UnboundedReceiver<String>>,
    ) -> Result<(Self, SessionHandle), RecyclerError> {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (hud_tx, _) = broadcast::channel(64);

        let seed = fixed_seed.unwrap_or_else(rand::random);
        let state = SessionState::new(Uuid::new_v4(), seed, tuning.clone())?;

        let info = Arc::new(RwLock::new(SessionInfo {
            session_id: state.id(),
            seed,
            tick: 0,
        }));
        let latest_hud = Arc::new(RwLock::new(None));

        let handle = SessionHandle {
            command_tx,
            hud_tx: hud_tx.clone(),
            latest_hud: latest_hud.clone(),
            info: info.clone(),
        };

        let session = Self {
            state,
            tuning,
            fixed_seed,
            command_rx,
            controller_rx,
            hud_tx,
            hud_builder: HudBuilder::new(hud_interval_ticks()),
            latest_hud,
            info,
        };

        Ok((session, handle))
    }

    /// Run the fixed-rate tick loop until shut down
    pub async fn run(mut self) {
        info!(session_id = %self.state.id(), "Session loop started");

        let mut tick_interval = interval(tick_duration());
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            if !self.process_commands() {
                break;
            }
            self.drain_controller();
            self.step();
        }

        info!(session_id = %self.state.id(), "Session loop stopped");
    }

    /// Drain queued commands; false when asked to shut down
    fn process_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(SessionCommand::Drive { throttle, steer }) => {
                    self.state.apply_drive(throttle, steer);
                }
                Ok(SessionCommand::Restart) => self.restart(),
                Ok(SessionCommand::Shutdown) => return false,
                Err(mpsc::error::TryRecvError::Empty) => return true,
                // Every handle dropped: nobody can drive or restart any more
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Apply every controller line received since the last tick, oldest first
    fn drain_controller(&mut self) {
        let Some(rx) = self.controller_rx.as_mut() else {
            return;
        };
        while let Ok(line) = rx.try_recv() {
            self.state.apply_controller_line(&line);
        }
    }

    /// Run one simulation tick and publish the HUD when due
    fn step(&mut self) {
        let was_ended = self.state.is_ended();
        let events = self.state.tick(tick_delta());
        self.hud_builder.record(events);

        if !was_ended {
            if let Some(reason) = self.state.loss_reason() {
                let _ = self.hud_tx.send(ServerMsg::SessionEnded {
                    session_id: self.state.id(),
                    reason,
                    distance: self.state.distance(),
                    coins: self.state.coins(),
                });
                self.hud_builder.force_next();
            }
        }

        self.info.write().tick = self.state.tick_count();

        if self.hud_builder.should_send() {
            let snapshot = self.hud_builder.build(&self.state);
            *self.latest_hud.write() = Some(snapshot.clone());
            let _ = self.hud_tx.send(ServerMsg::Hud { snapshot });
        }
    }

    /// Replace the session with a fresh one
    fn restart(&mut self) {
        let seed = self.fixed_seed.unwrap_or_else(rand::random);
        let state = match SessionState::new(Uuid::new_v4(), seed, self.tuning.clone()) {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "Session restart failed");
                return;
            }
        };

        info!(
            previous = %self.state.id(),
            session_id = %state.id(),
            seed,
            "Session restarted"
        );

        self.state = state;
        self.hud_builder.clear();
        self.hud_builder.force_next();
        *self.info.write() = SessionInfo {
            session_id: self.state.id(),
            seed,
            tick: 0,
        };
        let _ = self.hud_tx.send(ServerMsg::SessionRestarted {
            session_id: self.state.id(),
            seed,
        });
    }
}
