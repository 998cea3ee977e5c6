//! One run of the game: every subsystem that used to be process-global,
//! owned by a single value and advanced with an explicit step.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::controller::{parse_line, AimConfig, AimState, ControllerEvent, ControllerState};
use crate::ws::protocol::{GameEvent, LossReason};

use super::catch::{CatchArbiter, CatchConfig};
use super::coins::{CoinConfig, CoinField, CoinWallet};
use super::combat::{CombatConfig, CombatSystem};
use super::player::{PlayerCar, PlayerConfig};
use super::police::{PoliceConfig, PoliceEvent, PoliceSystem};
use super::pool::ActorId;
use super::sections::{RecyclerConfig, RecyclerError, SectionRecycler};
use super::traffic::{TrafficConfig, TrafficEvent, TrafficSystem};

/// All gameplay constants for a session
#[derive(Debug, Clone, Default)]
pub struct GameTuning {
    pub recycler: RecyclerConfig,
    pub traffic: TrafficConfig,
    pub police: PoliceConfig,
    pub catch: CatchConfig,
    pub player: PlayerConfig,
    pub coins: CoinConfig,
    pub combat: CombatConfig,
    pub aim: AimConfig,
}

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Running,
    /// Frozen behind the loss popup until restarted
    Ended(LossReason),
}

/// Which input last touched steering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SteerSource {
    Drive,
    Controller,
}

pub struct SessionState {
    id: Uuid,
    tick: u64,
    phase: SessionPhase,
    rng: ChaCha8Rng,

    player: PlayerCar,
    recycler: SectionRecycler,
    coins: CoinField,
    wallet: CoinWallet,
    traffic: TrafficSystem,
    police: PoliceSystem,
    arbiter: CatchArbiter,
    combat: CombatSystem,

    controller: ControllerState,
    aim: AimState,
    pending_presses: Vec<ControllerEvent>,
    throttle: f32,
    steer: f32,
    steer_source: SteerSource,
}

impl SessionState {
    pub fn new(id: Uuid, seed: u64, tuning: GameTuning) -> Result<Self, RecyclerError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let recycler = SectionRecycler::new(tuning.recycler)?;

        let mut coins = CoinField::new(tuning.coins);
        let section_length = recycler.config().section_length;
        for &index in recycler.window() {
            if let Some(section) = recycler.section(index) {
                coins.spawn_for_section(index, section.position, section_length, &mut rng);
            }
        }

        info!(session_id = %id, seed, "Session created");

        Ok(Self {
            id,
            tick: 0,
            phase: SessionPhase::Running,
            rng,
            player: PlayerCar::new(tuning.player),
            recycler,
            coins,
            wallet: CoinWallet::default(),
            traffic: TrafficSystem::new(tuning.traffic),
            police: PoliceSystem::new(tuning.police),
            arbiter: CatchArbiter::new(tuning.catch),
            combat: CombatSystem::new(tuning.combat),
            controller: ControllerState::default(),
            aim: AimState::new(tuning.aim),
            pending_presses: Vec::new(),
            throttle: 0.0,
            steer: 0.0,
            steer_source: SteerSource::Drive,
        })
    }

    /// Keyboard/gamepad input; takes over steering from the controller
    pub fn apply_drive(&mut self, throttle: f32, steer: f32) {
        self.throttle = throttle.clamp(-1.0, 1.0);
        self.steer = steer.clamp(-1.0, 1.0);
        self.steer_source = SteerSource::Drive;
    }

    /// Fold one raw controller line in; malformed lines are logged and dropped
    pub fn apply_controller_line(&mut self, line: &str) -> bool {
        match parse_line(line) {
            Ok(frame) => {
                let presses = self.controller.apply(frame);
                self.pending_presses.extend(presses);
                self.steer_source = SteerSource::Controller;
                true
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, line, "Malformed controller line");
                false
            }
        }
    }

    /// Advance the simulation by `dt` seconds
    pub fn tick(&mut self, dt: f32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        self.tick += 1;

        if self.is_ended() {
            self.pending_presses.clear();
            return events;
        }

        self.aim.update(self.controller.steering_axis(), dt);
        let steer = match self.steer_source {
            SteerSource::Drive => self.steer,
            SteerSource::Controller => self.controller.steer_input(),
        };
        self.player.set_input(steer, self.throttle);
        self.player.step(dt);

        if self.player.hits_wall() {
            events.push(GameEvent::WallHit);
            self.end(LossReason::Wall);
            return events;
        }

        self.update_road(dt, &mut events);
        self.update_traffic(dt, &mut events);
        self.update_police(dt, &mut events);
        if self.is_ended() {
            return events;
        }
        self.update_combat(dt, &mut events);

        events
    }

    fn update_road(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let player_z = self.player.position().z;
        match self.recycler.update(dt, player_z, &mut self.rng) {
            Ok(recycled) => {
                let section_length = self.recycler.config().section_length;
                for moved in recycled {
                    self.coins.clear_section(moved.released);
                    let Some(section) = self.recycler.section(moved.acquired) else {
                        continue;
                    };
                    let origin = section.position;
                    let variant = self
                        .recycler
                        .config()
                        .variants
                        .get(section.variant)
                        .map(|v| v.name.clone())
                        .unwrap_or_default();
                    self.coins
                        .spawn_for_section(moved.acquired, origin, section_length, &mut self.rng);
                    events.push(GameEvent::SectionRecycled {
                        slot: moved.slot,
                        section: moved.acquired,
                        variant,
                        from_z: moved.from_z,
                        to_z: moved.to_z,
                    });
                }
            }
            Err(e) => error!(session_id = %self.id, error = %e, "Section recycle failed"),
        }

        let collected = self.coins.collect_near(self.player.position());
        if collected > 0 {
            let total = self.wallet.add(collected as i64);
            events.push(GameEvent::CoinsCollected {
                amount: collected as u32,
                total,
            });
        }
    }

    fn update_traffic(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        for event in self.traffic.tick(dt, &self.player.transform, &mut self.rng) {
            events.push(match event {
                TrafficEvent::Spawned(car) => GameEvent::TrafficSpawned { car },
                TrafficEvent::Despawned(car) => GameEvent::TrafficDespawned { car },
                TrafficEvent::Collided { position, .. } => GameEvent::Explosion {
                    x: position.x,
                    y: position.y,
                    z: position.z,
                },
            });
        }
    }

    fn update_police(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let police_events = self.police.tick(
            dt,
            &self.player.transform,
            &mut self.arbiter,
            &mut self.rng,
        );
        for event in police_events {
            self.push_police_event(event, events);
        }

        if self.arbiter.is_game_over() {
            self.end(LossReason::Caught);
        }
    }

    fn update_combat(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let presses = std::mem::take(&mut self.pending_presses);
        for press in presses {
            match press {
                ControllerEvent::Button1Pressed => self.fire(events),
                ControllerEvent::Button2Pressed => {
                    let position = self.player.position();
                    if self.combat.drop_bomb(position) {
                        events.push(GameEvent::BombDropped {
                            x: position.x,
                            z: position.z,
                        });
                    } else {
                        let remaining = self.combat.cooldown_remaining();
                        debug!(session_id = %self.id, remaining, "Bomb on cooldown");
                        events.push(GameEvent::BombCoolingDown { remaining });
                    }
                }
            }
        }

        for detonation in self.combat.tick(dt) {
            events.push(GameEvent::Explosion {
                x: detonation.position.x,
                y: detonation.position.y,
                z: detonation.position.z,
            });
            let radius_sq = detonation.radius * detonation.radius;
            let destroyed = self.police.damage_where(
                |p| p.distance_squared(detonation.position) <= radius_sq,
                detonation.damage,
                &mut self.arbiter,
            );
            for event in destroyed {
                self.push_police_event(event, events);
            }
        }
    }

    /// Crosshair shot at whatever police sit inside the aim box
    fn fire(&mut self, events: &mut Vec<GameEvent>) {
        let crosshair = self
            .combat
            .crosshair(&self.player.transform, self.aim.current_yaw());
        let hits = self
            .police
            .cars()
            .filter(|(_, car)| crosshair.contains(car.vehicle.transform.position))
            .count();
        events.push(GameEvent::Shot { hits });

        let destroyed = self.police.damage_where(
            |p| crosshair.contains(p),
            self.combat.shot_damage(),
            &mut self.arbiter,
        );
        for event in destroyed {
            self.push_police_event(event, events);
        }
    }

    fn push_police_event(&self, event: PoliceEvent, events: &mut Vec<GameEvent>) {
        match event {
            PoliceEvent::Spawned(car) => events.push(GameEvent::PoliceSpawned { car }),
            PoliceEvent::Despawned(car) => events.push(GameEvent::PoliceDespawned { car }),
            PoliceEvent::Destroyed { car, position } => {
                events.push(GameEvent::PoliceDestroyed { car });
                events.push(GameEvent::Explosion {
                    x: position.x,
                    y: position.y,
                    z: position.z,
                });
            }
            PoliceEvent::CountdownStarted(car) => {
                events.push(GameEvent::CountdownStarted { car })
            }
            PoliceEvent::CountdownReleased(car) => {
                events.push(GameEvent::CountdownReleased { car })
            }
            PoliceEvent::Caught(car) => events.push(GameEvent::Caught { car }),
        }
    }

    fn end(&mut self, reason: LossReason) {
        if self.is_ended() {
            return;
        }
        self.phase = SessionPhase::Ended(reason);
        info!(
            session_id = %self.id,
            reason = ?reason,
            distance = self.distance(),
            coins = self.wallet.total(),
            "Session ended"
        );
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    #[cfg(test)]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.phase, SessionPhase::Ended(_))
    }

    pub fn loss_reason(&self) -> Option<LossReason> {
        match self.phase {
            SessionPhase::Ended(reason) => Some(reason),
            SessionPhase::Running => None,
        }
    }

    /// Whole metres of forward progress
    pub fn distance(&self) -> u32 {
        self.player.distance_travelled().max(0.0) as u32
    }

    pub fn coins(&self) -> u32 {
        self.wallet.total()
    }

    /// Seconds left on the catch countdown while a police car owns it
    pub fn countdown_remaining(&self) -> Option<f32> {
        self.arbiter.remaining()
    }

    pub fn traffic_count(&self) -> usize {
        self.traffic.live_count()
    }

    pub fn police_count(&self) -> usize {
        self.police.live_count()
    }

    pub fn audible_siren(&self) -> Option<ActorId> {
        self.police.audible_siren()
    }

    /// Police car running the catch countdown
    pub fn countdown_owner(&self) -> Option<ActorId> {
        self.arbiter.owner()
    }

    pub fn aim_yaw(&self) -> f32 {
        self.aim.current_yaw()
    }

    pub fn armed_bombs(&self) -> usize {
        self.combat.armed_bombs()
    }

    pub fn bomb_cooldown(&self) -> f32 {
        self.combat.cooldown_remaining()
    }

    /// Uncollected coins across the active window
    pub fn coins_on_road(&self) -> usize {
        self.coins.len()
    }

    pub fn controller_frames(&self) -> u64 {
        self.controller.frames()
    }

    #[cfg(test)]
    pub fn player(&self) -> &PlayerCar {
        &self.player
    }

    #[cfg(test)]
    pub fn recycler(&self) -> &SectionRecycler {
        &self.recycler
    }

    #[cfg(test)]
    pub fn coin_field(&self) -> &CoinField {
        &self.coins
    }

    #[cfg(test)]
    pub fn controller(&self) -> &ControllerState {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::spawner::SpawnerConfig;
    use crate::util::time::tick_delta;

    fn session(seed: u64) -> SessionState {
        SessionState::new(Uuid::new_v4(), seed, GameTuning::default()).unwrap()
    }

    /// No traffic or police unless a test asks for them
    fn empty_road() -> GameTuning {
        let mut tuning = GameTuning::default();
        tuning.traffic.spawner = SpawnerConfig {
            spawn_interval: f32::MAX,
            ..tuning.traffic.spawner
        };
        tuning.police.spawner = SpawnerConfig {
            spawn_interval: f32::MAX,
            ..tuning.police.spawner
        };
        tuning
    }

    #[test]
    fn new_session_lays_out_the_window_with_coins() {
        let state = session(1);
        assert_eq!(state.phase(), SessionPhase::Running);
        assert_eq!(state.recycler().active_count(), 10);
        for &index in state.recycler().window() {
            assert!((4..=8).contains(&state.coin_field().coins_on(index).len()));
        }
        assert_eq!(state.coins(), 0);
        assert_eq!(state.countdown_remaining(), None);
    }

    #[test]
    fn invalid_recycler_config_is_rejected() {
        let mut tuning = GameTuning::default();
        tuning.recycler.pool_size = tuning.recycler.window_size;
        assert!(matches!(
            SessionState::new(Uuid::nil(), 1, tuning),
            Err(RecyclerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn idle_player_is_eventually_caught() {
        let mut state = session(7);
        let mut saw_countdown = false;
        let mut caught = false;

        for _ in 0..(30 * 30) {
            let events = state.tick(tick_delta());
            saw_countdown |= events
                .iter()
                .any(|e| matches!(e, GameEvent::CountdownStarted { .. }));
            caught |= events.iter().any(|e| matches!(e, GameEvent::Caught { .. }));
            if state.is_ended() {
                break;
            }
        }

        assert!(saw_countdown);
        assert!(caught);
        assert_eq!(state.phase(), SessionPhase::Ended(LossReason::Caught));
        assert_eq!(state.countdown_remaining(), None);
        assert_eq!(state.countdown_owner(), None);
    }

    #[test]
    fn steering_into_a_wall_ends_the_session_and_freezes_it() {
        let mut state = SessionState::new(Uuid::nil(), 3, empty_road()).unwrap();
        state.apply_drive(0.0, 1.0);

        let mut wall_events = 0;
        for _ in 0..300 {
            wall_events += state
                .tick(tick_delta())
                .iter()
                .filter(|e| matches!(e, GameEvent::WallHit))
                .count();
        }
        assert_eq!(wall_events, 1);
        assert_eq!(state.loss_reason(), Some(LossReason::Wall));

        let frozen = state.player().position();
        assert!(state.tick(tick_delta()).is_empty());
        assert_eq!(state.player().position(), frozen);
        assert_eq!(state.tick_count(), 301);
    }

    #[test]
    fn driving_forward_recycles_sections_and_counts_distance() {
        let mut state = SessionState::new(Uuid::nil(), 4, empty_road()).unwrap();
        state.apply_drive(1.0, 0.0);

        let mut recycled = 0;
        for _ in 0..(30 * 30) {
            recycled += state
                .tick(tick_delta())
                .iter()
                .filter(|e| matches!(e, GameEvent::SectionRecycled { .. }))
                .count();
        }

        assert!(state.distance() > 26 * 2);
        assert!(recycled > 0);
        assert_eq!(state.recycler().active_count(), 10);
        assert!(state.recycler().leading_edge_z() > state.player().position().z);
    }

    #[test]
    fn controller_steering_takes_over_until_the_next_drive_input() {
        let mut state = SessionState::new(Uuid::nil(), 5, empty_road()).unwrap();
        assert!(state.apply_controller_line("0,1,1"));
        for _ in 0..10 {
            state.tick(tick_delta());
        }
        assert!(state.player().input().x > 0.99);

        state.apply_drive(0.0, 0.0);
        state.tick(tick_delta());
        assert_eq!(state.player().input().x, 0.0);
    }

    #[test]
    fn malformed_controller_line_changes_nothing() {
        let mut state = session(6);
        assert!(!state.apply_controller_line("abc"));
        assert_eq!(state.controller_frames(), 0);
        assert_eq!(state.controller().steering_axis(), 0.0);
        assert!(!state.controller().button1_held());
        assert!(!state.controller().button2_held());
    }

    #[test]
    fn buttons_fire_and_drop_bombs_with_cooldown() {
        let mut state = SessionState::new(Uuid::nil(), 8, empty_road()).unwrap();

        state.apply_controller_line("512,0,1");
        let events = state.tick(tick_delta());
        assert!(events.contains(&GameEvent::Shot { hits: 0 }));

        state.apply_controller_line("512,1,0");
        let events = state.tick(tick_delta());
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::BombDropped { .. })));
        assert_eq!(state.armed_bombs(), 1);
        assert!(state.bomb_cooldown() > 4.9);
        assert_eq!(state.controller_frames(), 2);

        state.apply_controller_line("512,1,1");
        state.apply_controller_line("512,1,0");
        let events = state.tick(tick_delta());
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::BombCoolingDown { .. })));

        // Fuse runs out after two seconds
        let mut exploded = false;
        for _ in 0..70 {
            exploded |= state
                .tick(tick_delta())
                .iter()
                .any(|e| matches!(e, GameEvent::Explosion { .. }));
        }
        assert!(exploded);
        assert_eq!(state.armed_bombs(), 0);
    }

    #[test]
    fn same_seed_replays_identically() {
        let mut a = SessionState::new(Uuid::nil(), 99, GameTuning::default()).unwrap();
        let mut b = SessionState::new(Uuid::nil(), 99, GameTuning::default()).unwrap();
        a.apply_drive(0.6, 0.1);
        b.apply_drive(0.6, 0.1);

        for _ in 0..300 {
            assert_eq!(a.tick(tick_delta()), b.tick(tick_delta()));
        }
        assert_eq!(a.player().position(), b.player().position());
        assert_eq!(a.coins(), b.coins());
    }
}
