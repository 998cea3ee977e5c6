//! Timed, capped vehicle spawning shared by traffic and police

use glam::{Quat, Vec3};
use rand::Rng;
use tracing::{debug, error, warn};

use super::frame::{flatten, look_rotation, SpawnVolume, Transform};
use super::pool::{ActorId, ActorPool};

/// The vehicle model a spawner instantiates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehiclePrefab {
    pub name: String,
}

impl VehiclePrefab {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Spawn cadence and cap
#[derive(Debug, Clone)]
pub struct SpawnerConfig {
    /// Seconds between spawns
    pub spawn_interval: f32,
    /// Maximum live vehicles from this spawner
    pub max_count: usize,
    /// World Y every spawned vehicle is placed at
    pub spawn_height: f32,
}

/// Where and how a new vehicle should be placed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPlacement {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Motion every spawned vehicle shares: straight along its facing at a fixed speed
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub transform: Transform,
    pub speed: f32,
    /// Seconds since spawn
    pub life_timer: f32,
}

impl Vehicle {
    pub fn at(placement: SpawnPlacement, speed: f32) -> Self {
        Self {
            transform: Transform::new(placement.position, placement.rotation),
            speed,
            life_timer: 0.0,
        }
    }

    pub fn drive(&mut self, dt: f32) {
        self.life_timer += dt;
        self.transform.position += self.transform.forward() * self.speed * dt;
    }
}

pub struct SpawnCoordinator {
    label: &'static str,
    config: SpawnerConfig,
    prefab: Option<VehiclePrefab>,
    volume: Option<SpawnVolume>,
    timer: f32,
    live_count: usize,
    warned_missing: bool,
}

impl SpawnCoordinator {
    pub fn new(
        label: &'static str,
        config: SpawnerConfig,
        prefab: Option<VehiclePrefab>,
        volume: Option<SpawnVolume>,
    ) -> Self {
        Self {
            label,
            config,
            prefab,
            volume,
            timer: 0.0,
            live_count: 0,
            warned_missing: false,
        }
    }

    /// Accumulate time; once the interval has elapsed and there is room under
    /// the cap, reset the timer and hand back a placement.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        player: &Transform,
        rng: &mut R,
    ) -> Option<SpawnPlacement> {
        let volume = match (&self.prefab, &self.volume) {
            (Some(_), Some(volume)) => volume,
            _ => {
                if !self.warned_missing {
                    self.warned_missing = true;
                    warn!(
                        spawner = self.label,
                        has_prefab = self.prefab.is_some(),
                        has_volume = self.volume.is_some(),
                        "Spawner is missing its prefab or spawn volume, spawning disabled"
                    );
                }
                return None;
            }
        };

        self.timer += dt;
        if self.timer < self.config.spawn_interval || self.live_count >= self.config.max_count {
            return None;
        }
        self.timer = 0.0;

        let mut position = volume.sample_point(rng);
        position.y = self.config.spawn_height;

        Some(SpawnPlacement {
            position,
            rotation: face_player(position, player),
        })
    }

    /// Keep a following volume in step with the player
    pub fn follow_player(&mut self, player_z: f32) {
        if let Some(volume) = self.volume.as_mut() {
            volume.follow(player_z);
        }
    }

    /// Insert a freshly built vehicle; the live count only moves once the
    /// pool actually accepted it.
    pub fn place<T>(&mut self, pool: &mut ActorPool<T>, vehicle: T) -> Option<ActorId> {
        match pool.insert(vehicle) {
            Ok(id) => {
                self.on_spawned();
                debug!(spawner = self.label, vehicle = ?id, "Vehicle spawned");
                Some(id)
            }
            Err(e) => {
                error!(spawner = self.label, error = %e, "Vehicle spawn skipped");
                None
            }
        }
    }

    /// Remove a vehicle from its pool. Stale ids return `None` and leave the
    /// live count alone, so each vehicle is counted out exactly once.
    pub fn retire<T>(&mut self, pool: &mut ActorPool<T>, id: ActorId) -> Option<T> {
        let vehicle = pool.remove(id)?;
        self.on_despawned();
        debug!(spawner = self.label, vehicle = ?id, "Vehicle retired");
        Some(vehicle)
    }

    fn on_spawned(&mut self) {
        self.live_count += 1;
    }

    /// Never drops below zero
    fn on_despawned(&mut self) {
        self.live_count = self.live_count.saturating_sub(1);
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }
}

/// Face the player's flattened position; fall back to the player's backward
/// direction when the spawn point sits on top of the player.
pub fn face_player(point: Vec3, player: &Transform) -> Quat {
    let mut to_player = flatten(player.position - point);
    if to_player.length_squared() < 0.001 {
        to_player = flatten(-player.forward());
    }
    look_rotation(to_player.normalize_or_zero())
}
