//! Police pursuit: cars spawned behind the player that try to overtake it

use glam::Vec3;
use rand::Rng;
use tracing::info;

use super::catch::{CatchArbiter, CatchOutcome};
use super::combat::{apply_damage, Damageable};
use super::frame::{SpawnVolume, Transform};
use super::pool::{ActorId, ActorPool};
use super::spawner::{SpawnCoordinator, SpawnPlacement, SpawnerConfig, Vehicle, VehiclePrefab};
use crate::util::math::safe_gen_range;

#[derive(Debug, Clone)]
pub struct PoliceConfig {
    pub spawner: SpawnerConfig,
    pub prefab: Option<VehiclePrefab>,
    pub volume: Option<SpawnVolume>,
    /// Police must be faster than the player to ever catch up
    pub min_speed: f32,
    pub max_speed: f32,
    pub max_health: f32,
    pub despawn_distance_behind: f32,
    pub despawn_check_delay: f32,
    /// Audio listener (camera) position relative to the player
    pub listener_offset: Vec3,
}

impl Default for PoliceConfig {
    fn default() -> Self {
        Self {
            spawner: SpawnerConfig {
                spawn_interval: 3.0,
                max_count: 5,
                spawn_height: 0.5,
            },
            prefab: Some(VehiclePrefab::new("interceptor")),
            volume: Some(
                SpawnVolume::new(
                    Transform::from_position(Vec3::new(0.0, 0.0, -25.0)),
                    Vec3::ZERO,
                    Vec3::new(8.0, 2.0, 10.0),
                )
                .following(-25.0),
            ),
            min_speed: 35.0,
            max_speed: 35.0,
            max_health: 100.0,
            despawn_distance_behind: 60.0,
            despawn_check_delay: 0.25,
            listener_offset: Vec3::new(0.0, 3.0, -8.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoliceCar {
    pub vehicle: Vehicle,
    pub health: f32,
    /// Only the car closest to the listener plays its siren
    pub siren_audible: bool,
}

impl Damageable for PoliceCar {
    fn take_damage(&mut self, amount: f32) -> bool {
        let (health, destroyed) = apply_damage(self.health, amount);
        self.health = health;
        destroyed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoliceEvent {
    Spawned(ActorId),
    Despawned(ActorId),
    Destroyed { car: ActorId, position: Vec3 },
    CountdownStarted(ActorId),
    CountdownReleased(ActorId),
    Caught(ActorId),
}

pub struct PoliceSystem {
    config: PoliceConfig,
    coordinator: SpawnCoordinator,
    cars: ActorPool<PoliceCar>,
    audible: Option<ActorId>,
}

impl PoliceSystem {
    pub fn new(config: PoliceConfig) -> Self {
        let coordinator = SpawnCoordinator::new(
            "police",
            config.spawner.clone(),
            config.prefab.clone(),
            config.volume.clone(),
        );
        Self {
            cars: ActorPool::with_capacity(config.spawner.max_count),
            coordinator,
            audible: None,
            config,
        }
    }

    /// Spawn, drive, arbitrate the catch countdown, despawn, pick the siren
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        player: &Transform,
        arbiter: &mut CatchArbiter,
        rng: &mut R,
    ) -> Vec<PoliceEvent> {
        let mut events = Vec::new();

        self.coordinator.follow_player(player.position.z);
        if let Some(placement) = self.coordinator.tick(dt, player, rng) {
            if let Some(id) = self.spawn(placement, rng) {
                events.push(PoliceEvent::Spawned(id));
            }
        }

        for id in self.cars.ids() {
            let Some(car) = self.cars.get_mut(id) else {
                continue;
            };
            car.vehicle.drive(dt);
            let life_timer = car.vehicle.life_timer;
            let local = player.inverse_transform_point(car.vehicle.transform.position);

            match arbiter.observe(id, local.z, dt) {
                CatchOutcome::Acquired => events.push(PoliceEvent::CountdownStarted(id)),
                CatchOutcome::Released => events.push(PoliceEvent::CountdownReleased(id)),
                CatchOutcome::Caught => {
                    events.push(PoliceEvent::Caught(id));
                    // The catching car has done its job
                    self.despawn(id, arbiter);
                    continue;
                }
                CatchOutcome::Counting { .. } | CatchOutcome::Inert => {}
            }

            if life_timer >= self.config.despawn_check_delay
                && local.z < -self.config.despawn_distance_behind
                && self.despawn(id, arbiter)
            {
                events.push(PoliceEvent::Despawned(id));
            }
        }

        let listener = player.transform_point(self.config.listener_offset);
        self.update_sirens(listener);

        events
    }

    fn spawn<R: Rng + ?Sized>(&mut self, placement: SpawnPlacement, rng: &mut R) -> Option<ActorId> {
        let speed = safe_gen_range(rng, self.config.min_speed, self.config.max_speed);
        let car = PoliceCar {
            vehicle: Vehicle::at(placement, speed),
            health: self.config.max_health,
            siren_audible: false,
        };
        self.coordinator.place(&mut self.cars, car)
    }

    /// Retire a car and release any catch ownership it held.
    /// Stale ids are ignored so the live count drops exactly once.
    pub fn despawn(&mut self, car: ActorId, arbiter: &mut CatchArbiter) -> bool {
        if self.coordinator.retire(&mut self.cars, car).is_none() {
            return false;
        }
        arbiter.release_if_owner(car);
        if self.audible == Some(car) {
            self.audible = None;
        }
        true
    }

    /// Damage one car; destroyed cars are removed
    pub fn damage(
        &mut self,
        car: ActorId,
        amount: f32,
        arbiter: &mut CatchArbiter,
    ) -> Option<PoliceEvent> {
        let target = self.cars.get_mut(car)?;
        if !target.take_damage(amount) {
            return None;
        }
        let position = target.vehicle.transform.position;
        self.despawn(car, arbiter);
        info!(car = ?car, "Police car destroyed");
        Some(PoliceEvent::Destroyed { car, position })
    }

    /// Damage every car whose position satisfies `hit`
    pub fn damage_where<F>(
        &mut self,
        hit: F,
        amount: f32,
        arbiter: &mut CatchArbiter,
    ) -> Vec<PoliceEvent>
    where
        F: Fn(Vec3) -> bool,
    {
        let targets: Vec<ActorId> = self
            .cars
            .iter()
            .filter(|(_, car)| hit(car.vehicle.transform.position))
            .map(|(id, _)| id)
            .collect();

        targets
            .into_iter()
            .filter_map(|id| self.damage(id, amount, arbiter))
            .collect()
    }

    /// Unmute the car nearest the listener, mute the rest
    pub fn update_sirens(&mut self, listener: Vec3) -> Option<ActorId> {
        let nearest = self
            .cars
            .iter()
            .map(|(id, car)| (id, car.vehicle.transform.position.distance_squared(listener)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id);

        for (id, car) in self.cars.iter_mut() {
            car.siren_audible = Some(id) == nearest;
        }
        self.audible = nearest;
        nearest
    }

    pub fn audible_siren(&self) -> Option<ActorId> {
        self.audible
    }

    pub fn live_count(&self) -> usize {
        self.coordinator.live_count()
    }

    pub fn cars(&self) -> impl Iterator<Item = (ActorId, &PoliceCar)> {
        self.cars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catch::CatchConfig;
    use glam::Quat;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn quiet_config() -> PoliceConfig {
        // No automatic spawns; tests place cars by hand
        PoliceConfig {
            spawner: SpawnerConfig {
                spawn_interval: f32::MAX,
                max_count: 5,
                spawn_height: 0.5,
            },
            ..PoliceConfig::default()
        }
    }

    fn place(police: &mut PoliceSystem, z: f32, rng: &mut ChaCha8Rng) -> ActorId {
        police
            .spawn(
                SpawnPlacement {
                    position: Vec3::new(0.0, 0.5, z),
                    rotation: Quat::IDENTITY,
                },
                rng,
            )
            .unwrap()
    }

    #[test]
    fn spawns_behind_the_player_facing_forward() {
        let config = PoliceConfig {
            spawner: SpawnerConfig {
                spawn_interval: 0.0,
                max_count: 5,
                spawn_height: 0.5,
            },
            ..PoliceConfig::default()
        };
        let mut police = PoliceSystem::new(config);
        let mut arbiter = CatchArbiter::new(CatchConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let player = Transform::from_position(Vec3::new(0.0, 0.5, 100.0));

        let events = police.tick(0.0, &player, &mut arbiter, &mut rng);
        assert!(matches!(events.as_slice(), [PoliceEvent::Spawned(_)]));

        let (_, car) = police.cars().next().unwrap();
        assert!((70.0..=80.0).contains(&car.vehicle.transform.position.z));
        assert!(car.vehicle.transform.forward().z > 0.0);
        assert_eq!(car.health, 100.0);
    }

    #[test]
    fn overtaking_car_catches_the_player() {
        let mut police = PoliceSystem::new(quiet_config());
        let mut arbiter = CatchArbiter::new(CatchConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let car = place(&mut police, 11.0, &mut rng);
        police.cars.get_mut(car).unwrap().vehicle.speed = 0.0;
        let player = Transform::from_position(Vec3::new(0.0, 0.5, 0.0));

        let events = police.tick(0.5, &player, &mut arbiter, &mut rng);
        assert!(events.contains(&PoliceEvent::CountdownStarted(car)));
        for _ in 0..4 {
            police.tick(0.5, &player, &mut arbiter, &mut rng);
        }
        assert!(!arbiter.is_game_over());

        let events = police.tick(0.5, &player, &mut arbiter, &mut rng);
        assert!(events.contains(&PoliceEvent::Caught(car)));
        assert!(arbiter.is_game_over());
        assert_eq!(arbiter.owner(), None);
        assert_eq!(police.live_count(), 0);
    }

    #[test]
    fn second_car_ahead_stays_inert() {
        let mut police = PoliceSystem::new(quiet_config());
        let mut arbiter = CatchArbiter::new(CatchConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let first = place(&mut police, 12.0, &mut rng);
        let second = place(&mut police, 15.0, &mut rng);
        for (_, car) in police.cars.iter_mut() {
            car.vehicle.speed = 0.0;
        }
        let player = Transform::default();

        police.tick(0.1, &player, &mut arbiter, &mut rng);
        assert_eq!(arbiter.owner(), Some(first));
        assert_ne!(arbiter.owner(), Some(second));
    }

    #[test]
    fn destroying_the_owner_releases_the_countdown() {
        let mut police = PoliceSystem::new(quiet_config());
        let mut arbiter = CatchArbiter::new(CatchConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let car = place(&mut police, 12.0, &mut rng);
        police.cars.get_mut(car).unwrap().vehicle.speed = 0.0;
        let player = Transform::default();

        police.tick(0.1, &player, &mut arbiter, &mut rng);
        assert_eq!(arbiter.owner(), Some(car));

        assert!(police.damage(car, 60.0, &mut arbiter).is_none());
        assert_eq!(police.cars.get(car).unwrap().health, 40.0);
        assert!(matches!(
            police.damage(car, 60.0, &mut arbiter),
            Some(PoliceEvent::Destroyed { .. })
        ));
        assert_eq!(arbiter.owner(), None);
        assert_eq!(police.live_count(), 0);

        // Damage to a car that is already gone is a no-op
        assert!(police.damage(car, 60.0, &mut arbiter).is_none());
        assert_eq!(police.live_count(), 0);
    }

    #[test]
    fn falling_far_behind_despawns_once() {
        let mut police = PoliceSystem::new(quiet_config());
        let mut arbiter = CatchArbiter::new(CatchConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let car = place(&mut police, -100.0, &mut rng);
        police.cars.get_mut(car).unwrap().vehicle.speed = 0.0;
        let player = Transform::default();

        let events = police.tick(0.1, &player, &mut arbiter, &mut rng);
        assert!(events.is_empty());
        let events = police.tick(0.2, &player, &mut arbiter, &mut rng);
        assert_eq!(events, vec![PoliceEvent::Despawned(car)]);
        assert!(!police.despawn(car, &mut arbiter));
        assert_eq!(police.live_count(), 0);
    }

    #[test]
    fn only_the_nearest_siren_is_audible() {
        let mut police = PoliceSystem::new(quiet_config());
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let far = place(&mut police, -40.0, &mut rng);
        let near = place(&mut police, -10.0, &mut rng);

        assert_eq!(police.update_sirens(Vec3::new(0.0, 3.0, -8.0)), Some(near));
        assert!(police.cars.get(near).unwrap().siren_audible);
        assert!(!police.cars.get(far).unwrap().siren_audible);

        assert_eq!(police.update_sirens(Vec3::new(0.0, 3.0, -45.0)), Some(far));
        assert!(!police.cars.get(near).unwrap().siren_audible);
    }

    #[test]
    fn bomb_style_area_damage_hits_only_cars_in_range() {
        let mut police = PoliceSystem::new(quiet_config());
        let mut arbiter = CatchArbiter::new(CatchConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let inside = place(&mut police, 2.0, &mut rng);
        let outside = place(&mut police, 20.0, &mut rng);

        let center = Vec3::new(0.0, 0.5, 0.0);
        let events =
            police.damage_where(|p| p.distance(center) <= 5.0, 100.0, &mut arbiter);
        assert_eq!(events.len(), 1);
        assert!(police.cars.get(inside).is_none());
        assert!(police.cars.get(outside).is_some());
        assert_eq!(police.live_count(), 1);
    }
}
