//! AI traffic: oncoming cars spawned ahead of the player and retired once behind

use glam::Vec3;
use rand::Rng;
use super::frame::{flatten, SpawnVolume, Transform};
use super::pool::{ActorId, ActorPool};
use super::spawner::{SpawnCoordinator, SpawnPlacement, SpawnerConfig, Vehicle, VehiclePrefab};
use crate::util::math::safe_gen_range;

#[derive(Debug, Clone)]
pub struct TrafficConfig {
    pub spawner: SpawnerConfig,
    pub prefab: Option<VehiclePrefab>,
    pub volume: Option<SpawnVolume>,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Player-local distance behind the player at which a car is retired
    pub despawn_distance_behind: f32,
    /// Grace period after spawning before the despawn check runs
    pub despawn_check_delay: f32,
    /// Flat distance at which a car counts as hitting the player
    pub collision_radius: f32,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            spawner: SpawnerConfig {
                spawn_interval: 2.0,
                max_count: 10,
                spawn_height: 0.5,
            },
            prefab: Some(VehiclePrefab::new("sedan")),
            volume: Some(
                SpawnVolume::new(
                    Transform::from_position(Vec3::new(0.0, 0.0, 150.0)),
                    Vec3::ZERO,
                    Vec3::new(10.0, 2.0, 30.0),
                )
                .following(150.0),
            ),
            min_speed: 20.0,
            max_speed: 35.0,
            despawn_distance_behind: 20.0,
            despawn_check_delay: 0.25,
            collision_radius: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrafficEvent {
    Spawned(ActorId),
    Despawned(ActorId),
    /// Car drove into the player and exploded
    Collided { car: ActorId, position: Vec3 },
}

pub struct TrafficSystem {
    config: TrafficConfig,
    coordinator: SpawnCoordinator,
    cars: ActorPool<Vehicle>,
}

impl TrafficSystem {
    pub fn new(config: TrafficConfig) -> Self {
        let coordinator = SpawnCoordinator::new(
            "traffic",
            config.spawner.clone(),
            config.prefab.clone(),
            config.volume.clone(),
        );
        Self {
            cars: ActorPool::with_capacity(config.spawner.max_count),
            coordinator,
            config,
        }
    }

    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        player: &Transform,
        rng: &mut R,
    ) -> Vec<TrafficEvent> {
        let mut events = Vec::new();

        self.coordinator.follow_player(player.position.z);
        if let Some(placement) = self.coordinator.tick(dt, player, rng) {
            if let Some(id) = self.spawn(placement, rng) {
                events.push(TrafficEvent::Spawned(id));
            }
        }

        let radius_sq = self.config.collision_radius * self.config.collision_radius;
        let mut collided = Vec::new();
        let mut behind = Vec::new();
        for (id, car) in self.cars.iter_mut() {
            car.drive(dt);

            let offset = flatten(car.transform.position - player.position);
            if offset.length_squared() <= radius_sq {
                collided.push((id, car.transform.position));
                continue;
            }

            if car.life_timer >= self.config.despawn_check_delay {
                let local = player.inverse_transform_point(car.transform.position);
                if local.z < -self.config.despawn_distance_behind {
                    behind.push(id);
                }
            }
        }

        for (car, position) in collided {
            if self.despawn(car) {
                events.push(TrafficEvent::Collided { car, position });
            }
        }
        for car in behind {
            if self.despawn(car) {
                events.push(TrafficEvent::Despawned(car));
            }
        }

        events
    }

    fn spawn<R: Rng + ?Sized>(&mut self, placement: SpawnPlacement, rng: &mut R) -> Option<ActorId> {
        let speed = safe_gen_range(rng, self.config.min_speed, self.config.max_speed);
        self.coordinator
            .place(&mut self.cars, Vehicle::at(placement, speed))
    }

    /// Retire a car; stale ids are ignored
    pub fn despawn(&mut self, car: ActorId) -> bool {
        self.coordinator.retire(&mut self.cars, car).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.coordinator.live_count()
    }

    #[cfg(test)]
    fn cars(&self) -> impl Iterator<Item = (ActorId, &Vehicle)> {
        self.cars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const DT: f32 = 1.0 / 30.0;

    #[test]
    fn spawned_cars_head_toward_the_player() {
        let mut traffic = TrafficSystem::new(TrafficConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let player = Transform::from_position(Vec3::new(0.0, 0.5, 0.0));

        let mut spawned = 0;
        for _ in 0..61 {
            spawned += traffic
                .tick(DT, &player, &mut rng)
                .iter()
                .filter(|e| matches!(e, TrafficEvent::Spawned(_)))
                .count();
        }
        assert_eq!(spawned, 1);

        let (_, car) = traffic.cars().next().unwrap();
        assert!((20.0..35.0).contains(&car.speed));
        assert!(car.transform.forward().z < 0.0);
    }

    #[test]
    fn live_count_respects_cap_and_matches_pool() {
        let config = TrafficConfig {
            spawner: SpawnerConfig {
                spawn_interval: 0.0,
                max_count: 3,
                spawn_height: 0.5,
            },
            ..TrafficConfig::default()
        };
        let mut traffic = TrafficSystem::new(config);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let player = Transform::from_position(Vec3::new(0.0, 0.5, 0.0));

        for _ in 0..20 {
            traffic.tick(DT, &player, &mut rng);
            assert!(traffic.live_count() <= 3);
            assert_eq!(traffic.live_count(), traffic.cars().count());
        }
    }

    #[test]
    fn cars_behind_the_player_are_retired_once() {
        let mut traffic = TrafficSystem::new(TrafficConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let player = Transform::from_position(Vec3::new(0.0, 0.5, 0.0));

        let id = traffic
            .spawn(
                SpawnPlacement {
                    position: Vec3::new(3.0, 0.5, -60.0),
                    rotation: glam::Quat::IDENTITY,
                },
                &mut rng,
            )
            .unwrap();

        // Still inside the grace period
        let events = traffic.tick(0.1, &player, &mut rng);
        assert!(!events.contains(&TrafficEvent::Despawned(id)));

        let events = traffic.tick(0.2, &player, &mut rng);
        assert!(events.contains(&TrafficEvent::Despawned(id)));
        assert_eq!(traffic.live_count(), 0);

        // A second notification for the same car changes nothing
        assert!(!traffic.despawn(id));
        assert_eq!(traffic.live_count(), 0);
    }

    #[test]
    fn collision_with_player_explodes_the_car() {
        let mut traffic = TrafficSystem::new(TrafficConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let player = Transform::from_position(Vec3::new(0.0, 0.5, 0.0));

        let id = traffic
            .spawn(
                SpawnPlacement {
                    position: Vec3::new(0.5, 0.5, 0.5),
                    rotation: glam::Quat::IDENTITY,
                },
                &mut rng,
            )
            .unwrap();
        // Zero-speed step keeps it on top of the player
        let events = traffic.tick(0.0, &player, &mut rng);
        assert!(matches!(events.as_slice(), [TrafficEvent::Collided { car, .. }] if *car == id));
        assert_eq!(traffic.live_count(), 0);
    }
}
