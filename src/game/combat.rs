//! Combat system - damage capability, crosshair shots and timed bombs

use glam::{Quat, Vec3};
use tracing::debug;

use super::frame::Transform;

/// Anything the player's weapons can hurt
pub trait Damageable {
    /// Apply damage; returns true when this hit destroyed the target
    fn take_damage(&mut self, amount: f32) -> bool;
}

/// Apply damage to health, returns (new_health, is_dead)
pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
    let new_health = (current_health - damage).max(0.0);
    (new_health, new_health <= 0.0)
}

#[derive(Debug, Clone)]
pub struct CombatConfig {
    /// Damage per crosshair shot (button 1)
    pub shot_damage: f32,
    /// Crosshair box center in the aim frame
    pub crosshair_offset: Vec3,
    pub crosshair_half_extents: Vec3,
    /// Seconds from drop to detonation (button 2)
    pub bomb_delay: f32,
    pub bomb_radius: f32,
    pub bomb_damage: f32,
    /// Seconds before another bomb can be dropped
    pub bomb_cooldown: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            shot_damage: 10.0,
            crosshair_offset: Vec3::new(0.0, 0.5, 14.0),
            crosshair_half_extents: Vec3::new(2.5, 2.0, 8.0),
            bomb_delay: 2.0,
            bomb_radius: 5.0,
            bomb_damage: 100.0,
            bomb_cooldown: 5.0,
        }
    }
}

/// Oriented box the crosshair shot hits
#[derive(Debug, Clone, Copy)]
pub struct Crosshair {
    pub center: Vec3,
    pub rotation: Quat,
    pub half_extents: Vec3,
}

impl Crosshair {
    pub fn contains(&self, point: Vec3) -> bool {
        let local = self.rotation.inverse() * (point - self.center);
        local.x.abs() <= self.half_extents.x
            && local.y.abs() <= self.half_extents.y
            && local.z.abs() <= self.half_extents.z
    }
}

#[derive(Debug, Clone, Copy)]
struct Bomb {
    position: Vec3,
    fuse: f32,
}

/// Where a bomb went off, for damage and the HUD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detonation {
    pub position: Vec3,
    pub radius: f32,
    pub damage: f32,
}

pub struct CombatSystem {
    config: CombatConfig,
    bombs: Vec<Bomb>,
    bomb_cooldown: f32,
}

impl CombatSystem {
    pub fn new(config: CombatConfig) -> Self {
        Self {
            config,
            bombs: Vec::new(),
            bomb_cooldown: 0.0,
        }
    }

    /// Crosshair box for the player's transform rotated by the aim yaw
    pub fn crosshair(&self, player: &Transform, aim_yaw_degrees: f32) -> Crosshair {
        let rotation = player.rotation * Quat::from_rotation_y(aim_yaw_degrees.to_radians());
        Crosshair {
            center: player.position + rotation * self.config.crosshair_offset,
            rotation,
            half_extents: self.config.crosshair_half_extents,
        }
    }

    pub fn shot_damage(&self) -> f32 {
        self.config.shot_damage
    }

    /// Arm a bomb at `position`; false while the cooldown is running
    pub fn drop_bomb(&mut self, position: Vec3) -> bool {
        if self.bomb_cooldown > 0.0 {
            return false;
        }
        self.bombs.push(Bomb {
            position,
            fuse: self.config.bomb_delay,
        });
        self.bomb_cooldown = self.config.bomb_cooldown;
        debug!(x = position.x, z = position.z, "Bomb dropped");
        true
    }

    /// Run cooldown and fuses; returns bombs that detonated this tick
    pub fn tick(&mut self, dt: f32) -> Vec<Detonation> {
        if self.bomb_cooldown > 0.0 {
            self.bomb_cooldown = (self.bomb_cooldown - dt).max(0.0);
        }

        let mut detonations = Vec::new();
        self.bombs.retain_mut(|bomb| {
            bomb.fuse -= dt;
            if bomb.fuse > 0.0 {
                return true;
            }
            detonations.push(Detonation {
                position: bomb.position,
                radius: self.config.bomb_radius,
                damage: self.config.bomb_damage,
            });
            false
        });
        detonations
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.bomb_cooldown
    }

    pub fn armed_bombs(&self) -> usize {
        self.bombs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_damage_clamps_at_zero() {
        assert_eq!(apply_damage(100.0, 10.0), (90.0, false));
        assert_eq!(apply_damage(5.0, 10.0), (0.0, true));
    }

    #[test]
    fn crosshair_follows_aim_yaw() {
        let combat = CombatSystem::new(CombatConfig::default());
        let player = Transform::from_position(Vec3::new(0.0, 0.5, 0.0));

        let straight = combat.crosshair(&player, 0.0);
        assert!(straight.contains(Vec3::new(0.0, 1.0, 14.0)));
        assert!(!straight.contains(Vec3::new(14.0, 1.0, 0.0)));

        // 90 degrees of yaw swings the box onto the +X side
        let right = combat.crosshair(&player, 90.0);
        assert!(right.contains(Vec3::new(14.0, 1.0, 0.0)));
        assert!(!right.contains(Vec3::new(0.0, 1.0, 14.0)));
    }

    #[test]
    fn bomb_detonates_after_delay_and_respects_cooldown() {
        let mut combat = CombatSystem::new(CombatConfig::default());
        assert!(combat.drop_bomb(Vec3::new(0.0, 0.0, 5.0)));
        assert!(!combat.drop_bomb(Vec3::ZERO));

        assert!(combat.tick(1.0).is_empty());
        let detonations = combat.tick(1.0);
        assert_eq!(detonations.len(), 1);
        assert_eq!(detonations[0].position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(detonations[0].damage, 100.0);
        assert_eq!(combat.armed_bombs(), 0);

        // 2s of the 5s cooldown used so far
        assert!(!combat.drop_bomb(Vec3::ZERO));
        combat.tick(3.0);
        assert_eq!(combat.cooldown_remaining(), 0.0);
        assert!(combat.drop_bomb(Vec3::ZERO));
    }
}
