//! World transforms, player-local frames and spawn volumes

use glam::{Quat, Vec3};
use rand::Rng;

use crate::util::math::safe_gen_range;

/// Position + orientation of an actor in world space (forward is +Z)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Local point -> world point
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    /// World point -> this transform's local frame (z = ahead, x = right)
    pub fn inverse_transform_point(&self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.position)
    }
}

/// Drop the vertical component
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Rotation about +Y whose forward points along `direction` (flattened)
pub fn look_rotation(direction: Vec3) -> Quat {
    let dir = flatten(direction);
    if dir.length_squared() <= f32::EPSILON {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_y(dir.x.atan2(dir.z))
}

/// Rectangular area vehicles spawn in, expressed in a parent transform
#[derive(Debug, Clone)]
pub struct SpawnVolume {
    pub transform: Transform,
    /// Box center in the parent's local space
    pub center: Vec3,
    /// Full box size in the parent's local space (only x/z are sampled)
    pub size: Vec3,
    /// Keep the volume at a fixed z offset from the player
    pub follow_z_offset: Option<f32>,
}

impl SpawnVolume {
    pub fn new(transform: Transform, center: Vec3, size: Vec3) -> Self {
        Self {
            transform,
            center,
            size,
            follow_z_offset: None,
        }
    }

    pub fn following(mut self, z_offset: f32) -> Self {
        self.follow_z_offset = Some(z_offset);
        self
    }

    /// Track the player along z; x/y stay where the volume was placed
    pub fn follow(&mut self, player_z: f32) {
        if let Some(offset) = self.follow_z_offset {
            self.transform.position.z = player_z + offset;
        }
    }

    /// Uniform random point on the volume's local X/Z rectangle, in world space
    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        let half_x = self.size.x * 0.5;
        let half_z = self.size.z * 0.5;
        let local = Vec3::new(
            safe_gen_range(rng, -half_x, half_x),
            0.0,
            safe_gen_range(rng, -half_z, half_z),
        );
        self.transform.transform_point(self.center + local)
    }
}
