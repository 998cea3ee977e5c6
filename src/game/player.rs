//! Player car movement and road boundaries

use glam::{Vec2, Vec3};

use super::frame::Transform;

/// Player car handling constants
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Forward force per unit of throttle
    pub accel_multiplier: f32,
    /// Braking force per unit of reverse throttle
    pub brake_multiplier: f32,
    /// Lateral force per unit of steer
    pub steer_multiplier: f32,
    /// Linear damping while coasting
    pub idle_damping: f32,
    /// Lateral distance from the road center where the walls sit
    pub road_half_width: f32,
    pub start_position: Vec3,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            accel_multiplier: 3.0,
            brake_multiplier: 10.0,
            steer_multiplier: 5.0,
            idle_damping: 0.2,
            road_half_width: 6.0,
            start_position: Vec3::new(0.0, 0.5, 0.0),
        }
    }
}

/// Kinematic stand-in for the player's rigid body (unit mass)
#[derive(Debug, Clone)]
pub struct PlayerCar {
    config: PlayerConfig,
    pub transform: Transform,
    pub velocity: Vec3,
    damping: f32,
    /// x = steer, y = throttle
    input: Vec2,
    start_z: f32,
    distance_travelled: f32,
}

impl PlayerCar {
    pub fn new(config: PlayerConfig) -> Self {
        let start = config.start_position;
        Self {
            transform: Transform::from_position(start),
            velocity: Vec3::ZERO,
            damping: config.idle_damping,
            input: Vec2::ZERO,
            start_z: start.z,
            distance_travelled: 0.0,
            config,
        }
    }

    /// Latest drive input; anything longer than unit length is normalised
    pub fn set_input(&mut self, steer: f32, throttle: f32) {
        let input = Vec2::new(steer, throttle);
        self.input = if input.length_squared() > 1.0 {
            input.normalize()
        } else {
            input
        };
    }

    pub fn input(&self) -> Vec2 {
        self.input
    }

    /// Integrate one fixed step
    pub fn step(&mut self, dt: f32) {
        let forward = self.transform.forward();
        let right = self.transform.right();
        let mut force = Vec3::ZERO;

        if self.input.y > 0.0 {
            self.damping = 0.0;
            force += forward * self.config.accel_multiplier * self.input.y;
        } else {
            self.damping = self.config.idle_damping;
        }

        // Brakes only bite while rolling forward
        if self.input.y < 0.0 && self.forward_speed() > 0.0 {
            force += forward * self.config.brake_multiplier * self.input.y;
        }

        if self.input.x.abs() > 0.0 {
            force += right * self.config.steer_multiplier * self.input.x;
        }

        self.velocity += force * dt;
        self.velocity *= 1.0 / (1.0 + self.damping * dt);
        self.transform.position += self.velocity * dt;

        let progress = self.transform.position.z - self.start_z;
        if progress > self.distance_travelled {
            self.distance_travelled = progress;
        }
    }

    pub fn forward_speed(&self) -> f32 {
        self.velocity.dot(self.transform.forward())
    }

    pub fn distance_travelled(&self) -> f32 {
        self.distance_travelled
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Outside the walls on either side of the road
    pub fn hits_wall(&self) -> bool {
        self.transform.position.x.abs() > self.config.road_half_width
    }
}
