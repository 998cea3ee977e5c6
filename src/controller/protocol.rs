//! Arduino controller wire format and input state
//!
//! Each datagram is one ASCII line `pot,button1,button2`:
//! - `pot` is the raw steering potentiometer reading, 0..=1023
//! - buttons are active-low: 0 = pressed, anything else = released

use serde::Serialize;

use crate::util::math::{inverse_lerp, lerp, lerp_angle_degrees, smoothing_factor};

/// Highest raw potentiometer reading
pub const POT_MAX: i32 = 1023;

/// One decoded controller datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerFrame {
    pub pot: i32,
    pub button1_released: bool,
    pub button2_released: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("expected 3 comma-separated fields, got {0}")]
    FieldCount(usize),

    #[error("field {index} is not an integer: {value:?}")]
    NotAnInteger { index: usize, value: String },
}

/// Decode one trimmed line; extra trailing fields are ignored
pub fn parse_line(line: &str) -> Result<ControllerFrame, ProtocolError> {
    let parts: Vec<&str> = line.trim().split(',').collect();
    if parts.len() < 3 {
        return Err(ProtocolError::FieldCount(parts.len()));
    }

    let field = |index: usize| -> Result<i32, ProtocolError> {
        let raw = parts[index].trim();
        raw.parse().map_err(|_| ProtocolError::NotAnInteger {
            index,
            value: raw.to_string(),
        })
    };

    Ok(ControllerFrame {
        pot: field(0)?,
        button1_released: field(1)? != 0,
        button2_released: field(2)? != 0,
    })
}

/// Press edges produced by a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerEvent {
    Button1Pressed,
    Button2Pressed,
}

/// Latest controller readings plus button edge tracking
#[derive(Debug, Clone)]
pub struct ControllerState {
    /// -2 (pot at 1023) .. +2 (pot at 0)
    steering_axis: f32,
    last_b1_released: bool,
    last_b2_released: bool,
    frames: u64,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            steering_axis: 0.0,
            last_b1_released: true,
            last_b2_released: true,
            frames: 0,
        }
    }
}

impl ControllerState {
    /// Fold a frame in; returns released -> pressed transitions
    pub fn apply(&mut self, frame: ControllerFrame) -> Vec<ControllerEvent> {
        self.steering_axis = lerp(2.0, -2.0, inverse_lerp(0.0, POT_MAX as f32, frame.pot as f32));

        let mut events = Vec::new();
        if self.last_b1_released && !frame.button1_released {
            events.push(ControllerEvent::Button1Pressed);
        }
        if self.last_b2_released && !frame.button2_released {
            events.push(ControllerEvent::Button2Pressed);
        }

        self.last_b1_released = frame.button1_released;
        self.last_b2_released = frame.button2_released;
        self.frames += 1;

        events
    }

    pub fn steering_axis(&self) -> f32 {
        self.steering_axis
    }

    /// Steering mapped onto the car's -1..1 input range
    pub fn steer_input(&self) -> f32 {
        (self.steering_axis * 0.5).clamp(-1.0, 1.0)
    }

    #[cfg(test)]
    pub fn button1_held(&self) -> bool {
        !self.last_b1_released
    }

    #[cfg(test)]
    pub fn button2_held(&self) -> bool {
        !self.last_b2_released
    }

    /// Frames applied since the session started
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[derive(Debug, Clone)]
pub struct AimConfig {
    /// Yaw at full steering deflection
    pub max_yaw_degrees: f32,
    pub invert_yaw: bool,
    /// 0 = frozen, 1 = snap to target (per 60 Hz frame)
    pub yaw_smoothing: f32,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            max_yaw_degrees: 90.0,
            invert_yaw: false,
            yaw_smoothing: 0.2,
        }
    }
}

/// Smoothed aim yaw driven by the steering axis
#[derive(Debug, Clone)]
pub struct AimState {
    config: AimConfig,
    current_yaw: f32,
}

impl AimState {
    pub fn new(config: AimConfig) -> Self {
        Self {
            config,
            current_yaw: 0.0,
        }
    }

    pub fn update(&mut self, steering_axis: f32, dt: f32) -> f32 {
        let sign = if self.config.invert_yaw { -1.0 } else { 1.0 };
        let target = steering_axis * self.config.max_yaw_degrees * sign;
        let t = smoothing_factor(self.config.yaw_smoothing, dt);
        self.current_yaw = lerp_angle_degrees(self.current_yaw, target, t);
        self.current_yaw
    }

    pub fn current_yaw(&self) -> f32 {
        self.current_yaw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_frame() {
        let frame = parse_line(" 512,1,0\r\n").unwrap();
        assert_eq!(
            frame,
            ControllerFrame {
                pot: 512,
                button1_released: true,
                button2_released: false,
            }
        );
    }

    #[test]
    fn ignores_extra_fields() {
        assert!(parse_line("0,1,1,99").is_ok());
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_line("abc"), Err(ProtocolError::FieldCount(1)));
        assert_eq!(parse_line("1,2"), Err(ProtocolError::FieldCount(2)));
        assert!(matches!(
            parse_line("12,x,1"),
            Err(ProtocolError::NotAnInteger { index: 1, .. })
        ));
    }

    #[test]
    fn pot_maps_onto_steering_axis() {
        let mut state = ControllerState::default();
        state.apply(parse_line("0,1,1").unwrap());
        assert_eq!(state.steering_axis(), 2.0);
        assert_eq!(state.steer_input(), 1.0);

        state.apply(parse_line("1023,1,1").unwrap());
        assert_eq!(state.steering_axis(), -2.0);

        state.apply(parse_line("2000,1,1").unwrap());
        assert_eq!(state.steering_axis(), -2.0);
    }

    #[test]
    fn press_fires_once_per_edge() {
        let mut state = ControllerState::default();
        assert_eq!(
            state.apply(parse_line("512,0,1").unwrap()),
            vec![ControllerEvent::Button1Pressed]
        );
        assert!(state.button1_held());

        // Still held: no new edge
        assert_eq!(
            state.apply(parse_line("512,0,0").unwrap()),
            vec![ControllerEvent::Button2Pressed]
        );
        assert!(state.apply(parse_line("512,0,0").unwrap()).is_empty());
        assert!(state.button2_held());

        state.apply(parse_line("512,1,1").unwrap());
        assert!(!state.button1_held());
        assert_eq!(
            state.apply(parse_line("512,0,1").unwrap()),
            vec![ControllerEvent::Button1Pressed]
        );
    }

    #[test]
    fn aim_eases_toward_target() {
        let mut aim = AimState::new(AimConfig::default());
        let first = aim.update(1.0, 1.0 / 60.0);
        assert!((first - 18.0).abs() < 0.01);

        for _ in 0..600 {
            aim.update(1.0, 1.0 / 60.0);
        }
        assert!((aim.current_yaw() - 90.0).abs() < 0.01);
    }

    #[test]
    fn inverted_aim_turns_the_other_way() {
        let mut aim = AimState::new(AimConfig {
            invert_yaw: true,
            yaw_smoothing: 1.0,
            ..AimConfig::default()
        });
        assert!((aim.update(0.5, 1.0 / 60.0) + 45.0).abs() < 0.01);
    }
}
