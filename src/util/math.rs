//! Small numeric helpers shared by the simulation

use rand::Rng;

/// Sample `[min, max)` without panicking on an empty or inverted range.
pub fn safe_gen_range<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// Where `value` sits between `a` and `b`, clamped to 0..=1
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if (b - a).abs() < f32::EPSILON {
        return 0.0;
    }
    ((value - a) / (b - a)).clamp(0.0, 1.0)
}

/// Interpolate between two angles in degrees along the shortest arc
pub fn lerp_angle_degrees(a: f32, b: f32, t: f32) -> f32 {
    let mut delta = (b - a).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    a + delta * t.clamp(0.0, 1.0)
}

/// Frame-rate independent blend factor for exponential smoothing tuned at 60 Hz
pub fn smoothing_factor(smoothing: f32, dt: f32) -> f32 {
    1.0 - (1.0 - smoothing.clamp(0.0, 1.0)).powf(dt * 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn safe_gen_range_handles_degenerate_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(safe_gen_range(&mut rng, 35.0, 35.0), 35.0);
        assert_eq!(safe_gen_range(&mut rng, 10.0, 5.0), 10.0);

        let v = safe_gen_range(&mut rng, 20.0, 35.0);
        assert!((20.0..35.0).contains(&v));
    }

    #[test]
    fn lerp_angle_takes_shortest_arc() {
        let v = lerp_angle_degrees(350.0, 10.0, 0.5);
        assert!((v - 360.0).abs() < 1e-4);

        let v = lerp_angle_degrees(10.0, 350.0, 0.5);
        assert!(v.abs() < 1e-4);
    }

    #[test]
    fn inverse_lerp_clamps() {
        assert_eq!(inverse_lerp(0.0, 1023.0, -5.0), 0.0);
        assert_eq!(inverse_lerp(0.0, 1023.0, 2000.0), 1.0);
        assert!((inverse_lerp(0.0, 1023.0, 511.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn smoothing_factor_bounds() {
        assert_eq!(smoothing_factor(0.0, 1.0 / 60.0), 0.0);
        assert!((smoothing_factor(1.0, 1.0 / 60.0) - 1.0).abs() < 1e-6);
        assert!((smoothing_factor(0.2, 1.0 / 60.0) - 0.2).abs() < 1e-5);
    }
}
