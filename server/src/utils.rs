use std::f32::consts::{PI, TAU};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// Calculate normalized planar vector
pub fn normalize_vector(x: f32, z: f32) -> (f32, f32) {
    let magnitude = (x * x + z * z).sqrt();
    if magnitude > 0.0 {
        (x / magnitude, z / magnitude)
    } else {
        (0.0, 0.0)
    }
}

// Wrap an angle difference into [-PI, PI] so turns take the short way round
pub fn shortest_angle(delta: f32) -> f32 {
    (delta + PI).rem_euclid(TAU) - PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_normalize_vector() {
        let (x, z) = normalize_vector(3.0, 4.0);
        assert_approx_eq!(x, 0.6, 1e-6);
        assert_approx_eq!(z, 0.8, 1e-6);
        assert_eq!(normalize_vector(0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn test_shortest_angle_wraps() {
        assert_approx_eq!(shortest_angle(0.5), 0.5, 1e-5);
        assert_approx_eq!(shortest_angle(TAU - 0.5), -0.5, 1e-5);
        assert_approx_eq!(shortest_angle(-TAU + 0.25), 0.25, 1e-5);
        assert_approx_eq!(shortest_angle(3.0 * PI + 0.1), -PI + 0.1, 1e-4);
    }

    #[test]
    fn test_timestamp_generation() {
        let timestamp1 = now_ms();
        std::thread::sleep(Duration::from_millis(2));
        let timestamp2 = now_ms();
        assert!(timestamp2 > timestamp1);
    }
}
