//! Gameplay constants, geometry primitives and the JSON wire protocol shared
//! between the authoritative server and any client.

pub mod lenient;
pub mod protocol;

pub use protocol::*;

use serde::{Deserialize, Serialize};

/// Simulation tick frequency (Hz).
pub const TICK_RATE: u32 = 30;
/// World snapshot broadcast frequency (Hz).
pub const BROADCAST_RATE: u32 = 10;

pub const PLAYER_RADIUS: f32 = 0.5;
pub const PLAYER_SPEED: f32 = 7.0;
pub const PLAYER_GRAVITY: f32 = 24.0;
pub const PLAYER_JUMP_SPEED: f32 = 7.5;
/// Extra planar speed while a dash window is open.
pub const PLAYER_DASH_SPEED: f32 = 18.0;
pub const PLAYER_DASH_DURATION_MS: u64 = 150;
pub const PLAYER_DASH_COOLDOWN_MS: u64 = 650;
pub const PLAYER_MAX_HP: i32 = 5;
pub const PLAYER_DEFAULT_COLOR: &str = "#4488ff";
pub const PLAYER_DEFAULT_FORM: &str = "classic";
pub const LEVEL_UP_XP: u32 = 100;
pub const KILL_XP: u32 = 10;

pub const ENEMY_RADIUS: f32 = 0.8;
pub const ENEMY_SPEED: f32 = 3.0;
pub const ENEMY_MAX_HP: i32 = 10;
/// Maximum enemy heading change in radians per second.
pub const ENEMY_TURN_RATE: f32 = 2.5;
pub const ENEMY_RESPAWN_DELAY_MS: u64 = 1000;
pub const ENEMIES_PER_MAP: u32 = 5;

pub const COIN_RADIUS: f32 = 0.35;
pub const COIN_VALUE_MIN: u32 = 1;
pub const COIN_VALUE_MAX: u32 = 3;

/// Half of the side length of every map square.
pub const WORLD_HALF_SIZE: f32 = 25.0;
/// The arena (map 1) is built this far along X so it never overlaps the maze.
pub const ARENA_OFFSET_X: f32 = 200.0;
pub const MAZE_COLS: u32 = 15;
pub const MAZE_ROWS: u32 = 15;
pub const MAZE_CELL: f32 = 3.0;
pub const WALL_THICKNESS: f32 = 0.4;

pub const MAP_COUNT: u32 = 10;
pub const SAFE_ZONE_RADIUS: f32 = 6.0;
pub const SPAWN_OBSTACLE_RADIUS: f32 = 1.2;

pub const MAX_NAME_LEN: usize = 20;
pub const MAX_ACCESSORIES: usize = 4;
pub const ACCESSORY_ALLOW_LIST: [&str; 4] =
    ["glasses_engineer", "glasses_chemist", "lab_coat", "armor"];
pub const FORM_ALLOW_LIST: [&str; 8] = [
    "classic",
    "futuristic",
    "technologic",
    "medieval",
    "cyberpunk",
    "cartoon",
    "steampunk",
    "slime",
];

/// A position in world space. Y is up; the ground plane is `y = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared distance in the XZ plane, ignoring height.
    pub fn planar_distance_sq(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }
}

/// Axis-aligned wall rectangle centered on `(x, z)` with extents `w` along X
/// and `h` along Z. Walls span the full height of the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub x: f32,
    pub z: f32,
    pub w: f32,
    pub h: f32,
}

impl Wall {
    pub fn new(x: f32, z: f32, w: f32, h: f32) -> Self {
        Self { x, z, w, h }
    }

    /// Squared distance from a point to the closest point of the rectangle.
    /// Zero when the point lies inside.
    pub fn distance_sq(&self, x: f32, z: f32) -> f32 {
        let dx = ((x - self.x).abs() - self.w / 2.0).max(0.0);
        let dz = ((z - self.z).abs() - self.h / 2.0).max(0.0);
        dx * dx + dz * dz
    }

    pub fn contains(&self, x: f32, z: f32) -> bool {
        (x - self.x).abs() <= self.w / 2.0 && (z - self.z).abs() <= self.h / 2.0
    }
}

/// Planar overlap test between two circles; touching counts as a hit.
pub fn circle_hit(a: &Vec3, a_radius: f32, b: &Vec3, b_radius: f32) -> bool {
    let reach = a_radius + b_radius;
    a.planar_distance_sq(b) <= reach * reach
}

/// Accepts exactly `#rrggbb` with hexadecimal digits of either case.
pub fn is_hex_color(color: &str) -> bool {
    let bytes = color.as_bytes();
    bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_planar_distance_ignores_height() {
        let a = Vec3::new(0.0, 10.0, 0.0);
        let b = Vec3::new(3.0, 0.0, 4.0);
        assert_approx_eq!(a.planar_distance_sq(&b), 25.0, 1e-5);
    }

    #[test]
    fn test_wall_distance_outside_and_inside() {
        let wall = Wall::new(0.0, 0.0, 2.0, 4.0);
        assert_eq!(wall.distance_sq(0.5, 0.5), 0.0);
        assert_approx_eq!(wall.distance_sq(3.0, 0.0), 4.0, 1e-5);
        // Corner region measures to the rectangle corner.
        assert_approx_eq!(wall.distance_sq(4.0, 6.0), 9.0 + 16.0, 1e-5);
    }

    #[test]
    fn test_wall_contains_edges() {
        let wall = Wall::new(1.0, 1.0, 2.0, 2.0);
        assert!(wall.contains(0.0, 0.0));
        assert!(wall.contains(2.0, 2.0));
        assert!(!wall.contains(2.1, 1.0));
    }

    #[test]
    fn test_circle_hit() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.25, 3.0, 0.0);
        assert!(circle_hit(&a, ENEMY_RADIUS, &b, PLAYER_RADIUS));
        let c = Vec3::new(1.0, 0.0, 0.9);
        assert!(!circle_hit(&a, ENEMY_RADIUS, &c, PLAYER_RADIUS));
    }

    #[test]
    fn test_hex_color_validation() {
        assert!(is_hex_color("#4488ff"));
        assert!(is_hex_color("#ABCDEF"));
        assert!(!is_hex_color("4488ff"));
        assert!(!is_hex_color("#4488f"));
        assert!(!is_hex_color("#4488fg"));
        assert!(!is_hex_color("#4488ff0"));
    }
}
