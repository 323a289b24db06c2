//! Enemy records and the per-enemy steering used by the simulation tick.
//!
//! Each tick an enemy picks a heading (chase the nearest eligible player or
//! wander), turns toward it at a bounded rate, moves through the collider and
//! watches its own progress so it can recover from getting wedged.

use crate::collision::Collider;
use crate::geometry::map_bounds;
use crate::utils::shortest_angle;
use rand::Rng;
use shared::{EnemySnapshot, Vec3, ENEMY_MAX_HP, ENEMY_RADIUS, ENEMY_SPEED, ENEMY_TURN_RATE};
use std::f32::consts::TAU;

/// How long a chase heading stays valid before it is re-aimed.
pub const CHASE_REFRESH_MS: u64 = 300;
/// Wander headings last somewhere in this range.
pub const WANDER_MIN_MS: u64 = 1000;
pub const WANDER_MAX_MS: u64 = 3000;
/// Squared planar movement per tick below which the enemy counts as stuck
/// (about 2 cm).
pub const STUCK_MOVE_SQ: f32 = 0.0004;
/// Accumulated stuck time that triggers a recovery teleport.
pub const STUCK_LIMIT_MS: u64 = 1500;

/// Which steering rule produced this tick's heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiMode {
    Chase,
    Wander,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnemyAi {
    pub target_yaw: f32,
    pub change_at_ms: u64,
    pub stuck_ms: u64,
    pub last_x: f32,
    pub last_z: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    pub id: String,
    pub pos: Vec3,
    pub yaw: f32,
    pub hp: i32,
    pub map: u32,
    pub ai: EnemyAi,
}

impl Enemy {
    /// Fresh enemy at full health with a random facing and wander heading.
    pub fn spawn<R: Rng + ?Sized>(id: String, map: u32, x: f32, z: f32, now_ms: u64, rng: &mut R) -> Self {
        Self {
            id,
            pos: Vec3::new(x, 0.0, z),
            yaw: rng.gen::<f32>() * TAU,
            hp: ENEMY_MAX_HP,
            map,
            ai: EnemyAi {
                target_yaw: rng.gen::<f32>() * TAU,
                change_at_ms: now_ms + rng.gen_range(WANDER_MIN_MS..WANDER_MAX_MS),
                stuck_ms: 0,
                last_x: x,
                last_z: z,
            },
        }
    }

    /// Picks the desired heading. `target` is the position of the nearest
    /// eligible player, if any.
    pub fn choose_heading<R: Rng + ?Sized>(
        &mut self,
        target: Option<(f32, f32)>,
        now_ms: u64,
        rng: &mut R,
    ) -> AiMode {
        match target {
            Some((tx, tz)) => {
                self.ai.target_yaw = (tx - self.pos.x).atan2(tz - self.pos.z);
                self.ai.change_at_ms = now_ms + CHASE_REFRESH_MS;
                AiMode::Chase
            }
            None => {
                if now_ms >= self.ai.change_at_ms {
                    self.ai.target_yaw = rng.gen::<f32>() * TAU;
                    self.ai.change_at_ms = now_ms + rng.gen_range(WANDER_MIN_MS..WANDER_MAX_MS);
                }
                AiMode::Wander
            }
        }
    }

    /// Rotates toward the desired heading along the shorter arc, at most
    /// `ENEMY_TURN_RATE * dt` radians.
    pub fn turn(&mut self, dt: f32) {
        let delta = shortest_angle(self.ai.target_yaw - self.yaw);
        self.yaw += delta.signum() * delta.abs().min(ENEMY_TURN_RATE * dt);
    }

    /// Walks forward along the current heading through world collision, then
    /// clamps into the map.
    pub fn advance(&mut self, collider: &Collider, dt: f32) {
        let vx = self.yaw.sin() * ENEMY_SPEED * dt;
        let vz = self.yaw.cos() * ENEMY_SPEED * dt;
        let (x, z) = collider.move_with_collisions(self.pos.x, self.pos.z, vx, vz, ENEMY_RADIUS);
        let (x, z) = map_bounds(self.map).clamp(x, z);
        self.pos.x = x;
        self.pos.z = z;
    }

    /// Samples progress since the previous tick. Returns true once the enemy
    /// has barely moved for longer than [`STUCK_LIMIT_MS`].
    pub fn track_progress(&mut self, dt: f32) -> bool {
        let dx = self.pos.x - self.ai.last_x;
        let dz = self.pos.z - self.ai.last_z;
        if dx * dx + dz * dz > STUCK_MOVE_SQ {
            self.ai.stuck_ms = 0;
        } else {
            self.ai.stuck_ms += (dt * 1000.0) as u64;
        }
        self.ai.last_x = self.pos.x;
        self.ai.last_z = self.pos.z;
        self.ai.stuck_ms > STUCK_LIMIT_MS
    }

    /// Teleports to `(x, z)` and forces a new heading.
    pub fn unstick<R: Rng + ?Sized>(&mut self, x: f32, z: f32, now_ms: u64, rng: &mut R) {
        self.pos.x = x;
        self.pos.z = z;
        self.ai.target_yaw = rng.gen::<f32>() * TAU;
        self.ai.change_at_ms = now_ms + rng.gen_range(500..1000);
        self.ai.stuck_ms = 0;
    }

    pub fn snapshot(&self) -> EnemySnapshot {
        EnemySnapshot {
            id: self.id.clone(),
            pos: self.pos,
            yaw: self.yaw,
            hp: self.hp,
            map: self.map,
        }
    }
}
