//! Circle-versus-world collision queries and collision-safe movement.
//!
//! Bodies are circles in the XZ plane. Static obstacles are the wall
//! rectangles; enemies additionally treat the spawn obstacle and every safe
//! zone as solid.

use crate::geometry::MapBounds;
use rand::Rng;
use shared::Wall;
use std::f32::consts::TAU;

/// Contact slack: circles closer than `r + COLLISION_EPSILON` count as touching.
pub const COLLISION_EPSILON: f32 = 0.02;
/// Sub-steps per requested displacement in [`Collider::move_with_collisions`].
pub const MOVE_SUBSTEPS: u32 = 8;
/// Halvings tried on a blocked axis before giving up on it (1/2, 1/4, 1/8).
pub const BISECTION_STEPS: u32 = 3;
pub const CLEAR_SEARCH_ATTEMPTS: u32 = 80;
pub const CLEAR_SEARCH_MIN_DIST: f32 = 0.5;
pub const CLEAR_SEARCH_MAX_DIST: f32 = 3.5;
/// Minimum center distance to other enemies, in multiples of the radius.
pub const CLEAR_SEARCH_SEPARATION: f32 = 3.0;

/// Circle around a map's player spawn that enemies neither enter nor target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeZone {
    pub map: u32,
    pub x: f32,
    pub z: f32,
    pub r: f32,
}

impl SafeZone {
    fn contains(&self, x: f32, z: f32) -> bool {
        let (dx, dz) = (x - self.x, z - self.z);
        dx * dx + dz * dz <= self.r * self.r
    }

    fn overlaps(&self, x: f32, z: f32, r: f32) -> bool {
        let (dx, dz) = (x - self.x, z - self.z);
        let reach = self.r + r;
        dx * dx + dz * dz <= reach * reach
    }
}

/// The single movable circular obstacle left at the last enemy death site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnObstacle {
    pub x: f32,
    pub z: f32,
    pub r: f32,
}

/// Owns the world's obstacle set and answers overlap queries against it.
#[derive(Debug, Clone)]
pub struct Collider {
    walls: Vec<Wall>,
    safe_zones: Vec<SafeZone>,
    spawn_obstacle: SpawnObstacle,
}

impl Collider {
    pub fn new(walls: Vec<Wall>, safe_zones: Vec<SafeZone>, spawn_obstacle: SpawnObstacle) -> Self {
        Self {
            walls,
            safe_zones,
            spawn_obstacle,
        }
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn safe_zones(&self) -> &[SafeZone] {
        &self.safe_zones
    }

    pub fn spawn_obstacle(&self) -> SpawnObstacle {
        self.spawn_obstacle
    }

    pub fn move_spawn_obstacle(&mut self, x: f32, z: f32) {
        self.spawn_obstacle.x = x;
        self.spawn_obstacle.z = z;
    }

    pub fn collides_walls(&self, x: f32, z: f32, r: f32) -> bool {
        let reach = r + COLLISION_EPSILON;
        let reach_sq = reach * reach;
        self.walls.iter().any(|w| w.distance_sq(x, z) <= reach_sq)
    }

    pub fn collides_spawn_obstacle(&self, x: f32, z: f32, r: f32) -> bool {
        let (dx, dz) = (x - self.spawn_obstacle.x, z - self.spawn_obstacle.z);
        let reach = self.spawn_obstacle.r + r;
        dx * dx + dz * dz <= reach * reach
    }

    pub fn collides_safe_zones(&self, x: f32, z: f32, r: f32) -> bool {
        self.safe_zones.iter().any(|s| s.overlaps(x, z, r))
    }

    /// Walls, spawn obstacle and safe zones. This is the enemy movement test.
    pub fn collides_world(&self, x: f32, z: f32, r: f32) -> bool {
        self.collides_walls(x, z, r)
            || self.collides_spawn_obstacle(x, z, r)
            || self.collides_safe_zones(x, z, r)
    }

    /// Whether a point lies inside the safe zone of `map`.
    pub fn is_in_safe_zone(&self, map: u32, x: f32, z: f32) -> bool {
        self.safe_zones
            .iter()
            .any(|s| s.map == map && s.contains(x, z))
    }

    /// Integrates a displacement of `(vx, vz)` against [`Self::collides_world`].
    ///
    /// The displacement is split into [`MOVE_SUBSTEPS`] equal sub-steps so no
    /// sub-step is long enough to skip a thin wall. Each sub-step moves X then
    /// Z independently; a blocked axis tries 1/2, 1/4 and 1/8 of its step and
    /// otherwise stays put. Moving one axis while the other is blocked gives
    /// wall sliding. Corner contacts resolve to whichever axis clears first,
    /// which approximates, rather than reproduces, a true sliding vector.
    pub fn move_with_collisions(&self, x: f32, z: f32, vx: f32, vz: f32, r: f32) -> (f32, f32) {
        let (sx, sz) = (vx / MOVE_SUBSTEPS as f32, vz / MOVE_SUBSTEPS as f32);
        let (mut x, mut z) = (x, z);
        for _ in 0..MOVE_SUBSTEPS {
            x = advance_axis(x, sx, |tx| self.collides_world(tx, z, r));
            z = advance_axis(z, sz, |tz| self.collides_world(x, tz, r));
        }
        (x, z)
    }

    /// Samples up to [`CLEAR_SEARCH_ATTEMPTS`] points in an annulus around
    /// `(cx, cz)` and returns the first one that is inside `bounds`, clear of
    /// world geometry, and at least `3 r` from every position in `others`.
    /// Falls back to `(cx, cz)` when the budget runs out.
    pub fn find_clear_near<R: Rng + ?Sized>(
        &self,
        cx: f32,
        cz: f32,
        r: f32,
        bounds: &MapBounds,
        others: &[(f32, f32)],
        rng: &mut R,
    ) -> (f32, f32) {
        let min_sep = r * CLEAR_SEARCH_SEPARATION;
        let min_sep_sq = min_sep * min_sep;

        for _ in 0..CLEAR_SEARCH_ATTEMPTS {
            let angle = rng.gen::<f32>() * TAU;
            let dist = rng.gen_range(CLEAR_SEARCH_MIN_DIST..CLEAR_SEARCH_MAX_DIST);
            let x = cx + angle.cos() * dist;
            let z = cz + angle.sin() * dist;

            if !bounds.contains(x, z) || self.collides_world(x, z, r) {
                continue;
            }
            let crowded = others.iter().any(|&(ox, oz)| {
                let (dx, dz) = (x - ox, z - oz);
                dx * dx + dz * dz < min_sep_sq
            });
            if !crowded {
                return (x, z);
            }
        }
        (cx, cz)
    }
}

/// Moves one coordinate by `step`, bisecting toward `from` when blocked.
fn advance_axis(from: f32, step: f32, blocked: impl Fn(f32) -> bool) -> f32 {
    if step == 0.0 {
        return from;
    }
    if !blocked(from + step) {
        return from + step;
    }
    let mut fraction = 0.5;
    for _ in 0..BISECTION_STEPS {
        let candidate = from + step * fraction;
        if !blocked(candidate) {
            return candidate;
        }
        fraction *= 0.5;
    }
    from
}
