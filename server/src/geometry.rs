//! Static world geometry: the maze, the open arena, the spawn safe house and
//! the per-map bounds and spawn points.
//!
//! Map 1 is the arena, built [`ARENA_OFFSET_X`] metres along X. Maps 2 and up
//! all share the maze built at the origin.

use rand::Rng;
use shared::{Wall, ARENA_OFFSET_X, MAZE_CELL, MAZE_COLS, MAZE_ROWS, WALL_THICKNESS, WORLD_HALF_SIZE};

/// Half side length of the spawn safe house.
pub const SAFE_HOUSE_HALF: f32 = 4.5;
/// Half width of the door gap in the safe house's south wall.
pub const SAFE_HOUSE_DOOR_HALF: f32 = 2.0;

/// Cell grid used by the recursive-division maze.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MazeLayout {
    pub cols: u32,
    pub rows: u32,
    pub cell: f32,
    pub wall_thickness: f32,
}

impl Default for MazeLayout {
    fn default() -> Self {
        Self {
            cols: MAZE_COLS,
            rows: MAZE_ROWS,
            cell: MAZE_CELL,
            wall_thickness: WALL_THICKNESS,
        }
    }
}

impl MazeLayout {
    /// World coordinates of the grid's minimum corner; the grid is centered
    /// on the origin.
    pub fn origin(&self) -> (f32, f32) {
        (
            -(self.cols as f32) * self.cell / 2.0,
            -(self.rows as f32) * self.cell / 2.0,
        )
    }

    pub fn cell_center(&self, col: u32, row: u32) -> (f32, f32) {
        let (start_x, start_z) = self.origin();
        (
            start_x + (col as f32 + 0.5) * self.cell,
            start_z + (row as f32 + 0.5) * self.cell,
        )
    }
}

/// Rectangular region a map's entities are clamped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl MapBounds {
    pub fn clamp(&self, x: f32, z: f32) -> (f32, f32) {
        (x.clamp(self.min_x, self.max_x), z.clamp(self.min_z, self.max_z))
    }

    pub fn contains(&self, x: f32, z: f32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_z..=self.max_z).contains(&z)
    }
}

fn map_offset_x(map: u32) -> f32 {
    if map == 1 {
        ARENA_OFFSET_X
    } else {
        0.0
    }
}

/// X depends on the map, Z is shared by all maps.
pub fn map_bounds(map: u32) -> MapBounds {
    let offset = map_offset_x(map);
    MapBounds {
        min_x: offset - WORLD_HALF_SIZE,
        max_x: offset + WORLD_HALF_SIZE,
        min_z: -WORLD_HALF_SIZE,
        max_z: WORLD_HALF_SIZE,
    }
}

/// Player spawn point: two metres in from the map's minimum corner.
pub fn map_spawn(map: u32) -> (f32, f32) {
    (
        -WORLD_HALF_SIZE + 2.0 + map_offset_x(map),
        -WORLD_HALF_SIZE + 2.0,
    )
}

/// Four thin walls along the edges of a square of half size `half` centered
/// on `(offset_x, 0)`.
fn push_perimeter(walls: &mut Vec<Wall>, offset_x: f32, half: f32, thickness: f32) {
    walls.push(Wall::new(offset_x, -half, half * 2.0, thickness));
    walls.push(Wall::new(offset_x, half, half * 2.0, thickness));
    walls.push(Wall::new(offset_x - half, 0.0, thickness, half * 2.0));
    walls.push(Wall::new(offset_x + half, 0.0, thickness, half * 2.0));
}

/// Open arena: perimeter only, no interior obstacles.
pub fn build_arena(walls: &mut Vec<Wall>, offset_x: f32) {
    push_perimeter(walls, offset_x, WORLD_HALF_SIZE, WALL_THICKNESS);
}

/// Maze perimeter plus a recursive-division maze over `layout`'s grid.
pub fn build_maze<R: Rng + ?Sized>(walls: &mut Vec<Wall>, layout: &MazeLayout, rng: &mut R) {
    push_perimeter(walls, 0.0, WORLD_HALF_SIZE, layout.wall_thickness);
    divide(walls, layout, rng, 0, 0, layout.cols, layout.rows);
}

/// Splits the cell rectangle `[x0, x1) x [y0, y1)` across its longer axis at
/// the midpoint line, leaving one gap cell chosen uniformly along the wall,
/// then recurses into both sides. Stops when either side is under 2 cells.
fn divide<R: Rng + ?Sized>(
    walls: &mut Vec<Wall>,
    layout: &MazeLayout,
    rng: &mut R,
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
) {
    let (w, h) = (x1 - x0, y1 - y0);
    if w < 2 || h < 2 {
        return;
    }

    let (start_x, start_z) = layout.origin();
    let cell = layout.cell;

    if w > h {
        let x = (x0 + x1) / 2;
        let gap = rng.gen_range(y0..y1);
        for y in (y0..y1).filter(|&y| y != gap) {
            walls.push(Wall::new(
                start_x + x as f32 * cell,
                start_z + (y as f32 + 0.5) * cell,
                layout.wall_thickness,
                cell,
            ));
        }
        divide(walls, layout, rng, x0, y0, x, y1);
        divide(walls, layout, rng, x + 1, y0, x1, y1);
    } else {
        let y = (y0 + y1) / 2;
        let gap = rng.gen_range(x0..x1);
        for x in (x0..x1).filter(|&x| x != gap) {
            walls.push(Wall::new(
                start_x + (x as f32 + 0.5) * cell,
                start_z + y as f32 * cell,
                cell,
                layout.wall_thickness,
            ));
        }
        divide(walls, layout, rng, x0, y0, x1, y);
        divide(walls, layout, rng, x0, y + 1, x1, y1);
    }
}

/// Square enclosure around `(cx, cz)` with a door centered in the south (+Z)
/// wall.
pub fn build_safe_house(walls: &mut Vec<Wall>, cx: f32, cz: f32) {
    let a = SAFE_HOUSE_HALF;
    let door = SAFE_HOUSE_DOOR_HALF;
    let t = WALL_THICKNESS;
    let segment = a - door;

    walls.push(Wall::new(cx, cz - a, 2.0 * a, t));
    walls.push(Wall::new(cx - a, cz, t, 2.0 * a));
    walls.push(Wall::new(cx + a, cz, t, 2.0 * a));
    // South wall split around the door.
    walls.push(Wall::new(cx - door - segment / 2.0, cz + a, segment, t));
    walls.push(Wall::new(cx + door + segment / 2.0, cz + a, segment, t));
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;

    /// True when the edge between two orthogonally adjacent cells is covered
    /// by a wall. The midpoint of the shared edge is exactly where a maze
    /// wall segment would be centered.
    fn edge_blocked(walls: &[Wall], layout: &MazeLayout, a: (u32, u32), b: (u32, u32)) -> bool {
        let (ax, az) = layout.cell_center(a.0, a.1);
        let (bx, bz) = layout.cell_center(b.0, b.1);
        let (mx, mz) = ((ax + bx) / 2.0, (az + bz) / 2.0);
        walls.iter().any(|w| w.contains(mx, mz))
    }

    fn reachable_cells(walls: &[Wall], layout: &MazeLayout) -> usize {
        let mut seen = vec![vec![false; layout.rows as usize]; layout.cols as usize];
        let mut queue = VecDeque::from([(0u32, 0u32)]);
        seen[0][0] = true;
        let mut count = 0;

        while let Some((c, r)) = queue.pop_front() {
            count += 1;
            let mut neighbours = Vec::new();
            if c > 0 {
                neighbours.push((c - 1, r));
            }
            if r > 0 {
                neighbours.push((c, r - 1));
            }
            if c + 1 < layout.cols {
                neighbours.push((c + 1, r));
            }
            if r + 1 < layout.rows {
                neighbours.push((c, r + 1));
            }
            for n in neighbours {
                if !seen[n.0 as usize][n.1 as usize] && !edge_blocked(walls, layout, (c, r), n) {
                    seen[n.0 as usize][n.1 as usize] = true;
                    queue.push_back(n);
                }
            }
        }
        count
    }

    #[test]
    fn test_maze_is_fully_connected() {
        for seed in 0..20 {
            let layout = MazeLayout::default();
            let mut rng = StdRng::seed_from_u64(seed);
            let mut walls = Vec::new();
            build_maze(&mut walls, &layout, &mut rng);

            assert_eq!(
                reachable_cells(&walls, &layout),
                (layout.cols * layout.rows) as usize,
                "maze with seed {} has an isolated region",
                seed
            );
        }
    }

    #[test]
    fn test_maze_connectivity_non_square() {
        let layout = MazeLayout {
            cols: 9,
            rows: 4,
            ..MazeLayout::default()
        };
        let mut rng = StdRng::seed_from_u64(99);
        let mut walls = Vec::new();
        build_maze(&mut walls, &layout, &mut rng);

        assert_eq!(reachable_cells(&walls, &layout), 36);
    }

    #[test]
    fn test_maze_is_reproducible_with_seed() {
        let layout = MazeLayout::default();
        let mut a = Vec::new();
        let mut b = Vec::new();
        build_maze(&mut a, &layout, &mut StdRng::seed_from_u64(5));
        build_maze(&mut b, &layout, &mut StdRng::seed_from_u64(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_maze_has_interior_walls() {
        let layout = MazeLayout::default();
        let mut walls = Vec::new();
        build_maze(&mut walls, &layout, &mut StdRng::seed_from_u64(1));

        // Four perimeter walls plus at least the first full split minus its gap.
        assert!(walls.len() > 4 + (layout.rows as usize - 1));
        for wall in &walls[4..] {
            assert!(wall.x.abs() <= 22.5 + 1e-3 && wall.z.abs() <= 22.5 + 1e-3);
        }
    }

    #[test]
    fn test_tiny_maze_has_no_interior() {
        let layout = MazeLayout {
            cols: 1,
            rows: 8,
            ..MazeLayout::default()
        };
        let mut walls = Vec::new();
        build_maze(&mut walls, &layout, &mut StdRng::seed_from_u64(3));
        assert_eq!(walls.len(), 4);
    }

    #[test]
    fn test_arena_perimeter_offset() {
        let mut walls = Vec::new();
        build_arena(&mut walls, ARENA_OFFSET_X);

        assert_eq!(walls.len(), 4);
        assert_approx_eq!(walls[2].x, ARENA_OFFSET_X - WORLD_HALF_SIZE, 1e-4);
        assert_approx_eq!(walls[3].x, ARENA_OFFSET_X + WORLD_HALF_SIZE, 1e-4);
        assert_approx_eq!(walls[0].w, WORLD_HALF_SIZE * 2.0, 1e-4);
    }

    #[test]
    fn test_safe_house_has_south_door() {
        let mut walls = Vec::new();
        build_safe_house(&mut walls, 0.0, 0.0);

        assert_eq!(walls.len(), 5);
        // Door gap at the south wall's center.
        assert!(!walls.iter().any(|w| w.contains(0.0, SAFE_HOUSE_HALF)));
        assert!(!walls.iter().any(|w| w.contains(1.9, SAFE_HOUSE_HALF)));
        assert!(walls.iter().any(|w| w.contains(3.0, SAFE_HOUSE_HALF)));
        // North wall is solid.
        assert!(walls.iter().any(|w| w.contains(0.0, -SAFE_HOUSE_HALF)));
    }

    #[test]
    fn test_map_bounds_and_spawns() {
        let arena = map_bounds(1);
        assert_approx_eq!(arena.min_x, ARENA_OFFSET_X - WORLD_HALF_SIZE, 1e-4);
        assert_approx_eq!(arena.max_x, ARENA_OFFSET_X + WORLD_HALF_SIZE, 1e-4);

        let maze = map_bounds(3);
        assert_approx_eq!(maze.min_x, -WORLD_HALF_SIZE, 1e-4);
        assert_eq!(maze.min_z, arena.min_z);

        let (sx, sz) = map_spawn(1);
        assert!(arena.contains(sx, sz));
        assert_eq!(map_spawn(2), map_spawn(10));

        assert_eq!(maze.clamp(100.0, -100.0), (WORLD_HALF_SIZE, -WORLD_HALF_SIZE));
    }
}
