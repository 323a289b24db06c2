//! The authoritative simulation world.
//!
//! [`World`] owns every mutable piece of game state: the player directory,
//! the live enemy pool, coins, pending respawns, the obstacle set and the
//! random source. Nothing here performs I/O. Messages produced while handling
//! input or ticking are queued as [`Outgoing`] and drained by the network
//! layer, which keeps the world usable from tests without sockets.
//!
//! Time is always passed in explicitly: `now_ms` is a millisecond clock used
//! for cooldowns and deadlines, `dt` the elapsed seconds for integration.

use crate::collision::{Collider, SafeZone, SpawnObstacle};
use crate::combat::HitLimiter;
use crate::enemy::Enemy;
use crate::geometry::{build_arena, build_maze, build_safe_house, map_bounds, map_spawn, MazeLayout};
use crate::player::Player;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    ClientMessage, CoinSnapshot, PlanarPos, ServerMessage, Vec3, WorldSnapshot, ARENA_OFFSET_X,
    ENEMIES_PER_MAP, ENEMY_RADIUS, ENEMY_RESPAWN_DELAY_MS, KILL_XP, MAP_COUNT, SAFE_ZONE_RADIUS,
    SPAWN_OBSTACLE_RADIUS,
};
use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_2;

/// Gameplay knobs that differ between production and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Seed for the maze layout and every gameplay roll. `None` draws one
    /// from the operating system.
    pub seed: Option<u64>,
    pub maps: u32,
    pub enemies_per_map: u32,
    pub respawn_delay_ms: u64,
    pub kill_xp: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: None,
            maps: MAP_COUNT,
            enemies_per_map: ENEMIES_PER_MAP,
            respawn_delay_ms: ENEMY_RESPAWN_DELAY_MS,
            kill_xp: KILL_XP,
        }
    }
}

/// A message waiting to be delivered by the network layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Send { client_id: u32, message: ServerMessage },
    Broadcast(ServerMessage),
}

/// Telegraph marker shown where the next enemy will reappear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub x: f32,
    pub z: f32,
    pub visible: bool,
}

/// A killed enemy waiting out its respawn delay.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRespawn {
    pub enemy_id: String,
    pub map: u32,
    /// Telegraphed location the replacement is placed near.
    pub x: f32,
    pub z: f32,
    pub due_ms: u64,
}

/// Lifecycle state of an enemy id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyPhase {
    Alive,
    RespawnPending { due_ms: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coin {
    pub id: String,
    pub pos: Vec3,
    pub value: u32,
}

pub struct World {
    pub(crate) config: WorldConfig,
    pub(crate) collider: Collider,
    pub(crate) players: BTreeMap<u32, Player>,
    pub(crate) enemies: Vec<Enemy>,
    pub(crate) coins: Vec<Coin>,
    pub(crate) pending_respawns: Vec<PendingRespawn>,
    pub(crate) spawn_point: SpawnPoint,
    pub(crate) hit_limiter: HitLimiter,
    pub(crate) rng: StdRng,
    pub(crate) outbox: Vec<Outgoing>,
    pub(crate) next_coin_id: u32,
    tick: u64,
}

impl World {
    /// Builds the geometry, the safe zones and the initial enemy pool.
    pub fn new(config: WorldConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut walls = Vec::new();
        build_maze(&mut walls, &MazeLayout::default(), &mut rng);
        build_arena(&mut walls, ARENA_OFFSET_X);
        // Maze maps share one spawn, so one house covers all of them.
        let mut house_sites: Vec<(f32, f32)> = Vec::new();
        for map in 1..=config.maps {
            let site = map_spawn(map);
            if !house_sites.contains(&site) {
                build_safe_house(&mut walls, site.0, site.1);
                house_sites.push(site);
            }
        }

        let safe_zones = (1..=config.maps)
            .map(|map| {
                let (x, z) = map_spawn(map);
                SafeZone {
                    map,
                    x,
                    z,
                    r: SAFE_ZONE_RADIUS,
                }
            })
            .collect();
        let collider = Collider::new(
            walls,
            safe_zones,
            SpawnObstacle {
                x: 0.0,
                z: 0.0,
                r: SPAWN_OBSTACLE_RADIUS,
            },
        );

        let mut world = Self {
            config,
            collider,
            players: BTreeMap::new(),
            enemies: Vec::new(),
            coins: Vec::new(),
            pending_respawns: Vec::new(),
            spawn_point: SpawnPoint {
                x: 0.0,
                z: 0.0,
                visible: false,
            },
            hit_limiter: HitLimiter::default(),
            rng,
            outbox: Vec::new(),
            next_coin_id: 1,
            tick: 0,
        };
        world.populate_enemies();

        info!(
            "World ready: {} walls, {} enemies across {} maps",
            world.collider.walls().len(),
            world.enemies.len(),
            world.config.maps
        );
        world
    }

    /// `E1`.. in map order: the first `enemies_per_map` ids go to map 1,
    /// the next batch to map 2, and so on.
    fn populate_enemies(&mut self) {
        let mut next_id = 1;
        for map in 1..=self.config.maps {
            for _ in 0..self.config.enemies_per_map {
                let (bx, bz) = random_spawn_pos(map, &mut self.rng);
                let (x, z) = self.find_enemy_spot(map, bx, bz, None);
                let enemy = Enemy::spawn(format!("E{}", next_id), map, x, z, 0, &mut self.rng);
                self.enemies.push(enemy);
                next_id += 1;
            }
        }
    }

    /// Clear point near `(cx, cz)` on `map`, kept apart from that map's other
    /// live enemies. `skip` excludes one pool index from the spacing check.
    pub(crate) fn find_enemy_spot(&mut self, map: u32, cx: f32, cz: f32, skip: Option<usize>) -> (f32, f32) {
        let others: Vec<(f32, f32)> = self
            .enemies
            .iter()
            .enumerate()
            .filter(|(i, e)| e.map == map && Some(*i) != skip)
            .map(|(_, e)| (e.pos.x, e.pos.z))
            .collect();
        self.collider
            .find_clear_near(cx, cz, ENEMY_RADIUS, &map_bounds(map), &others, &mut self.rng)
    }

    /// Registers a player for a new connection and queues its `welcome`.
    pub fn add_player(&mut self, client_id: u32, now_ms: u64) -> &Player {
        let player = Player::new(client_id);
        info!(
            "Added player {} at ({:.1}, {:.1}) on map {}",
            player.id, player.pos.x, player.pos.z, player.map
        );
        let id = player.id.clone();
        self.players.insert(client_id, player);

        let snapshot = self.snapshot(now_ms);
        self.outbox.push(Outgoing::Send {
            client_id,
            message: ServerMessage::Welcome { id, snapshot },
        });
        &self.players[&client_id]
    }

    /// Drops the player and its hit bookkeeping. Pending respawns are not
    /// affected.
    pub fn remove_player(&mut self, client_id: u32) -> Option<Player> {
        self.hit_limiter.forget(client_id);
        let removed = self.players.remove(&client_id);
        if let Some(player) = &removed {
            info!("Removed player {}", player.id);
        }
        removed
    }

    /// Applies one decoded client message. Messages from unknown clients are
    /// ignored.
    pub fn handle_message(&mut self, client_id: u32, message: ClientMessage, now_ms: u64) {
        if !self.players.contains_key(&client_id) {
            debug!("Ignoring message from unregistered client {}", client_id);
            return;
        }

        match message {
            ClientMessage::Hello {
                name,
                color,
                accessories,
                form,
            } => {
                if let Some(player) = self.players.get_mut(&client_id) {
                    player.apply_cosmetics(name, color, accessories, form);
                    debug!("Player {} is now '{}'", player.id, player.name);
                }
            }
            ClientMessage::Input { input: Some(input) } => {
                if let Some(player) = self.players.get_mut(&client_id) {
                    player.set_input(input);
                }
            }
            ClientMessage::Input { input: None } => {}
            ClientMessage::HitEnemy {
                enemy_id: Some(enemy_id),
                damage,
            } => {
                self.handle_hit(client_id, &enemy_id, damage, now_ms);
            }
            ClientMessage::HitEnemy { enemy_id: None, .. } => {}
            ClientMessage::ChangeMap { map } => {
                let message = match self.change_map(client_id, map) {
                    Ok(pos) => {
                        let map = self.players.get(&client_id).map_or(1, |p| p.map);
                        ServerMessage::MapChanged { pos, map }
                    }
                    Err(err) => ServerMessage::ChangeMapDenied {
                        reason: err.to_string(),
                    },
                };
                self.outbox.push(Outgoing::Send { client_id, message });
            }
        }
    }

    /// One fixed simulation step: players, then enemies, then due respawns,
    /// then coin pickup.
    pub fn tick(&mut self, now_ms: u64, dt: f32) {
        self.tick += 1;

        for player in self.players.values_mut() {
            player.simulate(&self.collider, now_ms, dt);
        }

        for index in 0..self.enemies.len() {
            self.update_enemy(index, now_ms, dt);
        }

        self.process_respawns(now_ms);
        self.collect_coins();
    }

    fn update_enemy(&mut self, index: usize, now_ms: u64, dt: f32) {
        let target = self.nearest_target(index);

        let enemy = &mut self.enemies[index];
        enemy.choose_heading(target, now_ms, &mut self.rng);
        enemy.turn(dt);
        enemy.advance(&self.collider, dt);
        let stuck = enemy.track_progress(dt);

        if stuck {
            let (map, x, z) = (enemy.map, enemy.pos.x, enemy.pos.z);
            let (nx, nz) = self.find_enemy_spot(map, x, z, Some(index));
            let enemy = &mut self.enemies[index];
            enemy.unstick(nx, nz, now_ms, &mut self.rng);
            debug!(
                "Enemy {} was stuck at ({:.2}, {:.2}), moved to ({:.2}, {:.2})",
                enemy.id, x, z, nx, nz
            );
        }

        self.apply_contact_damage(index, now_ms);
    }

    /// Nearest same-map player standing outside every safe zone.
    fn nearest_target(&self, index: usize) -> Option<(f32, f32)> {
        let enemy = &self.enemies[index];
        self.players
            .values()
            .filter(|p| p.map == enemy.map)
            .filter(|p| !self.collider.is_in_safe_zone(p.map, p.pos.x, p.pos.z))
            .map(|p| (p.pos.planar_distance_sq(&enemy.pos), p.pos.x, p.pos.z))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, x, z)| (x, z))
    }

    /// Current state of every live entity.
    pub fn snapshot(&self, now_ms: u64) -> WorldSnapshot {
        WorldSnapshot {
            t: now_ms,
            players: self.players.values().map(Player::snapshot).collect(),
            enemies: self.enemies.iter().map(Enemy::snapshot).collect(),
            coins: self
                .coins
                .iter()
                .map(|c| CoinSnapshot {
                    id: c.id.clone(),
                    pos: c.pos,
                    value: c.value,
                })
                .collect(),
            walls: self.collider.walls().to_vec(),
        }
    }

    /// Hands every queued message to the caller, oldest first.
    pub fn drain_outbox(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.outbox)
    }

    pub fn enemy_phase(&self, enemy_id: &str) -> Option<EnemyPhase> {
        if self.enemies.iter().any(|e| e.id == enemy_id) {
            return Some(EnemyPhase::Alive);
        }
        self.pending_respawns
            .iter()
            .find(|r| r.enemy_id == enemy_id)
            .map(|r| EnemyPhase::RespawnPending { due_ms: r.due_ms })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn collider(&self) -> &Collider {
        &self.collider
    }

    pub fn player(&self, client_id: u32) -> Option<&Player> {
        self.players.get(&client_id)
    }

    pub fn player_mut(&mut self, client_id: u32) -> Option<&mut Player> {
        self.players.get_mut(&client_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn enemy(&self, enemy_id: &str) -> Option<&Enemy> {
        self.enemies.iter().find(|e| e.id == enemy_id)
    }

    pub fn enemy_mut(&mut self, enemy_id: &str) -> Option<&mut Enemy> {
        self.enemies.iter_mut().find(|e| e.id == enemy_id)
    }

    pub fn enemies(&self) -> &[Enemy] {
        &self.enemies
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn pending_respawns(&self) -> &[PendingRespawn] {
        &self.pending_respawns
    }

    pub fn spawn_point(&self) -> SpawnPoint {
        self.spawn_point
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }
}

/// Random enemy spawn base for `map`: somewhere 2 to 8 m past the edge of
/// the map's safe zone, toward the map interior. Spawns sit in the map's
/// minimum corner, so the interior is the +X/+Z quadrant.
pub fn random_spawn_pos<R: Rng + ?Sized>(map: u32, rng: &mut R) -> (f32, f32) {
    let (sx, sz) = map_spawn(map);
    let angle = rng.gen::<f32>() * FRAC_PI_2;
    let dist = rng.gen_range(SAFE_ZONE_RADIUS + 2.0..SAFE_ZONE_RADIUS + 8.0);
    (sx + angle.cos() * dist, sz + angle.sin() * dist)
}

impl PendingRespawn {
    /// Telegraph position as sent in `spawn_point`.
    pub fn planar_pos(&self) -> PlanarPos {
        PlanarPos {
            x: self.x,
            z: self.z,
        }
    }
}
