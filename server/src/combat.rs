//! Combat and progression: hit reports, enemy death and respawn, contact
//! damage, map changes and coin pickup.
//!
//! Enemy lifecycle:
//!
//! ```text
//! Alive --hp reaches 0--> removed, enemy_died + spawn_point{visible:true}
//!       --respawn delay--> Alive again (same id, full hp), spawn_point hidden
//! ```
//!
//! Hit reports are trusted apart from a per (client, enemy) rate limit: there
//! is no server-side range or line-of-sight check.

use crate::error::MapChangeError;
use crate::enemy::Enemy;
use crate::world::{random_spawn_pos, Coin, Outgoing, PendingRespawn, SpawnPoint, World};
use log::{debug, info};
use rand::Rng;
use shared::{
    circle_hit, PlanarPos, ServerMessage, Vec3, COIN_RADIUS, COIN_VALUE_MAX, COIN_VALUE_MIN,
    ENEMY_RADIUS, PLAYER_RADIUS,
};
use std::collections::HashMap;

/// Minimum spacing between accepted hits from one client on one enemy.
pub const HIT_INTERVAL_MS: u64 = 100;
/// Minimum spacing between contact-damage rolls against one player.
pub const CONTACT_COOLDOWN_MS: u64 = 800;
pub const CONTACT_DAMAGE_CHANCE: f64 = 0.5;
pub const CONTACT_DAMAGE_MIN: i32 = 2;
pub const CONTACT_DAMAGE_MAX: i32 = 4;

/// What happened to a hit report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    UnknownEnemy,
    RateLimited,
    Damaged { hp: i32 },
    Killed,
}

/// Last accepted hit time per reporting client and target enemy.
#[derive(Debug, Default, Clone)]
pub struct HitLimiter {
    last_hit: HashMap<u32, HashMap<String, u64>>,
}

impl HitLimiter {
    /// Records a hit at `now_ms` unless the previous accepted one for this
    /// pair is less than [`HIT_INTERVAL_MS`] old.
    pub fn try_acquire(&mut self, client_id: u32, enemy_id: &str, now_ms: u64) -> bool {
        let per_enemy = self.last_hit.entry(client_id).or_default();
        if let Some(&last) = per_enemy.get(enemy_id) {
            if now_ms.saturating_sub(last) < HIT_INTERVAL_MS {
                return false;
            }
        }
        per_enemy.insert(enemy_id.to_string(), now_ms);
        true
    }

    pub fn forget(&mut self, client_id: u32) {
        self.last_hit.remove(&client_id);
    }

    pub fn tracked_clients(&self) -> usize {
        self.last_hit.len()
    }
}

/// `max(1, floor(damage))`; anything missing or non-finite counts as 1.
pub fn hit_damage(reported: Option<f64>) -> i32 {
    match reported {
        Some(d) if d.is_finite() => d.floor().max(1.0).min(i32::MAX as f64) as i32,
        _ => 1,
    }
}

impl World {
    /// Applies a client-reported hit on `enemy_id`.
    pub fn handle_hit(&mut self, client_id: u32, enemy_id: &str, damage: Option<f64>, now_ms: u64) -> HitOutcome {
        let Some(index) = self.enemies.iter().position(|e| e.id == enemy_id) else {
            return HitOutcome::UnknownEnemy;
        };
        if !self.hit_limiter.try_acquire(client_id, enemy_id, now_ms) {
            return HitOutcome::RateLimited;
        }

        let dmg = hit_damage(damage);
        let enemy = &mut self.enemies[index];
        enemy.hp = (enemy.hp - dmg).max(0);
        debug!("Client {} hit {} for {} (hp {})", client_id, enemy.id, dmg, enemy.hp);

        if enemy.hp > 0 {
            let hp = enemy.hp;
            self.outbox.push(Outgoing::Broadcast(ServerMessage::EnemyHp {
                enemy_id: enemy_id.to_string(),
                hp,
            }));
            return HitOutcome::Damaged { hp };
        }

        self.kill_enemy(index, client_id, now_ms);
        HitOutcome::Killed
    }

    /// Removes the enemy at `index`, credits the killer and telegraphs the
    /// respawn.
    fn kill_enemy(&mut self, index: usize, killer_id: u32, now_ms: u64) {
        let dead = self.enemies.remove(index);
        info!("Enemy {} killed by client {}", dead.id, killer_id);
        self.outbox.push(Outgoing::Broadcast(ServerMessage::EnemyDied {
            enemy_id: dead.id.clone(),
        }));

        let kill_xp = self.config.kill_xp;
        if let Some(killer) = self.players.get_mut(&killer_id) {
            let levels = killer.gain_xp(kill_xp);
            if levels > 0 {
                info!("Player {} reached level {}", killer.id, killer.level);
            }
        }

        let (x, z) = random_spawn_pos(dead.map, &mut self.rng);
        let respawn = PendingRespawn {
            enemy_id: dead.id,
            map: dead.map,
            x,
            z,
            due_ms: now_ms + self.config.respawn_delay_ms,
        };
        self.spawn_point = SpawnPoint { x, z, visible: true };
        self.collider.move_spawn_obstacle(x, z);
        self.outbox.push(Outgoing::Broadcast(ServerMessage::SpawnPoint {
            pos: respawn.planar_pos(),
            visible: true,
        }));
        self.pending_respawns.push(respawn);
    }

    /// Brings back every enemy whose respawn delay has elapsed. The spawn
    /// marker is hidden once nothing is left pending; the obstacle stays put
    /// until the next death.
    pub fn process_respawns(&mut self, now_ms: u64) {
        if self.pending_respawns.is_empty() {
            return;
        }
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_respawns)
            .into_iter()
            .partition(|r| r.due_ms <= now_ms);
        self.pending_respawns = waiting;
        if due.is_empty() {
            return;
        }

        for respawn in due {
            let (x, z) = self.find_enemy_spot(respawn.map, respawn.x, respawn.z, None);
            let enemy = Enemy::spawn(respawn.enemy_id, respawn.map, x, z, now_ms, &mut self.rng);
            info!(
                "Respawned {} on map {} at ({:.2}, {:.2})",
                enemy.id, enemy.map, enemy.pos.x, enemy.pos.z
            );
            self.enemies.push(enemy);
        }

        if self.pending_respawns.is_empty() {
            self.spawn_point.visible = false;
            self.outbox.push(Outgoing::Broadcast(ServerMessage::SpawnPoint {
                pos: PlanarPos {
                    x: self.spawn_point.x,
                    z: self.spawn_point.z,
                },
                visible: false,
            }));
        }
    }

    /// Rolls contact damage from the enemy at `index` against every touching
    /// same-map player outside the safe zones. The per-player cooldown starts
    /// on contact, whether or not the roll lands.
    pub(crate) fn apply_contact_damage(&mut self, index: usize, now_ms: u64) {
        let enemy = &self.enemies[index];
        let (enemy_pos, enemy_map) = (enemy.pos, enemy.map);

        for player in self.players.values_mut() {
            if player.map != enemy_map
                || self.collider.is_in_safe_zone(player.map, player.pos.x, player.pos.z)
                || !circle_hit(&enemy_pos, ENEMY_RADIUS, &player.pos, PLAYER_RADIUS)
            {
                continue;
            }
            if let Some(last) = player.last_hurt_ms {
                if now_ms.saturating_sub(last) < CONTACT_COOLDOWN_MS {
                    continue;
                }
            }
            player.last_hurt_ms = Some(now_ms);

            if self.rng.gen_bool(CONTACT_DAMAGE_CHANCE) {
                let dmg = self.rng.gen_range(CONTACT_DAMAGE_MIN..=CONTACT_DAMAGE_MAX);
                if player.take_damage(dmg) {
                    info!("Player {} died and respawned on map {}", player.id, player.map);
                } else {
                    debug!("Player {} took {} contact damage (hp {})", player.id, dmg, player.hp);
                }
            }
        }
    }

    /// Moves a player to the spawn of `requested` if the map exists and the
    /// player's level allows it. Map 1 is always open; map N >= 2 needs
    /// level N.
    pub fn change_map(&mut self, client_id: u32, requested: Option<f64>) -> Result<Vec3, MapChangeError> {
        let max = self.config.maps;
        let map = match requested {
            Some(m) if m.fract() == 0.0 && m >= 1.0 && m <= max as f64 => m as u32,
            _ => return Err(MapChangeError::OutOfRange { max }),
        };

        let player = self
            .players
            .get_mut(&client_id)
            .ok_or(MapChangeError::UnknownPlayer)?;
        if map >= 2 && player.level < map {
            info!(
                "Player {} (level {}) denied map {}",
                player.id, player.level, map
            );
            return Err(MapChangeError::LevelTooLow { required: map });
        }

        player.teleport_to_spawn(map);
        info!("Player {} moved to map {}", player.id, map);
        Ok(player.pos)
    }

    /// Places a coin. Used by whatever drives coin spawning; the value is
    /// clamped into the allowed range.
    pub fn spawn_coin(&mut self, pos: Vec3, value: u32) -> String {
        let id = format!("C{}", self.next_coin_id);
        self.next_coin_id += 1;
        self.coins.push(Coin {
            id: id.clone(),
            pos,
            value: value.clamp(COIN_VALUE_MIN, COIN_VALUE_MAX),
        });
        id
    }

    /// Credits and removes every coin overlapping a player. When several
    /// players overlap one coin, the first in directory order takes it.
    pub fn collect_coins(&mut self) {
        let players = &mut self.players;
        self.coins.retain(|coin| {
            let taker = players
                .values_mut()
                .find(|p| circle_hit(&coin.pos, COIN_RADIUS, &p.pos, PLAYER_RADIUS));
            match taker {
                Some(player) => {
                    player.gold += coin.value;
                    debug!("Player {} picked up {} ({} gold)", player.id, coin.id, coin.value);
                    false
                }
                None => true,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::map_spawn;
    use crate::world::{EnemyPhase, WorldConfig};
    use shared::{ENEMY_MAX_HP, LEVEL_UP_XP, PLAYER_MAX_HP};

    fn world_with_player() -> World {
        let mut world = World::new(WorldConfig {
            seed: Some(21),
            ..WorldConfig::default()
        });
        world.add_player(1, 0);
        world.drain_outbox();
        world
    }

    fn broadcasts(world: &mut World) -> Vec<ServerMessage> {
        world
            .drain_outbox()
            .into_iter()
            .filter_map(|o| match o {
                Outgoing::Broadcast(m) => Some(m),
                Outgoing::Send { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_hit_limiter_per_pair() {
        let mut limiter = HitLimiter::default();
        assert!(limiter.try_acquire(1, "E1", 1_000));
        assert!(!limiter.try_acquire(1, "E1", 1_050));
        assert!(limiter.try_acquire(1, "E2", 1_050));
        assert!(limiter.try_acquire(2, "E1", 1_050));
        assert!(limiter.try_acquire(1, "E1", 1_100));
        assert_eq!(limiter.tracked_clients(), 2);

        limiter.forget(1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.try_acquire(1, "E1", 1_101));
    }

    #[test]
    fn test_hit_damage_floor() {
        assert_eq!(hit_damage(None), 1);
        assert_eq!(hit_damage(Some(4.9)), 4);
        assert_eq!(hit_damage(Some(0.3)), 1);
        assert_eq!(hit_damage(Some(-7.0)), 1);
        assert_eq!(hit_damage(Some(f64::NAN)), 1);
        assert_eq!(hit_damage(Some(1e20)), i32::MAX);
    }

    #[test]
    fn test_unknown_enemy_is_ignored() {
        let mut world = world_with_player();
        assert_eq!(world.handle_hit(1, "E404", Some(3.0), 0), HitOutcome::UnknownEnemy);
        assert!(world.drain_outbox().is_empty());
    }

    #[test]
    fn test_non_lethal_hit_broadcasts_hp() {
        let mut world = world_with_player();
        let outcome = world.handle_hit(1, "E6", Some(4.0), 0);
        assert_eq!(outcome, HitOutcome::Damaged { hp: ENEMY_MAX_HP - 4 });
        assert_eq!(
            broadcasts(&mut world),
            vec![ServerMessage::EnemyHp {
                enemy_id: "E6".to_string(),
                hp: ENEMY_MAX_HP - 4,
            }]
        );
    }

    #[test]
    fn test_kill_telegraphs_and_respawns() {
        let mut world = world_with_player();
        assert_eq!(world.handle_hit(1, "E7", Some(50.0), 500), HitOutcome::Killed);

        assert!(world.enemy("E7").is_none());
        assert_eq!(world.enemies().len(), 49);
        assert_eq!(world.enemy_phase("E7"), Some(EnemyPhase::RespawnPending { due_ms: 1_500 }));
        assert_eq!(world.player(1).map(|p| p.xp), Some(10));

        let spawn = world.spawn_point();
        assert!(spawn.visible);
        assert_eq!(world.collider().spawn_obstacle().x, spawn.x);
        let messages = broadcasts(&mut world);
        assert_eq!(
            messages[0],
            ServerMessage::EnemyDied {
                enemy_id: "E7".to_string()
            }
        );
        let telegraphed = world.pending_respawns()[0].planar_pos();
        assert_eq!(
            messages[1],
            ServerMessage::SpawnPoint {
                pos: telegraphed,
                visible: true
            }
        );

        // Further hits on the dead id are ignored.
        assert_eq!(world.handle_hit(1, "E7", None, 800), HitOutcome::UnknownEnemy);

        world.process_respawns(1_499);
        assert!(world.enemy("E7").is_none());

        world.process_respawns(1_500);
        let enemy = world.enemy("E7").expect("respawned");
        assert_eq!(enemy.hp, ENEMY_MAX_HP);
        assert_eq!(enemy.map, 2);
        assert_eq!(world.enemy_phase("E7"), Some(EnemyPhase::Alive));
        assert!(!world.spawn_point().visible);
        assert!(matches!(
            broadcasts(&mut world).as_slice(),
            [ServerMessage::SpawnPoint { visible: false, .. }]
        ));
    }

    #[test]
    fn test_spawn_point_stays_visible_while_any_respawn_pending() {
        let mut world = world_with_player();
        world.handle_hit(1, "E11", Some(10.0), 0);
        world.handle_hit(1, "E12", Some(10.0), 600);

        world.process_respawns(1_000);
        assert!(world.enemy("E11").is_some());
        assert!(world.spawn_point().visible);

        world.process_respawns(1_600);
        assert!(world.enemy("E12").is_some());
        assert!(!world.spawn_point().visible);
        assert!(world.pending_respawns().is_empty());
    }

    #[test]
    fn test_kill_levels_up() {
        let mut world = World::new(WorldConfig {
            seed: Some(5),
            kill_xp: 250,
            ..WorldConfig::default()
        });
        world.add_player(1, 0);
        world.handle_hit(1, "E1", Some(100.0), 0);

        let player = world.player(1).expect("player");
        assert_eq!(player.level, 3);
        assert_eq!(player.xp, 250 - 2 * LEVEL_UP_XP);
    }

    #[test]
    fn test_change_map_rules() {
        let mut world = world_with_player();

        assert_eq!(
            world.change_map(1, Some(3.0)),
            Err(MapChangeError::LevelTooLow { required: 3 })
        );
        assert_eq!(
            world.change_map(1, Some(0.0)),
            Err(MapChangeError::OutOfRange { max: 10 })
        );
        assert_eq!(
            world.change_map(1, Some(11.0)),
            Err(MapChangeError::OutOfRange { max: 10 })
        );
        assert_eq!(
            world.change_map(1, Some(2.5)),
            Err(MapChangeError::OutOfRange { max: 10 })
        );
        assert_eq!(world.change_map(1, None), Err(MapChangeError::OutOfRange { max: 10 }));
        assert_eq!(world.change_map(7, Some(1.0)), Err(MapChangeError::UnknownPlayer));

        if let Some(player) = world.player_mut(1) {
            player.level = 3;
            player.yaw = 2.0;
        }
        let pos = world.change_map(1, Some(3.0)).expect("level 3 may enter map 3");
        let (sx, sz) = map_spawn(3);
        assert_eq!((pos.x, pos.y, pos.z), (sx, 0.0, sz));
        let player = world.player(1).expect("player");
        assert_eq!(player.map, 3);
        assert_eq!(player.yaw, 0.0);

        // Map 1 is always open.
        assert!(world.change_map(1, Some(1.0)).is_ok());
    }

    #[test]
    fn test_change_map_message_replies_to_sender() {
        let mut world = world_with_player();
        world.handle_message(1, shared::ClientMessage::ChangeMap { map: Some(2.0) }, 0);
        let outbox = world.drain_outbox();
        match outbox.as_slice() {
            [Outgoing::Send {
                client_id: 1,
                message: ServerMessage::ChangeMapDenied { reason },
            }] => assert_eq!(reason, "Nivel insuficiente (requiere nivel 2)"),
            other => panic!("unexpected outbox {:?}", other),
        }
    }

    #[test]
    fn test_coin_pickup_first_player_wins() {
        let mut world = world_with_player();
        world.add_player(2, 0);
        world.drain_outbox();

        let spawn = world.player(1).map(|p| p.pos).expect("player");
        let id = world.spawn_coin(spawn, 9);
        assert_eq!(id, "C1");
        assert_eq!(world.coins()[0].value, COIN_VALUE_MAX);
        world.spawn_coin(Vec3::new(0.0, 0.0, 0.0), 0);
        assert_eq!(world.coins()[1].value, COIN_VALUE_MIN);

        world.collect_coins();
        assert_eq!(world.coins().len(), 1);
        assert_eq!(world.player(1).map(|p| p.gold), Some(COIN_VALUE_MAX));
        assert_eq!(world.player(2).map(|p| p.gold), Some(0));
    }

    #[test]
    fn test_contact_damage_cooldown_and_safe_zone() {
        let mut world = world_with_player();
        let index = world.enemies.iter().position(|e| e.id == "E6").expect("E6");

        // Inside the map 2 safe zone nothing happens.
        if let Some(player) = world.player_mut(1) {
            player.map = 2;
            let (sx, sz) = map_spawn(2);
            player.pos = Vec3::new(sx, 0.0, sz);
        }
        let pos = world.player(1).map(|p| p.pos).expect("player");
        world.enemies[index].pos = pos;
        world.apply_contact_damage(index, 10_000);
        assert_eq!(world.player(1).and_then(|p| p.last_hurt_ms), None);

        // Outside it the gate arms even when the roll misses.
        let outside = Vec3::new(5.0, 0.0, 5.0);
        if let Some(player) = world.player_mut(1) {
            player.pos = outside;
        }
        world.enemies[index].pos = outside;
        world.apply_contact_damage(index, 10_000);
        assert_eq!(world.player(1).and_then(|p| p.last_hurt_ms), Some(10_000));

        world.apply_contact_damage(index, 10_500);
        assert_eq!(world.player(1).and_then(|p| p.last_hurt_ms), Some(10_000));
        world.apply_contact_damage(index, 10_800);
        assert_eq!(world.player(1).and_then(|p| p.last_hurt_ms), Some(10_800));

        let hp = world.player(1).map(|p| p.hp).expect("player");
        assert!(hp >= 1 && hp <= PLAYER_MAX_HP);
    }
}
