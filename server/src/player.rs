//! Player records and per-tick player movement.

use crate::collision::Collider;
use crate::geometry::{map_bounds, map_spawn};
use crate::utils::normalize_vector;
use shared::{
    is_hex_color, InputState, PlayerSnapshot, Vec3, ACCESSORY_ALLOW_LIST, FORM_ALLOW_LIST,
    LEVEL_UP_XP, MAX_ACCESSORIES, MAX_NAME_LEN, PLAYER_DASH_COOLDOWN_MS, PLAYER_DASH_DURATION_MS,
    PLAYER_DASH_SPEED, PLAYER_DEFAULT_COLOR, PLAYER_DEFAULT_FORM, PLAYER_GRAVITY,
    PLAYER_JUMP_SPEED, PLAYER_MAX_HP, PLAYER_RADIUS, PLAYER_SPEED,
};

/// Where a player is in the dash cycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashPhase {
    Ready,
    Active { until_ms: u64 },
    Cooldown { ready_at_ms: u64 },
}

/// Authoritative state of one connected player.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub pos: Vec3,
    pub yaw: f32,
    pub hp: i32,
    pub xp: u32,
    pub level: u32,
    pub gold: u32,
    pub color: String,
    pub accessories: Vec<String>,
    pub form: String,
    pub map: u32,
    pub input: InputState,
    pub vy: f32,
    pub grounded: bool,
    /// Start of the most recent dash.
    pub last_dash_ms: Option<u64>,
    /// Last time an enemy contact passed the hurt cooldown gate.
    pub last_hurt_ms: Option<u64>,
    jump_held: bool,
    dash_held: bool,
}

impl Player {
    /// New player standing at the map 1 spawn.
    pub fn new(client_id: u32) -> Self {
        let id = format!("P{}", client_id);
        let (x, z) = map_spawn(1);
        Self {
            name: format!("Jugador {}", id),
            id,
            pos: Vec3::new(x, 0.0, z),
            yaw: 0.0,
            hp: PLAYER_MAX_HP,
            xp: 0,
            level: 1,
            gold: 0,
            color: PLAYER_DEFAULT_COLOR.to_string(),
            accessories: Vec::new(),
            form: PLAYER_DEFAULT_FORM.to_string(),
            map: 1,
            input: InputState::default(),
            vy: 0.0,
            grounded: true,
            last_dash_ms: None,
            last_hurt_ms: None,
            jump_held: false,
            dash_held: false,
        }
    }

    /// Applies the cosmetic fields of a `hello`. Each field is checked on its
    /// own; a rejected field leaves the current value in place.
    pub fn apply_cosmetics(
        &mut self,
        name: Option<String>,
        color: Option<String>,
        accessories: Option<Vec<String>>,
        form: Option<String>,
    ) {
        if let Some(name) = name {
            self.name = name.chars().take(MAX_NAME_LEN).collect();
        }
        if let Some(color) = color.filter(|c| is_hex_color(c)) {
            self.color = color;
        }
        if let Some(accessories) = accessories {
            self.accessories = accessories
                .into_iter()
                .filter(|a| ACCESSORY_ALLOW_LIST.contains(&a.as_str()))
                .take(MAX_ACCESSORIES)
                .collect();
        }
        if let Some(form) = form.filter(|f| FORM_ALLOW_LIST.contains(&f.as_str())) {
            self.form = form;
        }
    }

    /// Last write wins: the buffered input is replaced, never queued.
    pub fn set_input(&mut self, input: InputState) {
        if let Some(yaw) = input.yaw {
            self.yaw = yaw;
        }
        self.input = input;
    }

    pub fn dash_phase(&self, now_ms: u64) -> DashPhase {
        match self.last_dash_ms {
            None => DashPhase::Ready,
            Some(start) if now_ms < start + PLAYER_DASH_DURATION_MS => DashPhase::Active {
                until_ms: start + PLAYER_DASH_DURATION_MS,
            },
            Some(start) if now_ms <= start + PLAYER_DASH_COOLDOWN_MS => DashPhase::Cooldown {
                ready_at_ms: start + PLAYER_DASH_COOLDOWN_MS + 1,
            },
            Some(_) => DashPhase::Ready,
        }
    }

    /// Advances this player by one tick: planar movement against walls,
    /// map clamping, then jump and gravity.
    pub fn simulate(&mut self, collider: &Collider, now_ms: u64, dt: f32) {
        let input = self.input;

        let dash_edge = input.dash && !self.dash_held;
        if dash_edge && self.dash_phase(now_ms) == DashPhase::Ready {
            self.last_dash_ms = Some(now_ms);
        }
        self.dash_held = input.dash;

        let (forward_x, forward_z) = (self.yaw.sin(), self.yaw.cos());
        let (right_x, right_z) = (self.yaw.cos(), -self.yaw.sin());

        let mut vx = 0.0;
        let mut vz = 0.0;
        if input.up {
            vx += forward_x;
            vz += forward_z;
        }
        if input.down {
            vx -= forward_x;
            vz -= forward_z;
        }
        if input.right {
            vx += right_x;
            vz += right_z;
        }
        if input.left {
            vx -= right_x;
            vz -= right_z;
        }
        let (dir_x, dir_z) = normalize_vector(vx, vz);

        let mut speed = PLAYER_SPEED;
        if matches!(self.dash_phase(now_ms), DashPhase::Active { .. }) {
            speed += PLAYER_DASH_SPEED;
        }

        // Walls only: players walk through safe zones and the spawn obstacle.
        let nx = self.pos.x + dir_x * speed * dt;
        let nz = self.pos.z + dir_z * speed * dt;
        if !collider.collides_walls(nx, self.pos.z, PLAYER_RADIUS) {
            self.pos.x = nx;
        }
        if !collider.collides_walls(self.pos.x, nz, PLAYER_RADIUS) {
            self.pos.z = nz;
        }
        let (cx, cz) = map_bounds(self.map).clamp(self.pos.x, self.pos.z);
        self.pos.x = cx;
        self.pos.z = cz;

        if input.jump && !self.jump_held && self.grounded {
            self.vy = PLAYER_JUMP_SPEED;
            self.grounded = false;
        }
        self.jump_held = input.jump;

        self.vy -= PLAYER_GRAVITY * dt;
        self.pos.y += self.vy * dt;
        if self.pos.y <= 0.0 {
            self.pos.y = 0.0;
            self.vy = 0.0;
            self.grounded = true;
        }
    }

    /// Places the player at `map`'s spawn facing +Z.
    pub fn teleport_to_spawn(&mut self, map: u32) {
        let (x, z) = map_spawn(map);
        self.map = map;
        self.pos = Vec3::new(x, 0.0, z);
        self.yaw = 0.0;
        self.vy = 0.0;
        self.grounded = true;
    }

    /// Applies contact damage. Returns true when the hit was lethal, in which
    /// case the death penalty and respawn have already been applied.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        self.hp = (self.hp - amount).max(0);
        if self.hp > 0 {
            return false;
        }
        self.xp = self.xp * 95 / 100;
        self.teleport_to_spawn(self.map);
        self.hp = PLAYER_MAX_HP;
        true
    }

    /// Adds XP and converts every full threshold into a level, carrying the
    /// remainder. Returns the number of levels gained.
    pub fn gain_xp(&mut self, amount: u32) -> u32 {
        self.xp += amount;
        let mut gained = 0;
        while self.xp >= LEVEL_UP_XP {
            self.xp -= LEVEL_UP_XP;
            self.level += 1;
            gained += 1;
        }
        gained
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            pos: self.pos,
            yaw: self.yaw,
            hp: self.hp,
            gold: self.gold,
            xp: self.xp,
            level: self.level,
            color: self.color.clone(),
            accessories: self.accessories.clone(),
            form: self.form.clone(),
        }
    }
}
