//! JSON message envelopes exchanged over a client connection.
//!
//! Every message is an object with a `type` discriminator. Client messages
//! are decoded leniently: unknown types and malformed JSON produce `None`
//! from [`ClientMessage::parse`] and are dropped by the server without reply.

use serde::{Deserialize, Serialize};

use crate::{lenient, Vec3, Wall};

/// Latest control state sent by a client. Replaces the previous state wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputState {
    #[serde(deserialize_with = "lenient::truthy")]
    pub up: bool,
    #[serde(deserialize_with = "lenient::truthy")]
    pub down: bool,
    #[serde(deserialize_with = "lenient::truthy")]
    pub left: bool,
    #[serde(deserialize_with = "lenient::truthy")]
    pub right: bool,
    #[serde(deserialize_with = "lenient::truthy")]
    pub attack: bool,
    #[serde(deserialize_with = "lenient::truthy")]
    pub jump: bool,
    #[serde(deserialize_with = "lenient::truthy")]
    pub dash: bool,
    #[serde(deserialize_with = "lenient::finite_f32", skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f32>,
    #[serde(deserialize_with = "lenient::finite_f32", skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
}

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
        accessories: Option<Vec<String>>,
        #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
        form: Option<String>,
    },
    Input {
        #[serde(default, deserialize_with = "lenient::input", skip_serializing_if = "Option::is_none")]
        input: Option<InputState>,
    },
    HitEnemy {
        #[serde(rename = "enemyId", default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
        enemy_id: Option<String>,
        #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
        damage: Option<f64>,
    },
    ChangeMap {
        #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
        map: Option<f64>,
    },
}

impl ClientMessage {
    /// Decodes one text frame. Malformed JSON, non-objects and unknown
    /// message types all yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Messages sent from server to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        id: String,
        snapshot: WorldSnapshot,
    },
    WorldState(WorldSnapshot),
    EnemyHp {
        #[serde(rename = "enemyId")]
        enemy_id: String,
        hp: i32,
    },
    EnemyDied {
        #[serde(rename = "enemyId")]
        enemy_id: String,
    },
    SpawnPoint {
        pos: PlanarPos,
        visible: bool,
    },
    MapChanged {
        pos: Vec3,
        map: u32,
    },
    ChangeMapDenied {
        reason: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarPos {
    pub x: f32,
    pub z: f32,
}

/// Complete description of every live entity, sent at the broadcast rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Unix time in milliseconds when the snapshot was taken.
    pub t: u64,
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub coins: Vec<CoinSnapshot>,
    pub walls: Vec<Wall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: String,
    pub name: String,
    pub pos: Vec3,
    pub yaw: f32,
    pub hp: i32,
    pub gold: u32,
    pub xp: u32,
    pub level: u32,
    pub color: String,
    pub accessories: Vec<String>,
    pub form: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: String,
    pub pos: Vec3,
    pub yaw: f32,
    pub hp: i32,
    pub map: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSnapshot {
    pub id: String,
    pub pos: Vec3,
    pub value: u32,
}
