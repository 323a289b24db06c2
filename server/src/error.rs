//! Error types for the server.
//!
//! Only start-up problems are fatal. Protocol problems never become errors:
//! they are dropped where they are decoded.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a `change_map` request was refused. The `Display` text is the
/// `reason` sent back to the client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapChangeError {
    #[error("Mapa inválido (debe estar entre 1 y {max})")]
    OutOfRange { max: u32 },
    #[error("Nivel insuficiente (requiere nivel {required})")]
    LevelTooLow { required: u32 },
    #[error("Jugador desconocido")]
    UnknownPlayer,
}
