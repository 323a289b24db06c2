//! Command-line configuration for the server process.

use crate::error::ServerError;
use crate::world::WorldConfig;
use clap::Parser;
use std::time::Duration;

/// Largest accepted `--max-delta-ms`. A dashing player covers 25 m/s, so
/// longer steps could carry them through a wall.
pub const MAX_DELTA_CEILING_MS: u64 = 50;

/// Authoritative arena/maze game server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,
    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3001)]
    pub port: u16,
    /// Simulation tick rate (updates per second)
    #[arg(short, long, default_value_t = shared::TICK_RATE)]
    pub tick_rate: u32,
    /// World snapshot broadcast rate (snapshots per second)
    #[arg(short, long, default_value_t = shared::BROADCAST_RATE)]
    pub broadcast_rate: u32,
    /// Maximum number of concurrent connections
    #[arg(long, default_value_t = 64)]
    pub max_clients: usize,
    /// Seed for maze layout and AI randomness; random when omitted
    #[arg(long)]
    pub seed: Option<u64>,
    /// Upper bound for a single tick's delta time, in milliseconds (1 to 50)
    #[arg(long, default_value_t = MAX_DELTA_CEILING_MS)]
    pub max_delta_ms: u64,
    /// Outgoing messages buffered per connection before new ones are dropped
    #[arg(long, default_value_t = 256)]
    pub send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tick_rate: shared::TICK_RATE,
            broadcast_rate: shared::BROADCAST_RATE,
            max_clients: 64,
            seed: None,
            max_delta_ms: MAX_DELTA_CEILING_MS,
            send_queue: 256,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.tick_rate == 0 {
            return Err(ServerError::Config("tick rate must be positive".into()));
        }
        if self.broadcast_rate == 0 {
            return Err(ServerError::Config("broadcast rate must be positive".into()));
        }
        if self.broadcast_rate > self.tick_rate {
            return Err(ServerError::Config(format!(
                "broadcast rate {} exceeds tick rate {}",
                self.broadcast_rate, self.tick_rate
            )));
        }
        if self.max_clients == 0 {
            return Err(ServerError::Config("max clients must be positive".into()));
        }
        if self.max_delta_ms == 0 {
            return Err(ServerError::Config("max delta must be positive".into()));
        }
        if self.max_delta_ms > MAX_DELTA_CEILING_MS {
            return Err(ServerError::Config(format!(
                "max delta {} ms exceeds {} ms",
                self.max_delta_ms, MAX_DELTA_CEILING_MS
            )));
        }
        if self.send_queue == 0 {
            return Err(ServerError::Config("send queue must hold at least one message".into()));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }

    pub fn broadcast_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.broadcast_rate as f64)
    }

    pub fn max_delta(&self) -> f32 {
        self.max_delta_ms as f32 / 1000.0
    }

    pub fn world_config(&self) -> WorldConfig {
        WorldConfig {
            seed: self.seed,
            ..WorldConfig::default()
        }
    }
}
