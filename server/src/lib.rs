//! # Maze Arena Server Library
//!
//! Authoritative server for a browser-based multiplayer arena and maze game.
//! Clients connect over WebSocket, send their inputs and hit reports as JSON
//! and receive periodic world snapshots plus discrete events (enemy health,
//! deaths, respawn telegraphs, map changes).
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Player movement, enemy AI, contact damage, coin pickup, experience and
//! map access are all decided here. Clients only ever describe intent: which
//! keys are held, where the camera points, which enemy they believe they hit.
//!
//! ### Client Management
//! Each connection gets a numeric id and a bounded outbound queue. A client
//! that reads too slowly loses messages instead of stalling the simulation.
//!
//! ### State Broadcasting
//! Snapshots go out at a lower rate than the simulation tick. Events such as
//! `enemy_hp` or `enemy_died` are sent as soon as the tick or message that
//! caused them has been processed.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Event Loop
//! Game state lives in one [`world::World`] owned by the task running
//! [`network::Server::run`]. Connection tasks forward decoded frames through
//! a channel, so no game data is ever shared behind a lock.
//!
//! ### Explicit Time
//! The world never reads a clock. Every operation takes `now_ms` and ticks
//! take `dt`, which is what lets the tests drive cooldowns and respawns
//! deterministically.
//!
//! ## Module Organization
//!
//! - [`world`]: the world container, tick ordering and snapshots
//! - [`player`]: player movement, dash, jump, damage and levelling
//! - [`enemy`]: enemy steering and stuck recovery
//! - [`combat`]: hit reports, enemy death and respawn, map changes, coins
//! - [`collision`]: walls, safe zones and the spawn obstacle
//! - [`geometry`]: map layout, maze generation and the arena
//! - [`client_manager`] and [`network`]: connections and the server loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         host: "127.0.0.1".to_string(),
//!         port: 3001,
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::bind(config.clone(), config.world_config()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Security Considerations
//!
//! Hit reports are trusted: there is no range or line-of-sight validation,
//! only a per-enemy rate limit. Movement, damage taken and map access are
//! fully server-side.

pub mod client_manager;
pub mod collision;
pub mod combat;
pub mod config;
pub mod enemy;
pub mod error;
pub mod geometry;
pub mod network;
pub mod player;
pub mod utils;
pub mod world;
