//! Server network layer: WebSocket connections and the simulation loop.
//!
//! Connection tasks only move bytes. Everything that touches game state
//! happens on the task running [`Server::run`], which reacts to
//! [`NetworkEvent`]s and to two timers: the simulation tick and the slower
//! snapshot broadcast.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::utils::now_ms;
use crate::world::{Outgoing, World, WorldConfig};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Log tick statistics this often.
const STATS_EVERY_TICKS: u64 = 300;

/// Messages sent from connection tasks to the simulation loop
#[derive(Debug)]
pub enum NetworkEvent {
    /// A WebSocket handshake completed. The loop answers on `reply` with the
    /// assigned client id, or `None` when the server is full.
    NewConnection {
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
        reply: oneshot::Sender<Option<u32>>,
    },
    ClientText {
        client_id: u32,
        text: String,
    },
    ClientDisconnect {
        client_id: u32,
    },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    clients: ClientManager,
    world: World,
    events_tx: mpsc::UnboundedSender<NetworkEvent>,
    events_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl Server {
    /// Validates the configuration, builds the world and binds the listener.
    pub async fn bind(config: ServerConfig, world_config: WorldConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(config.max_clients),
            world: World::new(world_config),
            config,
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Accepts TCP connections until the listener fails.
    async fn accept_loop(listener: TcpListener, events_tx: mpsc::UnboundedSender<NetworkEvent>, queue: usize) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    tokio::spawn(Self::handle_connection(stream, addr, events_tx.clone(), queue));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            }
            if events_tx.is_closed() {
                break;
            }
        }
    }

    /// Upgrades one TCP stream, registers it and pumps frames both ways until
    /// either side closes.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        events_tx: mpsc::UnboundedSender<NetworkEvent>,
        queue: usize,
    ) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake with {} failed: {}", addr, e);
                return;
            }
        };
        let (mut write, mut read) = ws_stream.split();

        let (sender, mut outbound) = mpsc::channel::<Message>(queue);
        let (reply_tx, reply_rx) = oneshot::channel();
        if events_tx
            .send(NetworkEvent::NewConnection {
                addr,
                sender,
                reply: reply_tx,
            })
            .is_err()
        {
            return;
        }

        let client_id = match reply_rx.await {
            Ok(Some(id)) => id,
            _ => {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
        };

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                if write.send(message).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        while let Some(frame) = read.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        debug!("Dropping non UTF-8 binary frame from client {}", client_id);
                        continue;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Connection error from client {}: {}", client_id, e);
                    break;
                }
            };
            if events_tx.send(NetworkEvent::ClientText { client_id, text }).is_err() {
                break;
            }
        }

        let _ = events_tx.send(NetworkEvent::ClientDisconnect { client_id });
        // The writer exits once the loop drops this client's sender.
        if let Err(e) = writer.await {
            error!("Writer task for client {} failed: {}", client_id, e);
        }
    }

    /// Applies one event from a connection task.
    pub fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::NewConnection {
                addr,
                sender,
                reply,
            } => {
                let client_id = self.clients.add_client(addr, sender);
                match client_id {
                    Some(id) => {
                        self.world.add_player(id, now_ms());
                        self.flush_outbox();
                    }
                    None => warn!(
                        "Rejecting connection from {}: server full ({} clients)",
                        addr,
                        self.clients.max_clients()
                    ),
                }
                if reply.send(client_id).is_err() {
                    if let Some(id) = client_id {
                        self.drop_client(id);
                    }
                }
            }
            NetworkEvent::ClientText { client_id, text } => match ClientMessage::parse(&text) {
                Some(message) => {
                    self.world.handle_message(client_id, message, now_ms());
                    self.flush_outbox();
                }
                None => debug!("Dropping malformed message from client {}", client_id),
            },
            NetworkEvent::ClientDisconnect { client_id } => self.drop_client(client_id),
        }
    }

    fn drop_client(&mut self, client_id: u32) {
        self.clients.remove_client(client_id);
        self.world.remove_player(client_id);
    }

    /// Serializes each queued message once and hands it to the recipients.
    fn flush_outbox(&mut self) {
        for outgoing in self.world.drain_outbox() {
            match outgoing {
                Outgoing::Send { client_id, message } => {
                    if let Some(text) = encode(&message) {
                        self.clients.send_to(client_id, Message::Text(text));
                    }
                }
                Outgoing::Broadcast(message) => {
                    if let Some(text) = encode(&message) {
                        self.clients.broadcast(&Message::Text(text));
                    }
                }
            }
        }
    }

    fn broadcast_world_state(&mut self) {
        if self.clients.is_empty() {
            return;
        }
        let message = ServerMessage::WorldState(self.world.snapshot(now_ms()));
        if let Some(text) = encode(&message) {
            self.clients.broadcast(&Message::Text(text));
        }
    }

    /// Main server loop. Runs until the surrounding task is dropped.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| ServerError::Config("server is already running".into()))?;
        tokio::spawn(Self::accept_loop(
            listener,
            self.events_tx.clone(),
            self.config.send_queue,
        ));

        let mut tick_interval = interval(self.config.tick_period());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_interval = interval(self.config.broadcast_period());
        broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let max_dt = self.config.max_delta();
        let nominal_dt = (1.0 / self.config.tick_rate as f32).min(max_dt);
        let mut last_tick = Instant::now();

        info!(
            "Server started: {} Hz simulation, {} Hz snapshots",
            self.config.tick_rate, self.config.broadcast_rate
        );

        loop {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("Event channel closed, shutting down");
                        break;
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    if dt <= 0.0 {
                        dt = nominal_dt;
                    } else if dt > max_dt {
                        warn!("Large delta time detected ({:.3}s), capping to {:.3}s", dt, max_dt);
                        dt = max_dt;
                    }

                    self.world.tick(now_ms(), dt);
                    self.flush_outbox();

                    let tick = self.world.tick_count();
                    if tick % STATS_EVERY_TICKS == 0 {
                        debug!(
                            "Tick {}: {} clients, {} enemies, {} pending respawns, {:.1}Hz",
                            tick,
                            self.clients.len(),
                            self.world.enemies().len(),
                            self.world.pending_respawns().len(),
                            1.0 / dt
                        );
                    }
                },

                _ = broadcast_interval.tick() => self.broadcast_world_state(),
            }
        }

        Ok(())
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match message.to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to serialize outgoing message: {}", e);
            None
        }
    }
}
