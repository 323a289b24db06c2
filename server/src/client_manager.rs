//! Connected client bookkeeping and best-effort outbound delivery.
//!
//! Every connection owns a bounded queue drained by its writer task. The
//! simulation never waits on a client: sends use `try_send`, and a full or
//! closed queue costs that one client the message and nothing else.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::tungstenite::Message;

/// A connected client and the handle used to reach its writer task.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Remote address of the connection
    pub addr: SocketAddr,
    pub connected_at: Instant,
    /// Outbound queue consumed by the connection's writer task
    pub sender: mpsc::Sender<Message>,
    /// Messages discarded because the queue was full
    pub dropped_messages: u64,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
            dropped_messages: 0,
        }
    }

    /// Queues a message without waiting. Returns false if it was dropped.
    pub fn send(&mut self, message: Message) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_messages += 1;
                if self.dropped_messages == 1 || self.dropped_messages % 100 == 0 {
                    warn!(
                        "Client {} is not keeping up, {} messages dropped",
                        self.id, self.dropped_messages
                    );
                }
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Client {} writer has closed", self.id);
                false
            }
        }
    }
}

/// Tracks all connected clients and enforces the connection limit.
///
/// Client IDs start from 1 and are never reused within one server run.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a connection. Returns `None` when the server is full.
    pub fn add_client(&mut self, addr: SocketAddr, sender: mpsc::Sender<Message>) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr, sender));
        Some(client_id)
    }

    /// Forgets a client. Dropping its sender lets the writer task finish.
    pub fn remove_client(&mut self, client_id: u32) -> bool {
        if let Some(client) = self.clients.remove(&client_id) {
            info!(
                "Client {} disconnected after {:.1}s",
                client.id,
                client.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    pub fn send_to(&mut self, client_id: u32, message: Message) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => client.send(message),
            None => false,
        }
    }

    /// Offers `message` to every client. Returns how many accepted it.
    pub fn broadcast(&mut self, message: &Message) -> usize {
        let mut delivered = 0;
        for client in self.clients.values_mut() {
            if client.send(message.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn client(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080)
    }

    fn test_addr2() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8081)
    }

    fn text(s: &str) -> Message {
        Message::Text(s.to_string())
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(10);
        assert_eq!(manager.len(), 0);
        assert!(manager.is_empty());
        assert_eq!(manager.max_clients(), 10);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(10);
        let (tx, _rx) = mpsc::channel(4);

        assert_eq!(manager.add_client(test_addr(), tx.clone()), Some(1));
        assert_eq!(manager.add_client(test_addr2(), tx), Some(2));
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.client(2).map(|c| c.addr), Some(test_addr2()));
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::channel(4);

        assert!(manager.add_client(test_addr(), tx.clone()).is_some());
        assert!(manager.add_client(test_addr2(), tx.clone()).is_some());
        assert_eq!(manager.add_client(test_addr(), tx.clone()), None);
        assert_eq!(manager.len(), 2);

        // Freed slots are reusable, ids are not.
        assert!(manager.remove_client(1));
        assert_eq!(manager.add_client(test_addr(), tx), Some(3));
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new(10);
        assert!(!manager.remove_client(999));
    }

    #[test]
    fn test_send_to_client() {
        let mut manager = ClientManager::new(10);
        let (tx, mut rx) = mpsc::channel(4);
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.send_to(id, text("hello")));
        assert_eq!(tokio_test::block_on(rx.recv()), Some(text("hello")));
        assert!(!manager.send_to(id + 1, text("nobody")));
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let mut manager = ClientManager::new(10);
        let (tx, mut rx) = mpsc::channel(1);
        let id = manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.send_to(id, text("first")));
        assert!(!manager.send_to(id, text("second")));
        assert_eq!(manager.client(id).unwrap().dropped_messages, 1);

        assert_eq!(rx.try_recv().unwrap(), text("first"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_isolates_dead_clients() {
        let mut manager = ClientManager::new(10);
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, rx2) = mpsc::channel(4);
        let (tx3, mut rx3) = mpsc::channel(4);
        manager.add_client(test_addr(), tx1);
        manager.add_client(test_addr2(), tx2);
        manager.add_client(test_addr(), tx3);
        drop(rx2);

        let delivered = manager.broadcast(&text("state"));
        assert_eq!(delivered, 2);
        assert_eq!(rx1.try_recv().unwrap(), text("state"));
        assert_eq!(rx3.try_recv().unwrap(), text("state"));
    }
}
