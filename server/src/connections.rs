//! Connection tracking for participants talking to the arena server
//!
//! This module maps UDP peers onto participant ids:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Activity tracking so silent peers are dropped
//! - Capacity limits and address lookup for outbound packets
//!
//! Match state lives in the lifecycle controller. A connection only knows
//! where to send packets and when it was last heard from.

use log::info;
use shared::ParticipantId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Seconds of silence before a participant is considered gone
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// One connected participant's network endpoint
#[derive(Debug)]
pub struct Connection {
    /// Participant id assigned by the server
    pub id: ParticipantId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Name shown to other participants
    pub display_name: String,
    /// Last time we received any packet from this peer
    pub last_seen: Instant,
}

impl Connection {
    pub fn new(id: ParticipantId, addr: SocketAddr, display_name: String) -> Self {
        Self {
            id,
            addr,
            display_name,
            last_seen: Instant::now(),
        }
    }

    /// Marks the peer as active
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing arrived from this peer within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All live connections, keyed by participant id
///
/// Enforces the server's capacity limit and hands out ids starting at 1.
/// Ids are never reused while the server runs, so a stale packet from a
/// dropped peer can never be attributed to a newcomer.
pub struct ConnectionTable {
    /// Connected peers indexed by participant id
    connections: HashMap<ParticipantId, Connection>,
    /// Next id for a new connection
    next_id: u32,
    /// Maximum number of concurrent participants
    max_connections: usize,
    timeout: Duration,
}

impl ConnectionTable {
    /// Creates an empty table with the given capacity and the default timeout
    pub fn new(max_connections: usize) -> Self {
        Self::with_timeout(max_connections, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(max_connections: usize, timeout: Duration) -> Self {
        Self {
            connections: HashMap::new(),
            next_id: 1,
            max_connections,
            timeout,
        }
    }

    /// Attempts to register a new peer
    ///
    /// Returns the assigned participant id, or None if the server is at
    /// capacity.
    pub fn add(&mut self, addr: SocketAddr, display_name: String) -> Option<ParticipantId> {
        if self.connections.len() >= self.max_connections {
            return None;
        }

        let id = ParticipantId(self.next_id);
        self.next_id += 1;

        info!("{} ({}) connected from {}", id, display_name, addr);
        self.connections
            .insert(id, Connection::new(id, addr, display_name));
        Some(id)
    }

    /// Removes a peer, returning true if it was connected
    pub fn remove(&mut self, id: ParticipantId) -> bool {
        if let Some(connection) = self.connections.remove(&id) {
            info!("{} disconnected from {}", connection.id, connection.addr);
            true
        } else {
            false
        }
    }

    /// Finds the participant connected from `addr`
    ///
    /// Used to attribute incoming packets to a participant.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<ParticipantId> {
        self.connections
            .values()
            .find(|connection| connection.addr == addr)
            .map(|connection| connection.id)
    }

    pub fn addr_of(&self, id: ParticipantId) -> Option<SocketAddr> {
        self.connections.get(&id).map(|connection| connection.addr)
    }

    pub fn display_name(&self, id: ParticipantId) -> Option<&str> {
        self.connections
            .get(&id)
            .map(|connection| connection.display_name.as_str())
    }

    /// Refreshes the activity timestamp; false for unknown ids
    pub fn touch(&mut self, id: ParticipantId) -> bool {
        match self.connections.get_mut(&id) {
            Some(connection) => {
                connection.touch();
                true
            }
            None => false,
        }
    }

    /// Removes every peer silent for longer than the timeout
    ///
    /// Returns the removed ids so the match can drop them too.
    pub fn check_timeouts(&mut self) -> Vec<ParticipantId> {
        let timed_out: Vec<ParticipantId> = self
            .connections
            .values()
            .filter(|connection| connection.is_timed_out(self.timeout))
            .map(|connection| connection.id)
            .collect();

        for id in &timed_out {
            self.remove(*id);
        }

        timed_out
    }

    /// Every participant id and address, for broadcasting
    pub fn addrs(&self) -> Vec<(ParticipantId, SocketAddr)> {
        self.connections
            .values()
            .map(|connection| (connection.id, connection.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_connection_timeout() {
        let mut connection = Connection::new(ParticipantId(1), test_addr(), "a".to_string());
        assert!(!connection.is_timed_out(Duration::from_secs(1)));

        connection.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(connection.is_timed_out(Duration::from_secs(1)));

        connection.touch();
        assert!(!connection.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_table_creation() {
        let table = ConnectionTable::new(5);
        assert_eq!(table.max_connections, 5);
        assert_eq!(table.timeout, DEFAULT_TIMEOUT);
        assert!(table.is_empty());
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut table = ConnectionTable::new(3);
        let first = table.add(test_addr(), "a".to_string()).unwrap();
        let second = table.add(test_addr2(), "b".to_string()).unwrap();

        assert_eq!(first, ParticipantId(1));
        assert_eq!(second, ParticipantId(2));
        assert_eq!(table.len(), 2);
        assert_eq!(table.display_name(second), Some("b"));
    }

    #[test]
    fn test_add_at_capacity() {
        let mut table = ConnectionTable::new(1);
        assert!(table.add(test_addr(), "a".to_string()).is_some());
        assert!(table.add(test_addr2(), "b".to_string()).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_ids_not_reused() {
        let mut table = ConnectionTable::new(1);
        let first = table.add(test_addr(), "a".to_string()).unwrap();
        assert!(table.remove(first));
        assert!(!table.remove(first));

        let second = table.add(test_addr(), "a".to_string()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_find_by_addr() {
        let mut table = ConnectionTable::new(2);
        let id = table.add(test_addr(), "a".to_string()).unwrap();

        assert_eq!(table.find_by_addr(test_addr()), Some(id));
        assert_eq!(table.addr_of(id), Some(test_addr()));

        let unknown: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(table.find_by_addr(unknown), None);
    }

    #[test]
    fn test_check_timeouts_removes_silent_peers() {
        let mut table = ConnectionTable::with_timeout(2, Duration::from_secs(1));
        let stale = table.add(test_addr(), "a".to_string()).unwrap();
        let fresh = table.add(test_addr2(), "b".to_string()).unwrap();

        if let Some(connection) = table.connections.get_mut(&stale) {
            connection.last_seen = Instant::now() - Duration::from_secs(3);
        }

        assert_eq!(table.check_timeouts(), vec![stale]);
        assert_eq!(table.addrs(), vec![(fresh, test_addr2())]);
        assert!(!table.touch(stale));
        assert!(table.touch(fresh));
    }
}
