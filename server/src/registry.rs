//! Registry of authenticated students waiting for or taking the exam
//!
//! The registry is plain data; the server keeps it behind one mutex so that
//! registration, removal and snapshots never observe a half-updated roster.

use log::{info, warn};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

/// Upper bound on simultaneously registered students
pub const MAX_STUDENTS: usize = 100;

/// A student session that passed login
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredClient {
    /// Connection identity assigned when the socket was accepted
    pub session_id: u32,
    pub roll: String,
    pub addr: SocketAddr,
    pub registered_at: Instant,
}

/// Connected students keyed by session id
///
/// Session ids grow monotonically, so iteration order is registration order
/// and removing one entry leaves the relative order of the rest untouched.
#[derive(Debug)]
pub struct ClientRegistry {
    clients: BTreeMap<u32, RegisteredClient>,
    max_clients: usize,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(MAX_STUDENTS)
    }
}

impl ClientRegistry {
    /// Empty registry that refuses registrations beyond `max_clients`.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            max_clients,
        }
    }

    /// Adds a session. Returns false when the roster is full or the session
    /// is already registered.
    pub fn register(&mut self, session_id: u32, roll: &str, addr: SocketAddr) -> bool {
        if self.clients.len() >= self.max_clients {
            warn!("Registry full, refusing roll {} from {}", roll, addr);
            return false;
        }
        if self.clients.contains_key(&session_id) {
            return false;
        }
        if self.clients.values().any(|c| c.roll == roll) {
            warn!("Roll {} is already registered on another connection", roll);
        }

        self.clients.insert(
            session_id,
            RegisteredClient {
                session_id,
                roll: roll.to_string(),
                addr,
                registered_at: Instant::now(),
            },
        );
        info!(
            "Student {} registered from {} (session {}), {} registered",
            roll,
            addr,
            session_id,
            self.clients.len()
        );
        true
    }

    /// Removes a session. Safe to call for sessions that never registered.
    pub fn deregister(&mut self, session_id: u32) -> bool {
        if let Some(client) = self.clients.remove(&session_id) {
            info!(
                "Student {} deregistered (session {}), {} remaining",
                client.roll,
                session_id,
                self.clients.len()
            );
            true
        } else {
            false
        }
    }

    /// Ordered copy of every registered session
    pub fn snapshot(&self) -> Vec<RegisteredClient> {
        self.clients.values().cloned().collect()
    }

    #[cfg(test)]
    pub fn contains(&self, session_id: u32) -> bool {
        self.clients.contains_key(&session_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
