//! Ordered registry of connected sessions

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::config::DeliveryPolicy;
use crate::handler::ConnectionHandler;

/// One accepted connection as seen by the server task
pub(crate) struct Session {
    pub id: u64,
    pub peer: SocketAddr,
    /// Bytes queued here are written to the socket by the session task
    outbound: mpsc::UnboundedSender<Bytes>,
    pub handler: ConnectionHandler,
}

impl Session {
    pub fn new(
        id: u64,
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<Bytes>,
        handler: ConnectionHandler,
    ) -> Self {
        Self {
            id,
            peer,
            outbound,
            handler,
        }
    }

    fn send(&self, data: Bytes) -> bool {
        self.outbound.send(data).is_ok()
    }
}

/// Sessions in connection order; the first one is the designated recipient
#[derive(Default)]
pub(crate) struct ClientRegistry {
    sessions: Vec<Session>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, session: Session) {
        self.sessions.push(session);
    }

    pub fn remove(&mut self, id: u64) -> Option<Session> {
        let pos = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(pos))
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn peers(&self) -> Vec<SocketAddr> {
        self.sessions.iter().map(|s| s.peer).collect()
    }

    /// Queue a line for the recipients selected by `policy`.
    ///
    /// Returns how many sessions it was queued for.
    pub fn deliver(&self, policy: DeliveryPolicy, data: Bytes) -> usize {
        match policy {
            DeliveryPolicy::FirstClient => self
                .sessions
                .first()
                .map_or(0, |s| usize::from(s.send(data))),
            DeliveryPolicy::AllClients => self
                .sessions
                .iter()
                .filter(|s| s.send(data.clone()))
                .count(),
        }
    }
}
