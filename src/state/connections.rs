//! Registry of live WebSocket connections.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{dto::ws::ServerMessage, state::room::RoomCode};

/// Handle used to push messages to a connected client.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub is_host: bool,
    /// Room the connection is joined to, at most one.
    pub room: Option<RoomCode>,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
}

/// Identity fields of a connection, without its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionIdentity {
    pub display_name: Option<String>,
    pub is_host: bool,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly opened socket. It has no identity or room until it joins.
    pub fn register(&self, id: Uuid, tx: mpsc::UnboundedSender<ServerMessage>) {
        self.connections.insert(
            id,
            Connection {
                id,
                display_name: None,
                is_host: false,
                room: None,
                tx,
            },
        );
    }

    /// Record identity and room membership, returning the room the connection was in before.
    pub fn join_room(
        &self,
        id: &Uuid,
        room: RoomCode,
        display_name: Option<String>,
        is_host: bool,
    ) -> Option<RoomCode> {
        let mut connection = self.connections.get_mut(id)?;
        connection.display_name = display_name;
        connection.is_host = is_host;
        connection.room.replace(room)
    }

    /// Forget the room membership, but only if it still points at `room`.
    pub fn leave_room(&self, id: &Uuid, room: &RoomCode) -> bool {
        match self.connections.get_mut(id) {
            Some(mut connection) if connection.room.as_ref() == Some(room) => {
                connection.room = None;
                true
            }
            _ => false,
        }
    }

    /// Drop a closed socket, returning the room it has to be removed from.
    pub fn unregister(&self, id: &Uuid) -> Option<RoomCode> {
        self.connections
            .remove(id)
            .and_then(|(_, connection)| connection.room)
    }

    pub fn get(&self, id: &Uuid) -> Option<Connection> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    pub fn identity(&self, id: &Uuid) -> Option<ConnectionIdentity> {
        self.connections.get(id).map(|entry| ConnectionIdentity {
            display_name: entry.display_name.clone(),
            is_host: entry.is_host,
        })
    }

    pub fn is_host(&self, id: &Uuid) -> bool {
        self.connections
            .get(id)
            .is_some_and(|entry| entry.is_host)
    }

    pub fn current_room(&self, id: &Uuid) -> Option<RoomCode> {
        self.connections.get(id).and_then(|entry| entry.room.clone())
    }

    pub fn sender(&self, id: &Uuid) -> Option<mpsc::UnboundedSender<ServerMessage>> {
        self.connections.get(id).map(|entry| entry.tx.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
