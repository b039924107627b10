//! Handshake/reconnect state machine and the three-way session map (§4.4,
//! §9 "Session map"). Bundled into one `SessionTable` type so the invariant
//! "`connection_id <-> client_id <-> token` all agree" can't be broken by a
//! partial update from one call site.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ecsnet_shared::ids::{ClientId, ConnectionId};
use ecsnet_shared::view::ClientView;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("connection {0} has no session")]
    UnknownConnection(ConnectionId),
    #[error("client {0} has no session")]
    UnknownClient(ClientId),
}

/// One connection's position in the handshake lifecycle (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    PendingHandshake,
    Active,
    Disconnected,
    Retired,
}

pub struct Session {
    pub client_id: ClientId,
    pub connection: Option<ConnectionId>,
    pub token: u32,
    pub state: ConnState,
    pub view: ClientView,
    grace_deadline: Option<Instant>,
}

impl Session {
    fn fresh(client_id: ClientId, connection: ConnectionId, token: u32) -> Self {
        Self {
            client_id,
            connection: Some(connection),
            token,
            state: ConnState::Active,
            view: ClientView::new(),
            grace_deadline: None,
        }
    }
}

/// The three maps of §9's "Session map" design note, plus the token generator,
/// rolled into one type.
#[derive(Default)]
pub struct SessionTable {
    next_client_id: u16,
    connection_to_client: HashMap<ConnectionId, ClientId>,
    sessions: HashMap<ClientId, Session>,
}

fn nonzero_token() -> u32 {
    loop {
        let token = fastrand::u32(..);
        if token != 0 {
            return token;
        }
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Session> {
        self.sessions.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: ClientId) -> Option<&mut Session> {
        self.sessions.get_mut(&client_id)
    }

    pub fn client_for_connection(&self, connection: ConnectionId) -> Option<ClientId> {
        self.connection_to_client.get(&connection).copied()
    }

    pub fn active_client_ids(&self) -> Vec<ClientId> {
        self.sessions
            .iter()
            .filter(|(_, s)| s.state == ConnState::Active)
            .map(|(id, _)| *id)
            .collect()
    }

    /// First message is MSG_RECONNECT with token `0`: allocate a new logical
    /// client, enter `Active`.
    pub fn admit_new_client(&mut self, connection: ConnectionId) -> (ClientId, u32) {
        let client_id = ClientId(self.next_client_id);
        self.next_client_id += 1;
        let token = nonzero_token();
        self.connection_to_client.insert(connection, client_id);
        self.sessions
            .insert(client_id, Session::fresh(client_id, connection, token));
        (client_id, token)
    }

    /// First message is MSG_RECONNECT with a nonzero token matching a
    /// `Disconnected` session whose grace timer has not fired: rebind it to the
    /// new connection and rotate the token.
    pub fn try_reconnect(&mut self, connection: ConnectionId, token: u32, now: Instant) -> Option<(ClientId, u32)> {
        let client_id = self.sessions.iter().find_map(|(id, s)| {
            (s.state == ConnState::Disconnected && s.token == token).then_some(*id)
        })?;
        let session = self.sessions.get_mut(&client_id)?;
        if session.grace_deadline.map(|d| now >= d).unwrap_or(true) {
            return None;
        }
        let new_token = nonzero_token();
        session.connection = Some(connection);
        session.token = new_token;
        session.state = ConnState::Active;
        session.grace_deadline = None;
        self.connection_to_client.insert(connection, client_id);
        Some((client_id, new_token))
    }

    /// Transport close while `Active`: move to `Disconnected` with a grace
    /// deadline, or straight to `Retired` if reconnect is disabled.
    pub fn disconnect(&mut self, connection: ConnectionId, reconnect_window: Duration, now: Instant) -> Option<ClientId> {
        let client_id = self.connection_to_client.remove(&connection)?;
        let session = self.sessions.get_mut(&client_id)?;
        session.connection = None;
        if reconnect_window.is_zero() {
            session.state = ConnState::Retired;
            self.sessions.remove(&client_id);
        } else {
            session.state = ConnState::Disconnected;
            session.grace_deadline = Some(now + reconnect_window);
        }
        Some(client_id)
    }

    /// Retires every `Disconnected` session whose grace deadline has passed;
    /// returns the retired client ids so the caller can fire `onDisconnect`.
    pub fn poll_timeouts(&mut self, now: Instant) -> Vec<ClientId> {
        let expired: Vec<ClientId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.state == ConnState::Disconnected && s.grace_deadline.map(|d| now >= d).unwrap_or(false))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.sessions.remove(id);
        }
        expired
    }

    /// Cancels all grace timers and clears every session (§5 `stop()`).
    pub fn clear(&mut self) {
        self.connection_to_client.clear();
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_within_window_preserves_client_id() {
        let mut table = SessionTable::new();
        let now = Instant::now();
        let (client_id, token) = table.admit_new_client(1);
        table.disconnect(1, Duration::from_millis(30_000), now);

        let (reconnected_id, new_token) = table
            .try_reconnect(2, token, now + Duration::from_millis(1))
            .expect("reconnect should succeed within the grace window");
        assert_eq!(reconnected_id, client_id);
        assert_ne!(new_token, token);
    }

    #[test]
    fn expired_token_after_rotation_is_rejected() {
        let mut table = SessionTable::new();
        let now = Instant::now();
        let (_, token) = table.admit_new_client(1);
        table.disconnect(1, Duration::from_millis(30_000), now);
        table.try_reconnect(2, token, now).unwrap();

        assert!(table.try_reconnect(3, token, now).is_none());
    }

    #[test]
    fn disconnect_with_zero_window_retires_immediately() {
        let mut table = SessionTable::new();
        let now = Instant::now();
        let (client_id, _) = table.admit_new_client(1);
        table.disconnect(1, Duration::ZERO, now);
        assert!(table.get(client_id).is_none());
    }

    #[test]
    fn poll_timeouts_retires_past_deadline_only() {
        let mut table = SessionTable::new();
        let now = Instant::now();
        let (client_id, _) = table.admit_new_client(1);
        table.disconnect(1, Duration::from_millis(100), now);

        assert!(table.poll_timeouts(now + Duration::from_millis(50)).is_empty());
        let retired = table.poll_timeouts(now + Duration::from_millis(150));
        assert_eq!(retired, vec![client_id]);
    }
}
