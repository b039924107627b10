//! The per-tick orchestrator and handshake dispatcher (§4.4). Generic over the
//! ECS adapter (`NetServer<W: NetWorld>`), the same way the teacher's
//! `Server<E: Copy + Eq + Hash + Send + Sync>` is generic over its entity-id
//! type — the orchestrator has zero dependency on any concrete ECS.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use ecsnet_shared::differ::SnapshotDiffer;
use ecsnet_shared::ecs::NetWorld;
use ecsnet_shared::ids::{ClientId, ConnectionId, NetId};
use ecsnet_shared::registry::ComponentRegistry;
use ecsnet_shared::transport::Transport;
use ecsnet_shared::view::ClientDelta;
use ecsnet_shared::wire::{decode_message, encode_message, Encoder, Message};

use crate::applier::{apply_client_delta, ApplyOutcome, ValidatorSet};
use crate::config::ServerConfig;
use crate::session::SessionTable;

/// Handshake/lifecycle callbacks the host implements (§4.4). Keyed by the
/// logical `ClientId`, not the transport connection, since a reconnect rebinds
/// the same logical client to a new connection.
pub trait ServerHandler {
    fn on_connect(&mut self, client_id: ClientId);
    fn on_reconnect(&mut self, client_id: ClientId);
    fn on_disconnect(&mut self, client_id: ClientId);
    /// Any inbound byte pattern during `Active` that isn't a recognized
    /// protocol message (§4.4 "delivered to the host via an onMessage callback").
    fn on_message(&mut self, client_id: ClientId, bytes: &[u8]);
}

pub struct NetServer<W: NetWorld> {
    config: ServerConfig,
    sessions: SessionTable,
    differ: SnapshotDiffer<W::EntityId>,
    encoder: Encoder,
    validators: ValidatorSet,
}

impl<W: NetWorld> NetServer<W> {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            sessions: SessionTable::new(),
            differ: SnapshotDiffer::new(),
            encoder: Encoder::new(),
            validators: ValidatorSet::new(),
        }
    }

    pub fn validators_mut(&mut self) -> &mut ValidatorSet {
        &mut self.validators
    }

    pub fn active_client_ids(&self) -> Vec<ClientId> {
        self.sessions.active_client_ids()
    }

    fn build_full_message(&self, world: &W, registry: &ComponentRegistry) -> Message {
        let entities = self
            .differ
            .live_net_ids()
            .map(|net_id| {
                let entity = self
                    .differ
                    .entity_of(net_id)
                    .expect("live NetId must resolve to an entity");
                let components = world
                    .component_kinds(entity)
                    .into_iter()
                    .map(|kind| (kind, world.field_values(entity, kind)))
                    .collect();
                (net_id, components)
            })
            .collect();
        Message::Full {
            registry_hash: registry.hash(),
            entities,
        }
    }

    fn send_handshake_reply(
        &mut self,
        world: &W,
        registry: &ComponentRegistry,
        transport: &mut dyn Transport,
        connection: ConnectionId,
        client_id: ClientId,
        token: u32,
    ) {
        self.encoder.reset();
        encode_message(
            &mut self.encoder,
            registry,
            &Message::ClientId { client_id, token },
        );
        transport.send(connection, &self.encoder.finish());

        let full = self.build_full_message(world, registry);
        self.encoder.reset();
        encode_message(&mut self.encoder, registry, &full);
        transport.send(connection, &self.encoder.finish());

        if let Some(session) = self.sessions.get_mut(client_id) {
            session.view.init_known(self.differ.live_net_ids());
        }
        log::info!("client {client_id} handshake complete on connection {connection}");
    }

    /// Runs the handshake/session state machine, then dispatches active-state
    /// traffic. The single entry point for inbound bytes on any connection.
    pub fn handle_message(
        &mut self,
        world: &mut W,
        transport: &mut dyn Transport,
        handler: &mut dyn ServerHandler,
        connection: ConnectionId,
        bytes: &[u8],
    ) {
        if let Some(client_id) = self.sessions.client_for_connection(connection) {
            self.dispatch_active(world, transport, handler, client_id, bytes);
            return;
        }
        self.handle_handshake(world, transport, handler, connection, bytes);
    }

    fn handle_handshake(
        &mut self,
        world: &mut W,
        transport: &mut dyn Transport,
        handler: &mut dyn ServerHandler,
        connection: ConnectionId,
        bytes: &[u8],
    ) {
        let registry = world.registry().clone();
        let decoded = decode_message(bytes, &registry);

        match decoded {
            Ok(Message::Reconnect { token: 0 }) => {
                let (client_id, token) = self.sessions.admit_new_client(connection);
                self.send_handshake_reply(world, &registry, transport, connection, client_id, token);
                handler.on_connect(client_id);
            }
            Ok(Message::Reconnect { token }) => {
                match self.sessions.try_reconnect(connection, token, Instant::now()) {
                    Some((client_id, new_token)) => {
                        self.send_handshake_reply(world, &registry, transport, connection, client_id, new_token);
                        handler.on_reconnect(client_id);
                    }
                    None => {
                        let (client_id, new_token) = self.sessions.admit_new_client(connection);
                        self.send_handshake_reply(world, &registry, transport, connection, client_id, new_token);
                        handler.on_connect(client_id);
                    }
                }
            }
            _ => {
                let (client_id, token) = self.sessions.admit_new_client(connection);
                self.send_handshake_reply(world, &registry, transport, connection, client_id, token);
                handler.on_connect(client_id);
                self.dispatch_active(world, transport, handler, client_id, bytes);
            }
        }
    }

    fn dispatch_active(
        &mut self,
        world: &mut W,
        transport: &mut dyn Transport,
        handler: &mut dyn ServerHandler,
        client_id: ClientId,
        bytes: &[u8],
    ) {
        let registry = world.registry().clone();
        match decode_message(bytes, &registry) {
            Ok(Message::ClientDelta(body)) => {
                let outcomes = apply_client_delta(
                    world,
                    &self.differ,
                    &registry,
                    self.config.owner_component.as_ref(),
                    &self.validators,
                    client_id,
                    &body,
                );
                for outcome in &outcomes {
                    if *outcome != ApplyOutcome::Accepted {
                        log::warn!("client {client_id} client-delta entry rejected: {outcome:?}");
                    }
                }
            }
            Ok(Message::RequestFull) => {
                log::debug!("client {client_id} requested a full resync");
                let connection = self.sessions.get(client_id).and_then(|s| s.connection);
                let Some(connection) = connection else { return };
                let full = self.build_full_message(world, &registry);
                self.encoder.reset();
                encode_message(&mut self.encoder, &registry, &full);
                transport.send(connection, &self.encoder.finish());
                if let Some(session) = self.sessions.get_mut(client_id) {
                    session.view.init_known(self.differ.live_net_ids());
                }
            }
            _ => handler.on_message(client_id, bytes),
        }
    }

    pub fn handle_open(&mut self, connection: ConnectionId) {
        log::debug!("connection {connection} opened, awaiting handshake");
    }

    pub fn handle_close(&mut self, connection: ConnectionId, handler: &mut dyn ServerHandler) {
        let now = Instant::now();
        let Some(client_id) = self.sessions.disconnect(connection, self.config.reconnect_window, now) else {
            return;
        };
        if self.config.reconnect_enabled() {
            log::info!("client {client_id} disconnected, entering grace window");
        } else {
            log::info!("client {client_id} disconnected, reconnect disabled, retiring immediately");
            handler.on_disconnect(client_id);
        }
    }

    /// Retires any session whose grace window has elapsed. Call once per tick.
    pub fn poll_timeouts(&mut self, handler: &mut dyn ServerHandler) {
        for client_id in self.sessions.poll_timeouts(Instant::now()) {
            log::info!("client {client_id} grace window expired, retiring");
            handler.on_disconnect(client_id);
        }
    }

    /// Broadcast-mode tick (§4.4, no per-client filter): one unfiltered
    /// MSG_DELTA sent to every active client, skipped entirely if nothing
    /// changed.
    pub fn tick_broadcast(&mut self, world: &mut W, transport: &mut dyn Transport) {
        let active = self.sessions.active_client_ids();
        let bytes = self.differ.diff_and_encode(world, &mut self.encoder);
        const EMPTY_DELTA_LEN: usize = 1 + 5 * 2; // msg type + five u16 section counts
        if active.is_empty() || bytes.len() <= EMPTY_DELTA_LEN {
            return;
        }
        transport.broadcast(&bytes);
    }

    /// Filtered-mode tick (§4.4): per-client interest, dedup by canonical key,
    /// group-compose from a single pre-encode pass.
    pub fn tick_filtered<F>(&mut self, world: &mut W, transport: &mut dyn Transport, mut filter: F)
    where
        F: FnMut(ClientId) -> HashSet<NetId>,
    {
        let changeset = self.differ.compute_changeset(world);
        let registry = world.registry().clone();
        let active = self.sessions.active_client_ids();

        let mut per_client_deltas: Vec<(ClientId, ClientDelta)> = Vec::with_capacity(active.len());
        let mut extra_enter_net_ids: HashSet<NetId> = HashSet::new();

        for client_id in &active {
            let interest = filter(*client_id);
            let Some(session) = self.sessions.get_mut(*client_id) else {
                continue;
            };
            let delta = session.view.update(&interest, &changeset);
            for net_id in &delta.enters {
                if !changeset.created_set.contains(net_id) {
                    extra_enter_net_ids.insert(*net_id);
                }
            }
            per_client_deltas.push((*client_id, delta));
        }

        let cache = self.differ.pre_encode_changeset(
            world,
            &registry,
            &mut self.encoder,
            &changeset,
            &extra_enter_net_ids,
        );

        let mut groups: HashMap<String, (ClientDelta, Vec<ClientId>)> = HashMap::new();
        for (client_id, delta) in per_client_deltas {
            if delta.is_empty() {
                continue;
            }
            let key = delta.canonical_key();
            groups
                .entry(key)
                .or_insert_with(|| (delta.clone(), Vec::new()))
                .1
                .push(client_id);
        }

        for (_, (delta, members)) in groups {
            let buf = self.differ.compose_from_cache(&mut self.encoder, &cache, &delta);
            for client_id in members {
                if let Some(connection) = self.sessions.get(client_id).and_then(|s| s.connection) {
                    transport.send(connection, &buf);
                }
            }
        }

        self.differ.flush_snapshots(world);
    }

    /// Cancels all grace timers, clears session state (§5 `stop()`). The host
    /// remains responsible for closing the transport itself.
    pub fn stop(&mut self) {
        self.sessions.clear();
    }
}
