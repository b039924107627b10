//! Client-side mirror and reconnect/resync state machine (§4.5). Generic over
//! the ECS adapter (`NetClient<W: NetWorld>`), mirroring `ecsnet-server`'s
//! `NetServer<W>`.

use std::collections::{HashMap, VecDeque};

use ecsnet_shared::differ::OwnedDiffer;
use ecsnet_shared::ecs::NetWorld;
use ecsnet_shared::ids::{ClientId, NetId};
use ecsnet_shared::transport::ClientTransport;
use ecsnet_shared::wire::{
    decode_message, encode_message, set_bit_indices, DeltaBody, Encoder, Message, MSG_CLIENT_ID, MSG_DELTA, MSG_FULL,
};

use crate::config::ClientConfig;

/// Handshake/message callbacks the host implements (§4.5 "Connection lifecycle").
pub trait ClientHandler {
    fn on_connected(&mut self, client_id: ClientId);
    fn on_reconnected(&mut self, client_id: ClientId);
    fn on_disconnected(&mut self);
    /// Any inbound byte pattern that isn't a recognized protocol message, or a
    /// non-protocol message surfaced during a burst-resync discard.
    fn on_message(&mut self, bytes: &[u8]);
}

pub struct NetClient<W: NetWorld> {
    config: ClientConfig,
    net_to_entity: HashMap<NetId, W::EntityId>,
    client_id: Option<ClientId>,
    connected: bool,
    reconnect_token: u32,
    /// Raw MSG_DELTA / unrecognized bytes awaiting the next `tick()` (§4.5.1 —
    /// stored as owned bytes, not pre-decoded, so a burst-discard is cheap).
    inbound: VecDeque<Vec<u8>>,
    owned_differ: OwnedDiffer,
    encoder: Encoder,
}

impl<W: NetWorld> NetClient<W> {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            net_to_entity: HashMap::new(),
            client_id: None,
            connected: false,
            reconnect_token: 0,
            inbound: VecDeque::new(),
            owned_differ: OwnedDiffer::new(),
            encoder: Encoder::new(),
        }
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn net_to_entity(&self) -> &HashMap<NetId, W::EntityId> {
        &self.net_to_entity
    }

    pub fn reconnect_token(&self) -> u32 {
        self.reconnect_token
    }

    /// Lets the host persist/restore the token across process or page restarts.
    pub fn set_reconnect_token(&mut self, token: u32) {
        self.reconnect_token = token;
    }

    /// Local entities whose `clientOwned` ownership field equals the assigned
    /// `ClientId` (§4.5 `ownedEntities`).
    pub fn owned_entities(&self, world: &W) -> Vec<W::EntityId> {
        let (Some(owner), Some(client_id)) = (self.config.owner_component.as_ref(), self.client_id) else {
            return Vec::new();
        };
        self.net_to_entity
            .values()
            .copied()
            .filter(|&entity| owner.owns(world, entity, client_id))
            .collect()
    }

    /// Opens the connection: sends MSG_RECONNECT with the stored token (0 if
    /// unset) (§4.5 "Connection lifecycle").
    pub fn connect(&mut self, world: &W, transport: &mut dyn ClientTransport) {
        let registry = world.registry();
        self.encoder.reset();
        encode_message(&mut self.encoder, registry, &Message::Reconnect { token: self.reconnect_token });
        transport.send(&self.encoder.finish());
    }

    /// Sends an opaque application message over the same transport.
    pub fn send(&self, transport: &mut dyn ClientTransport, bytes: &[u8]) {
        transport.send(bytes);
    }

    /// The host calls this once when its transport reports close/error. Fires
    /// `onDisconnected` exactly once and clears the live connection state; the
    /// reconnect token and pending world mirror are left intact so a later
    /// `connect()` can still attempt a reconnect.
    pub fn handle_close(&mut self, handler: &mut dyn ClientHandler) {
        if self.connected {
            self.connected = false;
            handler.on_disconnected();
        }
    }

    /// Feeds one inbound byte buffer. MSG_CLIENT_ID and MSG_FULL are applied
    /// immediately; everything else is buffered for the next `tick()` (§4.5
    /// "Inbound message handling policy").
    pub fn on_message(&mut self, world: &mut W, bytes: &[u8], handler: &mut dyn ClientHandler) {
        match bytes.first().copied() {
            Some(MSG_CLIENT_ID) => self.apply_client_id(world, bytes, handler),
            Some(MSG_FULL) => self.apply_full_message(world, bytes),
            _ => self.inbound.push_back(bytes.to_vec()),
        }
    }

    fn apply_client_id(&mut self, world: &W, bytes: &[u8], handler: &mut dyn ClientHandler) {
        let registry = world.registry();
        let Ok(Message::ClientId { client_id, token }) = decode_message(bytes, registry) else {
            return;
        };
        self.reconnect_token = token;
        let is_reconnect = self.client_id == Some(client_id);
        self.client_id = Some(client_id);
        self.connected = true;
        if is_reconnect {
            handler.on_reconnected(client_id);
        } else {
            handler.on_connected(client_id);
        }
    }

    fn apply_full_message(&mut self, world: &mut W, bytes: &[u8]) {
        let registry = world.registry().clone();
        let Ok(Message::Full { entities, .. }) = decode_message(bytes, &registry) else {
            return;
        };
        for entity in self.net_to_entity.values().copied().collect::<Vec<_>>() {
            world.destroy_entity(entity);
        }
        self.net_to_entity.clear();
        self.owned_differ = OwnedDiffer::new();

        for (net_id, components) in entities {
            let entity = world.create_networked_entity(&components);
            self.net_to_entity.insert(net_id, entity);
        }
    }

    fn apply_delta_body(&mut self, world: &mut W, body: &DeltaBody) {
        for (net_id, components) in &body.created {
            let entity = world.create_networked_entity(components);
            self.net_to_entity.insert(*net_id, entity);
        }

        for net_id in &body.destroyed {
            if let Some(entity) = self.net_to_entity.remove(net_id) {
                world.destroy_entity(entity);
            }
        }

        for (net_id, components) in &body.updated {
            let Some(&entity) = self.net_to_entity.get(net_id) else { continue };
            for (kind, mask, values) in components {
                for (value, field_index) in values.iter().zip(set_bit_indices(*mask)) {
                    world.set_field(entity, *kind, field_index, value.clone());
                }
            }
        }

        // §5: detached is applied before attached so a same-tick component
        // swap (remove old, add new) leaves the new component standing rather
        // than having a same-kind attach clobbered by a later detach.
        for (net_id, kinds) in &body.detached {
            let Some(&entity) = self.net_to_entity.get(net_id) else { continue };
            for kind in kinds {
                world.remove_component(entity, *kind);
            }
        }

        for (net_id, components) in &body.attached {
            let Some(&entity) = self.net_to_entity.get(net_id) else { continue };
            for (kind, values) in components {
                world.add_component(entity, *kind, values.clone());
            }
        }
    }

    /// Single per-frame entry point (§4.5 `tick()`): drains buffered inbound
    /// messages (applying the burst-resync policy if configured), then diffs
    /// and sends locally-owned component changes.
    pub fn tick(&mut self, world: &mut W, transport: &mut dyn ClientTransport, handler: &mut dyn ClientHandler) {
        self.drain_inbound(world, transport, handler);
        self.send_owned_delta(world, transport);
    }

    fn drain_inbound(&mut self, world: &mut W, transport: &mut dyn ClientTransport, handler: &mut dyn ClientHandler) {
        let delta_count = self
            .inbound
            .iter()
            .filter(|bytes| bytes.first() == Some(&MSG_DELTA))
            .count() as u32;
        let bursting = self.config.burst_resync_enabled() && delta_count > self.config.burst_threshold;

        let registry = world.registry().clone();
        let buffered: Vec<Vec<u8>> = self.inbound.drain(..).collect();
        for bytes in buffered {
            match decode_message(&bytes, &registry) {
                Ok(Message::Delta(body)) => {
                    if bursting {
                        continue;
                    }
                    self.apply_delta_body(world, &body);
                }
                _ => handler.on_message(&bytes),
            }
        }

        if bursting {
            self.encoder.reset();
            encode_message(&mut self.encoder, &registry, &Message::RequestFull);
            transport.send(&self.encoder.finish());
        }
    }

    fn send_owned_delta(&mut self, world: &W, transport: &mut dyn ClientTransport) {
        let (Some(owner), Some(client_id)) = (self.config.owner_component.as_ref(), self.client_id) else {
            return;
        };
        let body = self.owned_differ.diff(world, &self.net_to_entity, owner, client_id);
        if body.is_empty() {
            return;
        }
        let registry = world.registry();
        self.encoder.reset();
        encode_message(&mut self.encoder, registry, &Message::ClientDelta(body));
        transport.send(&self.encoder.finish());
    }
}
