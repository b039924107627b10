//! Bit-exact message framing for the four wire message types (§6.3).
//!
//! Incoming messages are a closed sum type over `{Full, Delta, ClientDelta,
//! Reconnect, RequestFull, ClientId}` (§9 "Tagged variants"), preferred here over
//! open polymorphism.

use super::decoder::Decoder;
use super::encoder::Encoder;
use super::error::CodecError;
use crate::ids::{ClientId, NetId};
use crate::registry::{ComponentKind, ComponentRegistry, FieldValue};

pub const MSG_FULL: u8 = 0x01;
pub const MSG_DELTA: u8 = 0x02;
pub const MSG_CLIENT_DELTA: u8 = 0x03;
pub const MSG_RECONNECT: u8 = 0x04;
pub const MSG_REQUEST_FULL: u8 = 0x05;
pub const MSG_CLIENT_ID: u8 = 0xff;

/// Full component state for one entity: every registered field, in schema order.
pub type FullComponents = Vec<(ComponentKind, Vec<FieldValue>)>;
/// Partial component state: a field bitmask plus only the changed values, in
/// ascending field-index order.
pub type UpdatedComponents = Vec<(ComponentKind, u16, Vec<FieldValue>)>;

#[derive(Debug, Clone, PartialEq)]
pub struct DeltaBody {
    pub created: Vec<(NetId, FullComponents)>,
    pub destroyed: Vec<NetId>,
    pub updated: Vec<(NetId, UpdatedComponents)>,
    pub attached: Vec<(NetId, FullComponents)>,
    pub detached: Vec<(NetId, Vec<ComponentKind>)>,
}

impl DeltaBody {
    pub fn empty() -> Self {
        Self {
            created: Vec::new(),
            destroyed: Vec::new(),
            updated: Vec::new(),
            attached: Vec::new(),
            detached: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.destroyed.is_empty()
            && self.updated.is_empty()
            && self.attached.is_empty()
            && self.detached.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientDeltaBody {
    pub updated: Vec<(NetId, UpdatedComponents)>,
    pub attached: Vec<(NetId, FullComponents)>,
    pub detached: Vec<(NetId, Vec<ComponentKind>)>,
}

impl ClientDeltaBody {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.attached.is_empty() && self.detached.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Full {
        registry_hash: u32,
        entities: Vec<(NetId, FullComponents)>,
    },
    Delta(DeltaBody),
    ClientDelta(ClientDeltaBody),
    Reconnect {
        token: u32,
    },
    RequestFull,
    ClientId {
        client_id: ClientId,
        token: u32,
    },
}

// --- entity-level fragment helpers, reused verbatim by the differ's
// pre-encoding cache (§4.1/§4.2) so a given entity's bytes are produced once. ---

pub fn encode_full_components(
    enc: &mut Encoder,
    registry: &ComponentRegistry,
    components: &[(ComponentKind, Vec<FieldValue>)],
) {
    enc.write_u8(components.len() as u8);
    for (kind, values) in components {
        enc.write_u8(kind.wire_id());
        debug_assert_eq!(values.len(), registry.field_count(*kind));
        for (value, schema) in values.iter().zip(iter_fields(registry, *kind)) {
            value.assert_matches(schema.scalar_type);
            enc.write_field_value(value);
        }
    }
}

pub fn encode_updated_components(
    enc: &mut Encoder,
    registry: &ComponentRegistry,
    components: &[(ComponentKind, u16, Vec<FieldValue>)],
) {
    enc.write_u8(components.len() as u8);
    for (kind, mask, values) in components {
        enc.write_u8(kind.wire_id());
        enc.write_u16(*mask);
        debug_assert_eq!(values.len(), mask.count_ones() as usize);
        let schemas = iter_fields(registry, *kind).collect::<Vec<_>>();
        for (value, field_index) in values.iter().zip(set_bit_indices(*mask)) {
            value.assert_matches(schemas[field_index].scalar_type);
            enc.write_field_value(value);
        }
    }
}

pub fn encode_wire_ids(enc: &mut Encoder, kinds: &[ComponentKind]) {
    enc.write_u8(kinds.len() as u8);
    for kind in kinds {
        enc.write_u8(kind.wire_id());
    }
}

fn iter_fields(
    registry: &ComponentRegistry,
    kind: ComponentKind,
) -> impl Iterator<Item = crate::registry::FieldSchema> + '_ {
    (0..registry.field_count(kind)).map(move |i| registry.field_schema(kind, i))
}

/// Ascending field indices whose bit is set in `mask`.
pub fn set_bit_indices(mask: u16) -> impl Iterator<Item = usize> {
    (0..16).filter(move |i| mask & (1 << i) != 0)
}

fn resolve_kind(registry: &ComponentRegistry, wire_id: u8) -> Result<ComponentKind, CodecError> {
    registry
        .kind_by_wire_id(wire_id)
        .ok_or(CodecError::UnknownWireId(wire_id))
}

fn decode_full_components(
    dec: &mut Decoder,
    registry: &ComponentRegistry,
) -> Result<Vec<(ComponentKind, Vec<FieldValue>)>, CodecError> {
    let count = dec.read_u8()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let wire_id = dec.read_u8()?;
        let kind = resolve_kind(registry, wire_id)?;
        let mut values = Vec::with_capacity(registry.field_count(kind));
        for schema in iter_fields(registry, kind) {
            values.push(dec.read_field_value(schema.scalar_type)?);
        }
        out.push((kind, values));
    }
    Ok(out)
}

fn decode_updated_components(
    dec: &mut Decoder,
    registry: &ComponentRegistry,
) -> Result<Vec<(ComponentKind, u16, Vec<FieldValue>)>, CodecError> {
    let count = dec.read_u8()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let wire_id = dec.read_u8()?;
        let kind = resolve_kind(registry, wire_id)?;
        let mask = dec.read_u16()?;
        let field_count = registry.field_count(kind);
        if (mask as u32) >> field_count != 0 {
            return Err(CodecError::FieldMaskOverflow {
                wire_id,
                mask,
                field_count,
            });
        }
        let mut values = Vec::with_capacity(mask.count_ones() as usize);
        for field_index in set_bit_indices(mask) {
            let schema = registry.field_schema(kind, field_index);
            values.push(dec.read_field_value(schema.scalar_type)?);
        }
        out.push((kind, mask, values));
    }
    Ok(out)
}

fn decode_wire_ids(
    dec: &mut Decoder,
    registry: &ComponentRegistry,
) -> Result<Vec<ComponentKind>, CodecError> {
    let count = dec.read_u8()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let wire_id = dec.read_u8()?;
        out.push(resolve_kind(registry, wire_id)?);
    }
    Ok(out)
}

pub fn encode_message(enc: &mut Encoder, registry: &ComponentRegistry, msg: &Message) {
    match msg {
        Message::Full {
            registry_hash,
            entities,
        } => {
            enc.write_u8(MSG_FULL);
            enc.write_u32(*registry_hash);
            enc.write_u16(entities.len() as u16);
            for (net_id, components) in entities {
                enc.write_varint(net_id.value() as u64);
                encode_full_components(enc, registry, components);
            }
        }
        Message::Delta(body) => {
            enc.write_u8(MSG_DELTA);
            enc.write_u16(body.created.len() as u16);
            for (net_id, components) in &body.created {
                enc.write_varint(net_id.value() as u64);
                encode_full_components(enc, registry, components);
            }
            enc.write_u16(body.destroyed.len() as u16);
            for net_id in &body.destroyed {
                enc.write_varint(net_id.value() as u64);
            }
            enc.write_u16(body.updated.len() as u16);
            for (net_id, components) in &body.updated {
                enc.write_varint(net_id.value() as u64);
                encode_updated_components(enc, registry, components);
            }
            enc.write_u16(body.attached.len() as u16);
            for (net_id, components) in &body.attached {
                enc.write_varint(net_id.value() as u64);
                encode_full_components(enc, registry, components);
            }
            enc.write_u16(body.detached.len() as u16);
            for (net_id, kinds) in &body.detached {
                enc.write_varint(net_id.value() as u64);
                encode_wire_ids(enc, kinds);
            }
        }
        Message::ClientDelta(body) => {
            enc.write_u8(MSG_CLIENT_DELTA);
            enc.write_u16(body.updated.len() as u16);
            for (net_id, components) in &body.updated {
                enc.write_varint(net_id.value() as u64);
                encode_updated_components(enc, registry, components);
            }
            enc.write_u16(body.attached.len() as u16);
            for (net_id, components) in &body.attached {
                enc.write_varint(net_id.value() as u64);
                encode_full_components(enc, registry, components);
            }
            enc.write_u16(body.detached.len() as u16);
            for (net_id, kinds) in &body.detached {
                enc.write_varint(net_id.value() as u64);
                encode_wire_ids(enc, kinds);
            }
        }
        Message::Reconnect { token } => {
            enc.write_u8(MSG_RECONNECT);
            enc.write_u32(*token);
        }
        Message::RequestFull => {
            enc.write_u8(MSG_REQUEST_FULL);
        }
        Message::ClientId { client_id, token } => {
            enc.write_u8(MSG_CLIENT_ID);
            enc.write_u16(client_id.value());
            enc.write_u32(*token);
        }
    }
}

pub fn decode_message(bytes: &[u8], registry: &ComponentRegistry) -> Result<Message, CodecError> {
    let mut dec = Decoder::new(bytes);
    let msg_type = dec.read_u8()?;
    match msg_type {
        MSG_FULL => {
            let registry_hash = dec.read_u32()?;
            if registry_hash != registry.hash() {
                return Err(CodecError::RegistryHashMismatch {
                    expected: registry.hash(),
                    got: registry_hash,
                });
            }
            let entity_count = dec.read_u16()?;
            let mut entities = Vec::with_capacity(entity_count as usize);
            for _ in 0..entity_count {
                let net_id = NetId(dec.read_varint()? as u32);
                let components = decode_full_components(&mut dec, registry)?;
                entities.push((net_id, components));
            }
            Ok(Message::Full {
                registry_hash,
                entities,
            })
        }
        MSG_DELTA => {
            let mut body = DeltaBody::empty();
            let created_count = dec.read_u16()?;
            for _ in 0..created_count {
                let net_id = NetId(dec.read_varint()? as u32);
                body.created
                    .push((net_id, decode_full_components(&mut dec, registry)?));
            }
            let destroyed_count = dec.read_u16()?;
            for _ in 0..destroyed_count {
                body.destroyed.push(NetId(dec.read_varint()? as u32));
            }
            let updated_count = dec.read_u16()?;
            for _ in 0..updated_count {
                let net_id = NetId(dec.read_varint()? as u32);
                body.updated
                    .push((net_id, decode_updated_components(&mut dec, registry)?));
            }
            let attached_count = dec.read_u16()?;
            for _ in 0..attached_count {
                let net_id = NetId(dec.read_varint()? as u32);
                body.attached
                    .push((net_id, decode_full_components(&mut dec, registry)?));
            }
            let detached_count = dec.read_u16()?;
            for _ in 0..detached_count {
                let net_id = NetId(dec.read_varint()? as u32);
                body.detached
                    .push((net_id, decode_wire_ids(&mut dec, registry)?));
            }
            Ok(Message::Delta(body))
        }
        MSG_CLIENT_DELTA => {
            let updated_count = dec.read_u16()?;
            let mut updated = Vec::with_capacity(updated_count as usize);
            for _ in 0..updated_count {
                let net_id = NetId(dec.read_varint()? as u32);
                updated.push((net_id, decode_updated_components(&mut dec, registry)?));
            }
            let attached_count = dec.read_u16()?;
            let mut attached = Vec::with_capacity(attached_count as usize);
            for _ in 0..attached_count {
                let net_id = NetId(dec.read_varint()? as u32);
                attached.push((net_id, decode_full_components(&mut dec, registry)?));
            }
            let detached_count = dec.read_u16()?;
            let mut detached = Vec::with_capacity(detached_count as usize);
            for _ in 0..detached_count {
                let net_id = NetId(dec.read_varint()? as u32);
                detached.push((net_id, decode_wire_ids(&mut dec, registry)?));
            }
            Ok(Message::ClientDelta(ClientDeltaBody {
                updated,
                attached,
                detached,
            }))
        }
        MSG_RECONNECT => Ok(Message::Reconnect {
            token: dec.read_u32()?,
        }),
        MSG_REQUEST_FULL => Ok(Message::RequestFull),
        MSG_CLIENT_ID => {
            let client_id = ClientId(dec.read_u16()?);
            let token = dec.read_u32()?;
            Ok(Message::ClientId { client_id, token })
        }
        other => Err(CodecError::UnknownMessageType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldSchema, ScalarType};

    fn registry() -> ComponentRegistry {
        ComponentRegistry::builder()
            .register(
                "Position",
                false,
                vec![
                    FieldSchema::new("x", ScalarType::F32),
                    FieldSchema::new("y", ScalarType::F32),
                ],
            )
            .unwrap()
            .register("Health", true, vec![FieldSchema::new("hp", ScalarType::U16)])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn round_trips_full_message() {
        let reg = registry();
        let pos = reg.kind_by_wire_id(0).unwrap();
        let msg = Message::Full {
            registry_hash: reg.hash(),
            entities: vec![(
                NetId(1),
                vec![(pos, vec![FieldValue::F32(1.5), FieldValue::F32(2.5)])],
            )],
        };
        let mut enc = Encoder::new();
        encode_message(&mut enc, &reg, &msg);
        let bytes = enc.finish();
        let decoded = decode_message(&bytes, &reg).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trips_delta_message_with_all_sections() {
        let reg = registry();
        let pos = reg.kind_by_wire_id(0).unwrap();
        let health = reg.kind_by_wire_id(1).unwrap();
        let mut body = DeltaBody::empty();
        body.created
            .push((NetId(2), vec![(pos, vec![FieldValue::F32(0.0), FieldValue::F32(0.0)])]));
        body.destroyed.push(NetId(9));
        body.updated
            .push((NetId(1), vec![(pos, 0b01, vec![FieldValue::F32(42.5)])]));
        body.attached
            .push((NetId(1), vec![(health, vec![FieldValue::U16(100)])]));
        body.detached.push((NetId(3), vec![health]));
        let msg = Message::Delta(body);
        let mut enc = Encoder::new();
        encode_message(&mut enc, &reg, &msg);
        let bytes = enc.finish();
        assert_eq!(decode_message(&bytes, &reg).unwrap(), msg);
    }

    #[test]
    fn registry_hash_mismatch_is_fatal() {
        let reg = registry();
        let msg = Message::Full {
            registry_hash: reg.hash().wrapping_add(1),
            entities: vec![],
        };
        let mut enc = Encoder::new();
        encode_message(&mut enc, &reg, &msg);
        let bytes = enc.finish();
        assert!(matches!(
            decode_message(&bytes, &reg),
            Err(CodecError::RegistryHashMismatch { .. })
        ));
    }

    #[test]
    fn field_mask_beyond_declared_fields_is_rejected() {
        let reg = registry();
        let mut enc = Encoder::new();
        enc.write_u8(MSG_DELTA);
        enc.write_u16(0); // created
        enc.write_u16(0); // destroyed
        enc.write_u16(1); // updated
        enc.write_varint(1);
        enc.write_u8(1); // component count
        enc.write_u8(1); // wire id = Health (1 field)
        enc.write_u16(0b10); // bit 1 set, but Health only has field 0
        let bytes = enc.finish();
        assert!(matches!(
            decode_message(&bytes, &reg),
            Err(CodecError::FieldMaskOverflow { .. })
        ));
    }

    #[test]
    fn unknown_wire_id_is_rejected() {
        let reg = registry();
        let mut enc = Encoder::new();
        enc.write_u8(MSG_DELTA);
        enc.write_u16(1);
        enc.write_varint(1);
        enc.write_u8(1);
        enc.write_u8(200); // no such wire id
        let bytes = enc.finish();
        assert!(matches!(
            decode_message(&bytes, &reg),
            Err(CodecError::UnknownWireId(200))
        ));
    }
}
