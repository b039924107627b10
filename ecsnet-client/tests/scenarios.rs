//! Client-side halves of S6 (burst resync) and S9 (reconnect convergence),
//! driven directly against `NetClient::tick`/`on_message` rather than through
//! a live `NetServer` (the messages a real server would have sent are built
//! by hand here).

use ecsnet_client::{ClientConfig, ClientHandler, NetClient};
use ecsnet_shared::ecs::testkit::TestWorld;
use ecsnet_shared::ecs::NetWorld;
use ecsnet_shared::ids::ClientId;
use ecsnet_shared::registry::{ComponentRegistry, FieldSchema, FieldValue, ScalarType};
use ecsnet_shared::transport::testkit::ChannelClientTransport;
use ecsnet_shared::wire::{decode_message, encode_message, DeltaBody, Encoder, Message};

#[derive(Default)]
struct Recorder {
    connected: Vec<ClientId>,
    reconnected: Vec<ClientId>,
    disconnected: u32,
    messages: Vec<Vec<u8>>,
}

impl ClientHandler for Recorder {
    fn on_connected(&mut self, client_id: ClientId) {
        self.connected.push(client_id);
    }
    fn on_reconnected(&mut self, client_id: ClientId) {
        self.reconnected.push(client_id);
    }
    fn on_disconnected(&mut self) {
        self.disconnected += 1;
    }
    fn on_message(&mut self, bytes: &[u8]) {
        self.messages.push(bytes.to_vec());
    }
}

fn position_registry() -> ComponentRegistry {
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
        .build()
        .unwrap()
}

#[test]
fn s6_burst_discards_buffered_deltas_and_requests_full() {
    let registry = position_registry();
    let pos = registry.kind_by_wire_id(0).unwrap();
    let mut world = TestWorld::new(registry.clone());
    let mut transport = ChannelClientTransport::new();
    let mut recorder = Recorder::default();
    let mut client: NetClient<TestWorld> = NetClient::new(ClientConfig::new().with_burst_threshold(5));

    // 10 buffered deltas, each nominally creating NetId(1) — if applied, the
    // world would gain an entity; since the burst threshold is exceeded they
    // must all be discarded without ever touching `world`.
    for _ in 0..10 {
        let mut body = DeltaBody::empty();
        body.created
            .push((ecsnet_shared::ids::NetId(1), vec![(pos, vec![FieldValue::F32(0.0), FieldValue::F32(0.0)])]));
        let mut enc = Encoder::new();
        encode_message(&mut enc, &registry, &Message::Delta(body));
        client.on_message(&mut world, &enc.finish(), &mut recorder);
    }

    client.tick(&mut world, &mut transport, &mut recorder);

    assert!(world.all_entities().is_empty(), "discarded deltas must not be applied");
    let sent = transport.drain_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(decode_message(&sent[0], &registry).unwrap(), Message::RequestFull);

    // Server answers the resync request with the authoritative full state.
    let full = Message::Full {
        registry_hash: registry.hash(),
        entities: vec![(
            ecsnet_shared::ids::NetId(1),
            vec![(pos, vec![FieldValue::F32(3.0), FieldValue::F32(4.0)])],
        )],
    };
    let mut enc = Encoder::new();
    encode_message(&mut enc, &registry, &full);
    client.on_message(&mut world, &enc.finish(), &mut recorder);

    let entity = *client.net_to_entity().get(&ecsnet_shared::ids::NetId(1)).unwrap();
    assert_eq!(
        world.field_values(entity, pos),
        vec![FieldValue::F32(3.0), FieldValue::F32(4.0)]
    );
}

#[test]
fn s9_reconnect_converges_to_server_state() {
    let registry = position_registry();
    let pos = registry.kind_by_wire_id(0).unwrap();
    let mut world = TestWorld::new(registry.clone());
    let mut transport = ChannelClientTransport::new();
    let mut recorder = Recorder::default();
    let mut client: NetClient<TestWorld> = NetClient::new(ClientConfig::new());

    client.connect(&world, &mut transport);
    let sent = transport.drain_sent();
    assert_eq!(decode_message(&sent[0], &registry).unwrap(), Message::Reconnect { token: 0 });

    let mut enc = Encoder::new();
    encode_message(
        &mut enc,
        &registry,
        &Message::ClientId {
            client_id: ClientId(5),
            token: 111,
        },
    );
    client.on_message(&mut world, &enc.finish(), &mut recorder);
    assert_eq!(recorder.connected, vec![ClientId(5)]);
    assert_eq!(client.reconnect_token(), 111);

    client.handle_close(&mut recorder);
    assert_eq!(recorder.disconnected, 1);
    client.handle_close(&mut recorder); // idempotent: no second callback
    assert_eq!(recorder.disconnected, 1);

    client.connect(&world, &mut transport);
    let sent = transport.drain_sent();
    assert_eq!(decode_message(&sent[0], &registry).unwrap(), Message::Reconnect { token: 111 });

    let mut enc = Encoder::new();
    encode_message(
        &mut enc,
        &registry,
        &Message::ClientId {
            client_id: ClientId(5),
            token: 222,
        },
    );
    client.on_message(&mut world, &enc.finish(), &mut recorder);
    assert_eq!(recorder.reconnected, vec![ClientId(5)]);
    assert!(recorder.connected.len() == 1, "a reconnect must not also fire onConnected");
    assert_eq!(client.reconnect_token(), 222);

    let full = Message::Full {
        registry_hash: registry.hash(),
        entities: vec![(
            ecsnet_shared::ids::NetId(7),
            vec![(pos, vec![FieldValue::F32(1.0), FieldValue::F32(2.0)])],
        )],
    };
    let mut enc = Encoder::new();
    encode_message(&mut enc, &registry, &full);
    client.on_message(&mut world, &enc.finish(), &mut recorder);

    let entity = *client.net_to_entity().get(&ecsnet_shared::ids::NetId(7)).unwrap();
    assert_eq!(
        world.field_values(entity, pos),
        vec![FieldValue::F32(1.0), FieldValue::F32(2.0)]
    );
    assert_eq!(world.all_entities().len(), 1);
}
