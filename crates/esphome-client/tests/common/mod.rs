#![allow(dead_code)]

use std::time::Duration;

use bytes::BytesMut;
use esphome_client::{Connection, ConnectionConfig, ConnectionState};
use esphome_frame::{encode_frame, serialize, FrameReader, TaggedMessage};
use esphome_proto::api::{ConnectRequest, ConnectResponse, HelloRequest, HelloResponse};
use esphome_proto::{Message, MessageRegistry, Schema, TaggedExt};
use esphome_transport::{IoStream, Transport, TransportWriter};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const STEP: Duration = Duration::from_secs(2);

/// Client settings tuned for tests: short timeouts, no heartbeat noise.
pub fn config(port: u16) -> ConnectionConfig {
    ConnectionConfig::new("127.0.0.1")
        .with_port(port)
        .with_connect_timeout(Duration::from_secs(1))
        .with_response_timeout(Duration::from_millis(500))
        .with_heartbeat_interval(Duration::from_secs(60))
}

/// A scripted device listening on an ephemeral local port.
pub struct FakeDevice {
    listener: TcpListener,
}

impl FakeDevice {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        Self { listener }
    }

    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .expect("listener should have an address")
            .port()
    }

    pub async fn accept(&self) -> DeviceSession {
        let (stream, _) = tokio::time::timeout(STEP, self.listener.accept())
            .await
            .expect("client should connect in time")
            .expect("accept should succeed");
        DeviceSession::new(stream)
    }
}

/// The device end of one session.
pub struct DeviceSession {
    reader: FrameReader,
    writer: TransportWriter,
    registry: MessageRegistry,
}

impl DeviceSession {
    pub fn new(stream: impl IoStream + 'static) -> Self {
        let (reader, writer) = Transport::new(stream, CancellationToken::new()).split();
        Self {
            reader: FrameReader::new(reader),
            writer,
            registry: MessageRegistry::with_defaults(),
        }
    }

    pub async fn recv(&mut self) -> TaggedMessage<Message> {
        let frame = self
            .reader
            .next_frame(STEP)
            .await
            .expect("client should send a frame");
        let message = self
            .registry
            .decode(frame.type_id, &frame.payload)
            .expect("client frame should decode");
        TaggedMessage::new(frame.type_id, message)
    }

    /// Next frame, or `None` on timeout or end of stream.
    pub async fn try_recv(&mut self, timeout: Duration) -> Option<TaggedMessage<Message>> {
        let frame = self.reader.next_frame(timeout).await.ok()?;
        let message = self.registry.decode(frame.type_id, &frame.payload).ok()?;
        Some(TaggedMessage::new(frame.type_id, message))
    }

    pub async fn expect<S: Schema>(&mut self) -> S {
        let tagged = self.recv().await;
        let type_id = tagged.type_id();
        tagged
            .into_schema::<S>()
            .unwrap_or_else(|_| panic!("expected {}, got type id {type_id}", S::NAME))
    }

    pub async fn send(&mut self, message: impl Into<Message>) {
        let bytes = serialize(&self.registry, &message.into()).expect("message should encode");
        self.send_raw(&bytes).await;
    }

    /// A well-formed frame with an arbitrary type id and payload.
    pub async fn send_frame(&mut self, type_id: u32, payload: &[u8]) {
        let mut buf = BytesMut::new();
        encode_frame(type_id, payload, &mut buf).expect("frame should encode");
        self.send_raw(&buf).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer
            .send_all(bytes, STEP)
            .await
            .expect("device write should succeed");
    }

    /// Answer hello and connect as a device named `name` speaking API 1.9.
    pub async fn handshake(&mut self, name: &str) -> HelloRequest {
        let hello = self.expect::<HelloRequest>().await;
        self.send(HelloResponse {
            api_version_major: 1,
            api_version_minor: 9,
            server_info: "fake-device 2024.6.0".to_string(),
            name: name.to_string(),
        })
        .await;
        self.expect::<ConnectRequest>().await;
        self.send(ConnectResponse {
            invalid_password: false,
        })
        .await;
        hello
    }
}

/// Connect a client to a fresh fake device and complete the handshake.
pub async fn ready_pair(
    configure: impl FnOnce(ConnectionConfig) -> ConnectionConfig,
) -> (Connection, DeviceSession) {
    let device = FakeDevice::bind().await;
    let conn = Connection::new(configure(config(device.port())));
    let (connected, session) = tokio::join!(conn.connect(), async {
        let mut session = device.accept().await;
        session.handshake("dev1").await;
        session
    });
    connected.expect("handshake should succeed");
    assert_eq!(conn.state(), ConnectionState::Ready);
    (conn, session)
}

pub async fn wait_for_state(conn: &Connection, state: ConnectionState) {
    let mut states = conn.watch_state();
    tokio::time::timeout(STEP, states.wait_for(|current| *current == state))
        .await
        .unwrap_or_else(|_| panic!("connection should reach {state}, is {}", conn.state()))
        .expect("state channel should stay open");
}
