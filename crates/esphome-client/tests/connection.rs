mod common;

use std::time::Duration;

use common::{config, ready_pair, wait_for_state, DeviceSession, FakeDevice, STEP};
use esphome_client::{
    ApiError, ApiVersion, CancellationToken, Connection, ConnectionState, EntityKind, EntityState,
    LightCommand, LogLevel,
};
use esphome_proto::api::{
    ConnectRequest, ConnectResponse, DeviceInfoRequest, DeviceInfoResponse, DisconnectRequest,
    DisconnectResponse, GetTimeRequest, GetTimeResponse, HelloRequest, HelloResponse,
    LightCommandRequest, ListEntitiesDoneResponse, ListEntitiesLightResponse, ListEntitiesRequest,
    ListEntitiesSwitchResponse, PingRequest, PingResponse, SensorStateResponse,
    SubscribeLogsRequest, SubscribeLogsResponse, SubscribeStatesRequest, SwitchCommandRequest,
    SwitchStateResponse,
};

#[tokio::test]
async fn handshake_records_device_identity() {
    let device = FakeDevice::bind().await;
    let conn = Connection::new(config(device.port()).with_client_info("integration"));

    let (connected, hello) = tokio::join!(conn.connect(), async {
        let mut session = device.accept().await;
        session.handshake("dev1").await
    });

    connected.expect("connect should succeed");
    assert_eq!(conn.state(), ConnectionState::Ready);
    assert_eq!(conn.api_version(), Some(ApiVersion { major: 1, minor: 9 }));
    assert_eq!(conn.device_name(), Some("dev1"));
    assert_eq!(conn.server_info(), Some("fake-device 2024.6.0"));
    assert_eq!(hello.client_info, "integration");
    assert_eq!(hello.api_version_major, 1);
    assert_eq!(hello.api_version_minor, 10);
}

#[tokio::test]
async fn handshake_over_in_memory_stream() {
    let (client_end, device_end) = tokio::io::duplex(4096);
    let conn = Connection::new(config(0));
    let mut session = DeviceSession::new(device_end);

    let (connected, _) = tokio::join!(
        conn.connect_with_stream(client_end),
        session.handshake("duplex")
    );

    connected.expect("connect should succeed");
    assert_eq!(conn.device_name(), Some("duplex"));
}

#[tokio::test]
async fn invalid_password_fails_without_further_requests() {
    let device = FakeDevice::bind().await;
    let conn = Connection::new(config(device.port()).with_password("wrong"));

    let (connected, mut session) = tokio::join!(conn.connect(), async {
        let mut session = device.accept().await;
        session.expect::<HelloRequest>().await;
        session
            .send(HelloResponse {
                api_version_major: 1,
                api_version_minor: 9,
                server_info: String::new(),
                name: "dev1".to_string(),
            })
            .await;
        let connect = session.expect::<ConnectRequest>().await;
        assert_eq!(connect.password, "wrong");
        session
            .send(ConnectResponse {
                invalid_password: true,
            })
            .await;
        session
    });

    let err = connected.expect_err("connect should be rejected");
    assert!(matches!(err, ApiError::Authentication(_)), "{err:?}");
    assert_eq!(conn.state(), ConnectionState::Failed);
    assert_eq!(conn.failure(), Some(err));
    assert!(session.try_recv(Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn unsupported_major_version_is_rejected() {
    let device = FakeDevice::bind().await;
    let conn = Connection::new(config(device.port()));

    let (connected, _) = tokio::join!(conn.connect(), async {
        let mut session = device.accept().await;
        session.expect::<HelloRequest>().await;
        session
            .send(HelloResponse {
                api_version_major: 2,
                api_version_minor: 0,
                server_info: String::new(),
                name: "future".to_string(),
            })
            .await;
        session
    });

    assert!(matches!(connected, Err(ApiError::UnexpectedMessage(_))));
    assert_eq!(conn.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn list_entities_collects_until_done_and_skips_strays() {
    let (conn, mut session) = ready_pair(|c| c).await;

    let (entities, _) = tokio::join!(conn.list_entities(), async {
        session.expect::<ListEntitiesRequest>().await;
        session
            .send(ListEntitiesLightResponse {
                object_id: "desk_lamp".to_string(),
                key: 42,
                name: "Desk Lamp".to_string(),
                ..Default::default()
            })
            .await;
        session
            .send(SubscribeLogsResponse {
                level: LogLevel::Info as i32,
                message: b"stray".to_vec(),
                send_failed: false,
            })
            .await;
        // Unknown to this client: skipped by the receive loop.
        session.send_frame(999, &[0x08, 0x01]).await;
        session.send(ListEntitiesDoneResponse {}).await;
    });

    let entities = entities.expect("listing should succeed");
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].key, 42);
    assert_eq!(entities[0].kind, EntityKind::Light);
    assert_eq!(entities[0].object_id, "desk_lamp");
    assert_eq!(conn.state(), ConnectionState::Ready);
    assert_eq!(conn.pending_waiters(), 0);
}

#[tokio::test]
async fn list_entities_keeps_device_order() {
    let (conn, mut session) = ready_pair(|c| c).await;

    let (entities, _) = tokio::join!(conn.list_entities(), async {
        session.expect::<ListEntitiesRequest>().await;
        session
            .send(ListEntitiesSwitchResponse {
                key: 1,
                name: "Relay".to_string(),
                ..Default::default()
            })
            .await;
        session
            .send(ListEntitiesLightResponse {
                key: 2,
                ..Default::default()
            })
            .await;
        session.send(ListEntitiesDoneResponse {}).await;
    });

    let keys: Vec<u32> = entities
        .expect("listing should succeed")
        .iter()
        .map(|entity| entity.key)
        .collect();
    assert_eq!(keys, [1, 2]);
}

#[tokio::test]
async fn device_info_is_mapped() {
    let (conn, mut session) = ready_pair(|c| c).await;

    let (info, _) = tokio::join!(conn.device_info(), async {
        session.expect::<DeviceInfoRequest>().await;
        session
            .send(DeviceInfoResponse {
                name: "dev1".to_string(),
                mac_address: "AA:BB:CC:DD:EE:FF".to_string(),
                esphome_version: "2024.6.0".to_string(),
                webserver_port: 80,
                uses_password: true,
                ..Default::default()
            })
            .await;
    });

    let info = info.expect("device info should arrive");
    assert_eq!(info.name, "dev1");
    assert_eq!(info.mac_address, "AA:BB:CC:DD:EE:FF");
    assert_eq!(info.webserver_port, 80);
    assert!(info.uses_password);
}

#[tokio::test]
async fn response_timeout_keeps_connection_ready() {
    let (conn, mut session) =
        ready_pair(|c| c.with_response_timeout(Duration::from_millis(100))).await;

    let (info, _) = tokio::join!(conn.device_info(), session.expect::<DeviceInfoRequest>());

    assert!(matches!(info, Err(ApiError::Timeout(_))));
    assert_eq!(conn.state(), ConnectionState::Ready);
    assert_eq!(conn.pending_waiters(), 0);
}

#[tokio::test]
async fn commands_are_fire_and_forget() {
    let (conn, mut session) = ready_pair(|c| c).await;

    conn.light_command(LightCommand::new(42).state(true).effect("Rainbow"))
        .await
        .expect("light command should be sent");
    let light = session.expect::<LightCommandRequest>().await;
    assert_eq!(light.key, 42);
    assert!(light.has_state && light.state);
    assert!(light.has_effect);
    assert_eq!(light.effect, "Rainbow");
    assert!(!light.has_brightness);

    conn.switch_command(7, true)
        .await
        .expect("switch command should be sent");
    let switch = session.expect::<SwitchCommandRequest>().await;
    assert_eq!((switch.key, switch.state), (7, true));
    assert_eq!(conn.pending_waiters(), 0);
}

#[tokio::test]
async fn log_stream_yields_lines_until_cancelled() {
    let (conn, mut session) = ready_pair(|c| c).await;

    let mut logs = conn
        .subscribe_logs(LogLevel::Debug, true)
        .await
        .expect("subscribe should succeed");
    let request = session.expect::<SubscribeLogsRequest>().await;
    assert_eq!(request.level, LogLevel::Debug as i32);
    assert!(request.dump_config);

    for line in ["boot", "wifi up"] {
        session
            .send(SubscribeLogsResponse {
                level: LogLevel::Info as i32,
                message: line.as_bytes().to_vec(),
                send_failed: false,
            })
            .await;
    }

    let first = tokio::time::timeout(STEP, logs.next()).await.unwrap().unwrap();
    let second = tokio::time::timeout(STEP, logs.next()).await.unwrap().unwrap();
    assert_eq!(first.message, "boot");
    assert_eq!(first.level, LogLevel::Info);
    assert_eq!(second.message, "wifi up");

    conn.cancel();
    assert!(tokio::time::timeout(STEP, logs.next()).await.unwrap().is_none());
    assert!(matches!(logs.end_reason(), ApiError::Cancelled(_)));
}

#[tokio::test]
async fn state_stream_converts_updates() {
    let (conn, mut session) = ready_pair(|c| c).await;

    let mut states = conn
        .subscribe_states()
        .await
        .expect("subscribe should succeed");
    session.expect::<SubscribeStatesRequest>().await;

    session
        .send(SensorStateResponse {
            key: 3,
            state: 21.5,
            missing_state: false,
        })
        .await;
    session.send(SwitchStateResponse { key: 7, state: true }).await;

    let first = tokio::time::timeout(STEP, states.next()).await.unwrap().unwrap();
    let second = tokio::time::timeout(STEP, states.next()).await.unwrap().unwrap();
    assert_eq!(first, EntityState::Sensor { key: 3, state: Some(21.5) });
    assert_eq!(second, EntityState::Switch { key: 7, state: true });
}

#[tokio::test]
async fn answered_heartbeat_keeps_connection_ready() {
    let (conn, mut session) =
        ready_pair(|c| c.with_heartbeat_interval(Duration::from_millis(50))).await;

    for _ in 0..3 {
        session.expect::<PingRequest>().await;
        session.send(PingResponse {}).await;
    }

    assert_eq!(conn.state(), ConnectionState::Ready);
    assert!(conn.failure().is_none());
}

#[tokio::test]
async fn missed_heartbeat_is_fatal() {
    let (conn, mut session) = ready_pair(|c| {
        c.with_heartbeat_interval(Duration::from_millis(50))
            .with_response_timeout(Duration::from_millis(100))
    })
    .await;

    session.expect::<PingRequest>().await;
    wait_for_state(&conn, ConnectionState::Failed).await;
    assert!(matches!(conn.failure(), Some(ApiError::Timeout(_))));
}

#[tokio::test]
async fn client_ping_measures_round_trip() {
    let (conn, mut session) = ready_pair(|c| c).await;

    let (rtt, _) = tokio::join!(conn.ping(), async {
        session.expect::<PingRequest>().await;
        session.send(PingResponse {}).await;
    });

    assert!(rtt.expect("ping should be answered") < STEP);
}

#[tokio::test]
async fn device_requests_are_answered() {
    let (conn, mut session) = ready_pair(|c| c).await;

    session.send(PingRequest {}).await;
    session.expect::<PingResponse>().await;

    session.send(GetTimeRequest {}).await;
    let time = session.expect::<GetTimeResponse>().await;
    assert!(time.epoch_seconds > 1_577_836_800);

    assert_eq!(conn.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn client_disconnect_is_orderly() {
    let (conn, mut session) = ready_pair(|c| c).await;

    let (result, _) = tokio::join!(conn.disconnect(), async {
        session.expect::<DisconnectRequest>().await;
        session.send(DisconnectResponse {}).await;
    });

    result.expect("disconnect should be acknowledged");
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(conn.failure().is_none());
    assert!(conn.ping().await.is_err());
    assert!(conn.connect().await.is_err());
}

#[tokio::test]
async fn device_disconnect_is_orderly() {
    let (conn, mut session) = ready_pair(|c| c).await;

    session.send(DisconnectRequest {}).await;
    session.expect::<DisconnectResponse>().await;

    wait_for_state(&conn, ConnectionState::Disconnected).await;
    assert!(conn.failure().is_none());
}

#[tokio::test]
async fn cancel_releases_pending_call() {
    let (conn, mut session) =
        ready_pair(|c| c.with_response_timeout(Duration::from_secs(30))).await;

    let (listing, _) = tokio::join!(conn.list_entities(), async {
        session.expect::<ListEntitiesRequest>().await;
        conn.cancel();
    });

    assert!(matches!(listing, Err(ApiError::Cancelled(_))), "{listing:?}");
    assert_eq!(conn.state(), ConnectionState::Failed);
    assert_eq!(conn.pending_waiters(), 0);
}

#[tokio::test]
async fn cancel_before_connect_fails_connection() {
    let conn = Connection::new(config(0));

    conn.cancel();

    assert_eq!(conn.state(), ConnectionState::Failed);
    assert!(matches!(conn.failure(), Some(ApiError::Cancelled(_))));
    let err = conn.connect().await.expect_err("a cancelled connection is not reused");
    assert!(matches!(err, ApiError::Cancelled(_)), "{err:?}");
}

#[tokio::test]
async fn cancelled_parent_refuses_connect() {
    let parent = CancellationToken::new();
    let conn = Connection::with_cancellation(config(0), &parent);

    parent.cancel();

    let err = conn.connect().await.expect_err("parent is already cancelled");
    assert!(matches!(err, ApiError::Cancelled(_)), "{err:?}");
    assert_eq!(conn.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn cancel_after_orderly_disconnect_stays_disconnected() {
    let (conn, mut session) = ready_pair(|c| c).await;

    let (result, _) = tokio::join!(conn.disconnect(), async {
        session.expect::<DisconnectRequest>().await;
        session.send(DisconnectResponse {}).await;
    });
    result.expect("disconnect should be acknowledged");

    conn.cancel();

    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(conn.failure().is_none());
}

#[tokio::test]
async fn parent_token_tears_connection_down() {
    let device = FakeDevice::bind().await;
    let parent = CancellationToken::new();
    let conn = Connection::with_cancellation(config(device.port()), &parent);

    let (connected, _session) = tokio::join!(conn.connect(), async {
        let mut session = device.accept().await;
        session.handshake("dev1").await;
        session
    });
    connected.expect("connect should succeed");

    parent.cancel();
    wait_for_state(&conn, ConnectionState::Failed).await;
    assert!(matches!(conn.failure(), Some(ApiError::Cancelled(_))));
    assert!(matches!(conn.ping().await, Err(ApiError::Cancelled(_))));
}

#[tokio::test]
async fn stalled_write_fails_connection_and_releases_waiters() {
    let (client_end, device_end) = tokio::io::duplex(64);
    let conn = Connection::new(
        config(0)
            .with_send_timeout(Duration::from_millis(100))
            .with_response_timeout(Duration::from_secs(30)),
    );
    let mut session = DeviceSession::new(device_end);
    let (connected, _) = tokio::join!(
        conn.connect_with_stream(client_end),
        session.handshake("stalled")
    );
    connected.expect("connect should succeed");

    // The device stops reading, so the command cannot fit into the pipe.
    let (info, command) = tokio::join!(conn.device_info(), async {
        tokio::task::yield_now().await;
        conn.light_command(LightCommand::new(1).effect("x".repeat(300)))
            .await
    });

    let err = command.expect_err("a stalled write should fail");
    assert!(matches!(err, ApiError::Send(_)), "{err:?}");
    assert!(matches!(info, Err(ApiError::Send(_))), "{info:?}");
    assert_eq!(conn.state(), ConnectionState::Failed);
    assert_eq!(conn.failure(), Some(err));
    assert_eq!(conn.pending_waiters(), 0);
    assert!(matches!(
        conn.switch_command(1, true).await,
        Err(ApiError::Send(_))
    ));
}

#[tokio::test]
async fn corrupt_frame_fails_connection() {
    let (conn, mut session) = ready_pair(|c| c).await;

    session.send_raw(&[0x01, 0x00, 0x07]).await;

    wait_for_state(&conn, ConnectionState::Failed).await;
    let failure = conn.failure().expect("failure should be recorded");
    assert_eq!(failure.kind(), "parse");
}

#[tokio::test]
async fn device_closing_socket_fails_connection() {
    let (conn, session) = ready_pair(|c| c).await;

    drop(session);

    wait_for_state(&conn, ConnectionState::Failed).await;
    assert!(matches!(conn.failure(), Some(ApiError::Network(_))));
}

#[tokio::test]
async fn connect_to_closed_port_is_network_error() {
    let port = {
        let device = FakeDevice::bind().await;
        device.port()
    };
    let conn = Connection::new(config(port));

    let err = conn.connect().await.expect_err("nothing listens");
    assert!(matches!(err, ApiError::Network(_)), "{err:?}");
    assert_eq!(conn.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn calls_before_connect_are_refused() {
    let conn = Connection::new(config(0));

    assert!(matches!(conn.ping().await, Err(ApiError::Network(_))));
    assert!(matches!(conn.disconnect().await, Err(ApiError::Network(_))));
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}
