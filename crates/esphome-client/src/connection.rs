//! Connection to one device: lifecycle, request/response calls and streams.
//!
//! A [`Connection`] owns three background tasks once the socket is up: the
//! receive loop, the heartbeat and a watchdog on the cancellation token.
//! All of them share one [`Shared`] value with the call sites.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use esphome_frame::{FrameError, FrameReader, FrameWriter};
use esphome_proto::api::{
    DeviceInfoRequest, DeviceInfoResponse, DisconnectRequest, DisconnectResponse,
    LightCommandRequest, ListEntitiesDoneResponse, ListEntitiesRequest, PingRequest,
    PingResponse, SubscribeLogsRequest, SubscribeLogsResponse, SubscribeStatesRequest,
    SwitchCommandRequest,
};
use esphome_proto::{
    Message, MessageRegistry, Schema, TaggedExt, LIST_ENTITIES_RESPONSES, STATE_RESPONSES,
};
use esphome_transport::{IoStream, Transport, TransportError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ApiError, Result};
use crate::model::{ApiVersion, DeviceInfo, EntityInfo, HelloInfo, LightCommand, LogLevel};
use crate::state::ConnectionState;
use crate::stream::{LogStream, StateStream};
use crate::{handshake, heartbeat, receiver, watchdog};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the call sites and the background tasks.
pub(crate) struct Shared {
    pub(crate) config: ConnectionConfig,
    pub(crate) registry: MessageRegistry,
    pub(crate) dispatcher: Dispatcher<Message>,
    pub(crate) cancel: CancellationToken,
    state: watch::Sender<ConnectionState>,
    writer: tokio::sync::Mutex<Option<FrameWriter>>,
    pub(crate) hello: OnceLock<HelloInfo>,
    failure: Mutex<Option<ApiError>>,
    /// Set once an orderly disconnect has finished.
    closed_cleanly: AtomicBool,
}

impl Shared {
    fn new(config: ConnectionConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            registry: MessageRegistry::with_defaults(),
            dispatcher: Dispatcher::new(),
            cancel,
            state: watch::Sender::new(ConnectionState::Disconnected),
            writer: tokio::sync::Mutex::new(None),
            hello: OnceLock::new(),
            failure: Mutex::new(None),
            closed_cleanly: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Move to `next` if the state machine allows it.
    pub(crate) fn transition(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|state| {
            if !state.can_transition(next) {
                return false;
            }
            debug!(from = %state, to = %next, "connection state changed");
            *state = next;
            true
        })
    }

    /// Like [`Shared::transition`], but an illegal move is an error.
    pub(crate) fn advance(&self, next: ConnectionState) -> Result<()> {
        if self.transition(next) {
            Ok(())
        } else {
            Err(self.unavailable())
        }
    }

    pub(crate) fn failure(&self) -> Option<ApiError> {
        lock(&self.failure).clone()
    }

    /// The error reported to callers when the connection cannot serve them.
    pub(crate) fn unavailable(&self) -> ApiError {
        self.failure()
            .unwrap_or_else(|| ApiError::Network(format!("connection is {}", self.state())))
    }

    /// Tear the connection down after an unrecoverable error.
    ///
    /// The first recorded failure wins. A connection that already
    /// disconnected cleanly stays `Disconnected`.
    pub(crate) fn fail(&self, err: ApiError) {
        let reason = {
            let mut failure = lock(&self.failure);
            let closed_cleanly = self.closed_cleanly.load(Ordering::Acquire);
            let entered = self.state.send_if_modified(|state| {
                match *state {
                    ConnectionState::Failed => return false,
                    ConnectionState::Disconnected if closed_cleanly => return false,
                    _ => {}
                }
                debug!(from = %state, to = "failed", error = %err, "connection state changed");
                *state = ConnectionState::Failed;
                true
            });
            if entered && failure.is_none() {
                *failure = Some(err.clone());
            }
            failure.clone().unwrap_or(err)
        };

        self.cancel.cancel();
        self.dispatcher.close(reason);
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
    }

    /// Stop everything because the cancellation signal fired.
    pub(crate) fn abort(&self, reason: &str) {
        self.fail(ApiError::Cancelled(reason.to_string()));
    }

    /// Write one message. A fatal write error fails the connection.
    pub(crate) async fn send(&self, message: impl Into<Message>) -> Result<()> {
        let message = message.into();
        let result = {
            let mut writer = self.writer.lock().await;
            let writer = writer.as_mut().ok_or_else(|| self.unavailable())?;
            writer.send(&self.registry, &message).await
        };

        result.map_err(|err| {
            let err = match err {
                // Part of the frame may already be on the wire.
                FrameError::Transport(err @ TransportError::Timeout { .. }) => {
                    ApiError::Send(format!("{err}; stream left mid-frame"))
                }
                other => ApiError::from(other),
            };
            if err.is_fatal() {
                self.fail(err.clone());
            }
            err
        })
    }

    /// Send `message` and wait for the next `S` from the device.
    ///
    /// The waiter is registered before the request is written.
    pub(crate) async fn request<S: Schema>(&self, message: impl Into<Message>) -> Result<S> {
        let expected = S::TYPE_ID;
        let pending = self.dispatcher.register_waiter(move |id| id == expected);
        self.send(message).await?;
        let reply = pending.wait(self.config.response_timeout).await?;
        Ok(reply.into_schema::<S>()?)
    }

    pub(crate) async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        self.request::<PingResponse>(PingRequest {}).await?;
        Ok(started.elapsed())
    }

    /// Close the socket after an orderly disconnect exchange.
    pub(crate) async fn finish_disconnect(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(err) = writer.close().await {
                debug!(error = %err, "closing write half failed");
            }
        }
        self.closed_cleanly.store(true, Ordering::Release);
        self.transition(ConnectionState::Disconnected);
        self.dispatcher.close(ApiError::Cancelled("connection closed".to_string()));
        self.cancel.cancel();
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state() == ConnectionState::Ready {
            Ok(())
        } else {
            Err(self.unavailable())
        }
    }
}

/// An async client session with one device.
///
/// A connection is used once: after it disconnects or fails, create a new
/// one to reconnect.
pub struct Connection {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::from_token(config, CancellationToken::new())
    }

    /// Bind the connection to an external cancellation token.
    ///
    /// Cancelling `parent` tears the connection down; [`Connection::cancel`]
    /// only affects this connection.
    pub fn with_cancellation(config: ConnectionConfig, parent: &CancellationToken) -> Self {
        Self::from_token(config, parent.child_token())
    }

    fn from_token(config: ConnectionConfig, cancel: CancellationToken) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, cancel)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Resolve, connect, and run the handshake until the connection is ready.
    pub async fn connect(&self) -> Result<()> {
        let shared = &self.shared;
        self.check_unused()?;
        shared.advance(ConnectionState::Resolving)?;

        let config = &shared.config;
        let dial = async {
            let addrs =
                esphome_transport::resolve(&config.host, config.port, config.resolve_timeout)
                    .await?;
            shared.advance(ConnectionState::Connecting)?;
            debug!(host = %config.host, candidates = addrs.len(), "resolved");
            Ok::<_, ApiError>(esphome_transport::connect(&addrs, config.connect_timeout).await?)
        };

        let dialed = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => {
                Err(ApiError::Cancelled("connect cancelled".to_string()))
            }
            result = dial => result,
        };

        match dialed {
            Ok(stream) => self.establish(stream).await,
            Err(err) => {
                shared.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Run the handshake over an already connected stream.
    pub async fn connect_with_stream(&self, stream: impl IoStream + 'static) -> Result<()> {
        self.check_unused()?;
        self.shared.advance(ConnectionState::Connecting)?;
        self.establish(stream).await
    }

    fn check_unused(&self) -> Result<()> {
        if self.shared.cancel.is_cancelled() {
            self.shared.abort("connection already closed");
            return Err(self
                .shared
                .failure()
                .unwrap_or_else(|| ApiError::Cancelled("connection already closed".to_string())));
        }
        Ok(())
    }

    async fn establish(&self, stream: impl IoStream + 'static) -> Result<()> {
        let shared = &self.shared;
        let frame_config = shared.config.frame_config();
        let (reader, writer) = Transport::new(stream, shared.cancel.clone()).split();
        *shared.writer.lock().await = Some(FrameWriter::with_config(writer, &frame_config));
        let reader = FrameReader::with_config(reader, &frame_config);

        self.spawn(receiver::run(Arc::clone(shared), reader));
        self.spawn(heartbeat::run(Arc::clone(shared)));
        self.spawn(watchdog::run(Arc::clone(shared)));

        match handshake::run(shared).await {
            Ok(hello) => {
                info!(
                    device = %hello.name,
                    api_version = %hello.api_version,
                    server = %hello.server_info,
                    "connected"
                );
                Ok(())
            }
            Err(err) => {
                shared.fail(err.clone());
                Err(err)
            }
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        lock(&self.tasks).push(tokio::spawn(task));
    }

    /// Ask the device to end the session, then close the socket.
    ///
    /// The socket is closed even when the device does not acknowledge.
    pub async fn disconnect(&self) -> Result<()> {
        let shared = &self.shared;
        shared.advance(ConnectionState::Disconnecting)?;
        let acked = shared
            .request::<DisconnectResponse>(DisconnectRequest {})
            .await;
        shared.finish_disconnect().await;
        info!(host = %shared.config.host, "disconnected");
        acked.map(drop)
    }

    /// Force the connection down from any state.
    ///
    /// Pending calls and streams end with [`ApiError::Cancelled`].
    pub fn cancel(&self) {
        self.shared.abort("connection cancelled");
    }

    /// Alias of [`Connection::cancel`].
    pub fn close(&self) {
        self.cancel();
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Observe state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// The error that moved the connection to `Failed`, if any.
    pub fn failure(&self) -> Option<ApiError> {
        self.shared.failure()
    }

    pub fn api_version(&self) -> Option<ApiVersion> {
        self.shared.hello.get().map(|hello| hello.api_version)
    }

    pub fn device_name(&self) -> Option<&str> {
        self.shared.hello.get().map(|hello| hello.name.as_str())
    }

    pub fn server_info(&self) -> Option<&str> {
        self.shared.hello.get().map(|hello| hello.server_info.as_str())
    }

    /// Round trip of one ping.
    pub async fn ping(&self) -> Result<Duration> {
        self.shared.ensure_ready()?;
        self.shared.ping().await
    }

    pub async fn device_info(&self) -> Result<DeviceInfo> {
        self.shared.ensure_ready()?;
        let info = self
            .shared
            .request::<DeviceInfoResponse>(DeviceInfoRequest {})
            .await?;
        Ok(info.into())
    }

    /// Every entity the device exposes, in the order it announced them.
    ///
    /// Frames outside the list-entities response set that arrive during the
    /// exchange are ignored.
    pub async fn list_entities(&self) -> Result<Vec<EntityInfo>> {
        let shared = &self.shared;
        shared.ensure_ready()?;

        let accepted: Vec<u32> = LIST_ENTITIES_RESPONSES
            .iter()
            .map(|kind| kind.type_id())
            .collect();
        let mut responses = shared.dispatcher.subscribe(move |id| accepted.contains(&id));
        shared.send(ListEntitiesRequest {}).await?;

        let mut entities = Vec::new();
        loop {
            let response = responses
                .recv_timeout(shared.config.response_timeout)
                .await?;
            if response.holds::<ListEntitiesDoneResponse>() {
                break;
            }
            if let Some(entity) = EntityInfo::from_message(response.message()) {
                entities.push(entity);
            }
        }
        debug!(count = entities.len(), "entities listed");
        Ok(entities)
    }

    /// Send a light command. The device does not answer.
    pub async fn light_command(&self, command: LightCommand) -> Result<()> {
        self.shared.ensure_ready()?;
        self.shared.send(LightCommandRequest::from(command)).await
    }

    /// Turn a switch on or off. The device does not answer.
    pub async fn switch_command(&self, key: u32, state: bool) -> Result<()> {
        self.shared.ensure_ready()?;
        self.shared.send(SwitchCommandRequest { key, state }).await
    }

    /// Ask the device to forward its log output at `level` and above.
    pub async fn subscribe_logs(&self, level: LogLevel, dump_config: bool) -> Result<LogStream> {
        self.shared.ensure_ready()?;
        let stream = self.log_stream();
        self.shared
            .send(SubscribeLogsRequest {
                level: level as i32,
                dump_config,
            })
            .await?;
        Ok(stream)
    }

    /// A new view of log lines, without sending another subscribe request.
    pub fn log_stream(&self) -> LogStream {
        let expected = SubscribeLogsResponse::TYPE_ID;
        LogStream::new(self.shared.dispatcher.subscribe(move |id| id == expected))
    }

    /// Ask the device to push entity state updates.
    pub async fn subscribe_states(&self) -> Result<StateStream> {
        self.shared.ensure_ready()?;
        let stream = self.state_stream();
        self.shared.send(SubscribeStatesRequest {}).await?;
        Ok(stream)
    }

    /// A new view of state updates, without sending another subscribe request.
    pub fn state_stream(&self) -> StateStream {
        let accepted: Vec<u32> = STATE_RESPONSES.iter().map(|kind| kind.type_id()).collect();
        StateStream::new(
            self.shared
                .dispatcher
                .subscribe(move |id| accepted.contains(&id)),
        )
    }

    /// Registered reply waiters and stream subscriptions.
    pub fn pending_waiters(&self) -> usize {
        self.shared.dispatcher.waiter_count()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.shared.config.host)
            .field("port", &self.shared.config.port)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.abort("connection dropped");
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}
