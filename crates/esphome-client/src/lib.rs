//! Async client for the esphome native API.
//!
//! [`Connection`] resolves and connects to a device, runs the hello and
//! connect handshake, and then serves request/response calls, commands and
//! event streams over one socket. A receive loop feeds every decoded frame
//! to the [`Dispatcher`]; a heartbeat pings the device while it is ready.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
mod handshake;
mod heartbeat;
pub mod model;
mod receiver;
mod responder;
pub mod state;
pub mod stream;
mod watchdog;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use dispatcher::{Dispatcher, PendingReply, Subscription};
pub use error::{ApiError, Result};
pub use model::{
    ApiVersion, ColorMode, DeviceInfo, EntityCategory, EntityDetails, EntityInfo, EntityKind,
    EntityState, HelloInfo, LightCommand, LightState, LogEntry, LogLevel,
};
pub use state::ConnectionState;
pub use stream::{EventStream, LogStream, StateStream};
pub use tokio_util::sync::CancellationToken;
