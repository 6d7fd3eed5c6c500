//! Timeout-bounded TCP transport for the esphome native API.
//!
//! This is the lowest layer of the client. It knows nothing about the wire
//! protocol: it resolves host names, opens sockets and moves bytes, with
//! every blocking step raced against a timer and a cancellation token.
//!
//! Everything else builds on the [`TransportReader`] / [`TransportWriter`]
//! halves produced by [`Transport::split`].

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::{BoxedStream, IoStream, Transport, TransportReader, TransportWriter};
pub use tcp::{connect, resolve, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, DEFAULT_RESOLVE_TIMEOUT};
