//! Client for the esphome native API.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP resolve/connect and cancellable socket halves
//! - [`frame`]: varint envelope codec and frame reader/writer
//! - [`proto`]: message schemas and the type id registry
//! - [`client`]: connection, handshake, dispatcher and event streams (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use esphome_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use esphome_frame::*;
}

/// Re-export message schemas.
pub mod proto {
    pub use esphome_proto::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use esphome_client::*;
}

#[cfg(feature = "client")]
pub use esphome_client::{ApiError, Connection, ConnectionConfig, ConnectionState};
