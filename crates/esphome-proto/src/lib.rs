//! Message schemas of the esphome native API.
//!
//! Each schema is a prost message with a stable type id. [`Message`] is the
//! closed union over all of them, and [`MessageRegistry`] is the type id
//! table the frame codec consults to encode and decode payloads.

pub mod api;
pub mod error;
pub mod registry;
pub mod schema;
pub mod tagged;

pub use error::{ProtoError, Result};
pub use registry::MessageRegistry;
pub use schema::{Message, MessageKind, Schema, LIST_ENTITIES_RESPONSES, STATE_RESPONSES};
pub use tagged::{tag, TaggedExt};

/// API version this client speaks.
pub const API_VERSION_MAJOR: u32 = 1;
pub const API_VERSION_MINOR: u32 = 10;
