//! Varint envelope framing for the esphome native API.
//!
//! Every message on the plaintext protocol is framed as:
//! - a single `0x00` preamble byte
//! - a varint payload length
//! - a varint message type id
//!
//! followed by the schema-encoded payload. Payload parsing is delegated to a
//! [`Registry`], so this crate stays independent of the message schemas.

pub mod codec;
pub mod error;
pub mod reader;
pub mod registry;
pub mod varint;
pub mod writer;

pub use codec::{
    decode_frame, decode_multiple, decode_one, decode_payload, encode_frame, serialize, ApiCodec,
    Frame, FrameConfig, UnknownTypePolicy, DEFAULT_MAX_PAYLOAD, PREAMBLE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use registry::{Registry, TaggedMessage};
pub use writer::FrameWriter;
