use bytes::BytesMut;

/// Mapping between numeric type ids and message schemas.
///
/// The frame codec consults a registry to find the type id of an outgoing
/// message, to encode its payload, and to parse incoming payloads.
pub trait Registry: Send + Sync {
    /// Decoded message value, usually a closed union over all schemas.
    type Message: Send;

    /// Type id registered for the schema of `message`, if any.
    fn type_id_of(&self, message: &Self::Message) -> Option<u32>;

    /// Whether a schema is registered under `type_id`.
    fn contains(&self, type_id: u32) -> bool;

    /// Schema name of `message`, for diagnostics.
    fn name_of(&self, message: &Self::Message) -> &'static str;

    /// Exact byte length [`Registry::encode_payload`] will produce.
    fn encoded_len(&self, message: &Self::Message) -> usize;

    /// Append the serialized payload of `message` to `dst`.
    fn encode_payload(
        &self,
        message: &Self::Message,
        dst: &mut BytesMut,
    ) -> std::result::Result<(), String>;

    /// Parse `payload` as the schema registered under `type_id`.
    fn decode_payload(
        &self,
        type_id: u32,
        payload: &[u8],
    ) -> std::result::Result<Self::Message, String>;
}

/// A decoded message tagged with the type id it arrived under.
///
/// The codec only builds these from a registry lookup, so the dynamic
/// schema of the value always matches `type_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedMessage<M> {
    type_id: u32,
    message: M,
}

impl<M> TaggedMessage<M> {
    /// Tag `message` with `type_id`. The caller vouches that they match.
    pub fn new(type_id: u32, message: M) -> Self {
        Self { type_id, message }
    }

    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    pub fn message(&self) -> &M {
        &self.message
    }

    pub fn into_message(self) -> M {
        self.message
    }

    /// True when this message was tagged with `type_id`.
    pub fn is(&self, type_id: u32) -> bool {
        self.type_id == type_id
    }
}
