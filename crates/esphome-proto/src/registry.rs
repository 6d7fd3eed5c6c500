use std::collections::HashMap;

use bytes::BytesMut;
use esphome_frame::Registry;
use tracing::debug;

use crate::error::{ProtoError, Result};
use crate::schema::{Message, MessageKind, Schema};

/// Type id table mapping wire ids to message schemas and back.
#[derive(Debug, Clone, Default)]
pub struct MessageRegistry {
    by_id: HashMap<u32, MessageKind>,
    by_kind: HashMap<MessageKind, u32>,
}

impl MessageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every schema this crate defines.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for &kind in MessageKind::ALL {
            // Ids in MessageKind::ALL are unique, checked by the schema tests.
            let _ = registry.register_kind(kind);
        }
        registry
    }

    /// Register schema `S` under its protocol type id.
    pub fn register<S: Schema>(&mut self) -> Result<()> {
        self.register_kind(S::KIND)
    }

    pub fn register_kind(&mut self, kind: MessageKind) -> Result<()> {
        let type_id = kind.type_id();
        match self.by_id.get(&type_id) {
            Some(&existing) if existing == kind => return Ok(()),
            Some(&existing) => {
                return Err(ProtoError::DuplicateTypeId {
                    type_id,
                    existing: existing.name(),
                })
            }
            None => {}
        }

        debug!(type_id, schema = kind.name(), "registered schema");
        self.by_id.insert(type_id, kind);
        self.by_kind.insert(kind, type_id);
        Ok(())
    }

    pub fn type_id_of_kind(&self, kind: MessageKind) -> Option<u32> {
        self.by_kind.get(&kind).copied()
    }

    pub fn kind_of(&self, type_id: u32) -> Option<MessageKind> {
        self.by_id.get(&type_id).copied()
    }

    pub fn name_of(&self, type_id: u32) -> Option<&'static str> {
        self.kind_of(type_id).map(MessageKind::name)
    }

    /// Registered type ids, ascending.
    pub fn type_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Decode `payload` as the schema registered under `type_id`.
    pub fn decode(&self, type_id: u32, payload: &[u8]) -> Result<Message> {
        let kind = self
            .kind_of(type_id)
            .ok_or(ProtoError::UnknownTypeId(type_id))?;
        Message::decode_as(kind, payload).map_err(|err| ProtoError::Decode {
            schema: kind.name(),
            reason: err.to_string(),
        })
    }
}

impl Registry for MessageRegistry {
    type Message = Message;

    fn type_id_of(&self, message: &Message) -> Option<u32> {
        self.type_id_of_kind(message.kind())
    }

    fn contains(&self, type_id: u32) -> bool {
        self.by_id.contains_key(&type_id)
    }

    fn name_of(&self, message: &Message) -> &'static str {
        message.kind().name()
    }

    fn encoded_len(&self, message: &Message) -> usize {
        message.payload_len()
    }

    fn encode_payload(
        &self,
        message: &Message,
        dst: &mut BytesMut,
    ) -> std::result::Result<(), String> {
        message.encode_payload(dst).map_err(|err| err.to_string())
    }

    fn decode_payload(&self, type_id: u32, payload: &[u8]) -> std::result::Result<Message, String> {
        let kind = self
            .kind_of(type_id)
            .ok_or_else(|| format!("no schema registered for type id {type_id}"))?;
        Message::decode_as(kind, payload).map_err(|err| format!("{}: {err}", kind.name()))
    }
}
