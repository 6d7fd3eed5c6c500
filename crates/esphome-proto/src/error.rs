/// Errors raised by the message registry and typed message access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    /// Another schema already owns this type id.
    #[error("type id {type_id} is already registered to {existing}")]
    DuplicateTypeId {
        type_id: u32,
        existing: &'static str,
    },

    /// No schema is registered under the type id.
    #[error("no schema registered for type id {0}")]
    UnknownTypeId(u32),

    /// The payload does not parse as the registered schema.
    #[error("invalid {schema} payload: {reason}")]
    Decode {
        schema: &'static str,
        reason: String,
    },

    /// A tagged message was requested as a schema it does not hold.
    #[error("expected {expected}, message holds type id {actual}")]
    WrongSchema { expected: &'static str, actual: u32 },
}

pub type Result<T> = std::result::Result<T, ProtoError>;
