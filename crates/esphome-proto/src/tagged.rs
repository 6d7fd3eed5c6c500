use esphome_frame::TaggedMessage;

use crate::error::{ProtoError, Result};
use crate::schema::{Message, Schema};

/// Typed access to a [`TaggedMessage`] holding a native API message.
///
/// Every accessor compares the tagged type id with `S::TYPE_ID` before
/// looking at the value.
pub trait TaggedExt {
    fn holds<S: Schema>(&self) -> bool;

    fn to_schema<S: Schema>(&self) -> Option<&S>;

    fn into_schema<S: Schema>(self) -> Result<S>;
}

impl TaggedExt for TaggedMessage<Message> {
    fn holds<S: Schema>(&self) -> bool {
        self.is(S::TYPE_ID)
    }

    fn to_schema<S: Schema>(&self) -> Option<&S> {
        if !self.holds::<S>() {
            return None;
        }
        S::from_message_ref(self.message())
    }

    fn into_schema<S: Schema>(self) -> Result<S> {
        let actual = self.type_id();
        if actual != S::TYPE_ID {
            return Err(ProtoError::WrongSchema {
                expected: S::NAME,
                actual,
            });
        }
        S::from_message(self.into_message()).map_err(|_| ProtoError::WrongSchema {
            expected: S::NAME,
            actual,
        })
    }
}

/// Tag a message with the protocol type id of its schema.
pub fn tag(message: impl Into<Message>) -> TaggedMessage<Message> {
    let message = message.into();
    TaggedMessage::new(message.kind().type_id(), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ConnectResponse, HelloResponse, PingResponse};

    #[test]
    fn conversion_only_for_matching_id() {
        let tagged = tag(ConnectResponse {
            invalid_password: true,
        });
        assert_eq!(tagged.type_id(), 4);
        assert!(tagged.holds::<ConnectResponse>());
        assert!(!tagged.holds::<HelloResponse>());
        assert!(tagged.to_schema::<PingResponse>().is_none());
        assert!(tagged.to_schema::<ConnectResponse>().unwrap().invalid_password);

        let err = tagged.clone().into_schema::<HelloResponse>().unwrap_err();
        assert_eq!(
            err,
            ProtoError::WrongSchema {
                expected: "HelloResponse",
                actual: 4
            }
        );
        assert!(tagged.into_schema::<ConnectResponse>().is_ok());
    }

    #[test]
    fn mismatched_tag_is_not_trusted() {
        // A tag that disagrees with the value never yields the value.
        let forged = TaggedMessage::new(8, Message::from(ConnectResponse::default()));
        assert!(forged.to_schema::<ConnectResponse>().is_none());
        assert!(forged.to_schema::<PingResponse>().is_none());
    }
}
