use bytes::BytesMut;

use crate::api::*;

/// A message schema with a stable type id on the wire.
pub trait Schema: prost::Message + Default + Clone + Sized + 'static {
    const KIND: MessageKind;
    const TYPE_ID: u32 = Self::KIND.type_id();
    const NAME: &'static str = Self::KIND.name();

    fn into_message(self) -> Message;

    /// Unwrap `message` if it holds this schema, otherwise hand it back.
    fn from_message(message: Message) -> Result<Self, Message>;

    fn from_message_ref(message: &Message) -> Option<&Self>;
}

macro_rules! messages {
    ($($id:literal => $name:ident),* $(,)?) => {
        /// Any message of the native API.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $($name($name),)*
        }

        /// Schema of a [`Message`], without its value.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum MessageKind {
            $($name,)*
        }

        impl MessageKind {
            pub const ALL: &'static [MessageKind] = &[$(MessageKind::$name,)*];

            /// Wire type id assigned by the protocol.
            pub const fn type_id(self) -> u32 {
                match self {
                    $(MessageKind::$name => $id,)*
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(MessageKind::$name => stringify!($name),)*
                }
            }

            pub fn from_type_id(type_id: u32) -> Option<Self> {
                match type_id {
                    $($id => Some(MessageKind::$name),)*
                    _ => None,
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|kind| kind.name() == name)
            }
        }

        impl Message {
            pub fn kind(&self) -> MessageKind {
                match self {
                    $(Message::$name(_) => MessageKind::$name,)*
                }
            }

            pub(crate) fn payload_len(&self) -> usize {
                match self {
                    $(Message::$name(m) => prost::Message::encoded_len(m),)*
                }
            }

            pub(crate) fn encode_payload(
                &self,
                dst: &mut BytesMut,
            ) -> Result<(), prost::EncodeError> {
                match self {
                    $(Message::$name(m) => prost::Message::encode(m, dst),)*
                }
            }

            pub(crate) fn decode_as(
                kind: MessageKind,
                payload: &[u8],
            ) -> Result<Self, prost::DecodeError> {
                match kind {
                    $(MessageKind::$name => {
                        <$name as prost::Message>::decode(payload).map(Message::$name)
                    })*
                }
            }
        }

        $(
            impl Schema for $name {
                const KIND: MessageKind = MessageKind::$name;

                fn into_message(self) -> Message {
                    Message::$name(self)
                }

                fn from_message(message: Message) -> Result<Self, Message> {
                    match message {
                        Message::$name(inner) => Ok(inner),
                        other => Err(other),
                    }
                }

                fn from_message_ref(message: &Message) -> Option<&Self> {
                    match message {
                        Message::$name(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$name> for Message {
                fn from(inner: $name) -> Self {
                    Message::$name(inner)
                }
            }
        )*
    };
}

messages! {
    1 => HelloRequest,
    2 => HelloResponse,
    3 => ConnectRequest,
    4 => ConnectResponse,
    5 => DisconnectRequest,
    6 => DisconnectResponse,
    7 => PingRequest,
    8 => PingResponse,
    9 => DeviceInfoRequest,
    10 => DeviceInfoResponse,
    11 => ListEntitiesRequest,
    12 => ListEntitiesBinarySensorResponse,
    13 => ListEntitiesCoverResponse,
    14 => ListEntitiesFanResponse,
    15 => ListEntitiesLightResponse,
    16 => ListEntitiesSensorResponse,
    17 => ListEntitiesSwitchResponse,
    18 => ListEntitiesTextSensorResponse,
    19 => ListEntitiesDoneResponse,
    20 => SubscribeStatesRequest,
    21 => BinarySensorStateResponse,
    22 => CoverStateResponse,
    23 => FanStateResponse,
    24 => LightStateResponse,
    25 => SensorStateResponse,
    26 => SwitchStateResponse,
    27 => TextSensorStateResponse,
    28 => SubscribeLogsRequest,
    29 => SubscribeLogsResponse,
    32 => LightCommandRequest,
    33 => SwitchCommandRequest,
    36 => GetTimeRequest,
    37 => GetTimeResponse,
    41 => ListEntitiesServicesResponse,
}

/// Responses a `ListEntitiesRequest` may produce, including the terminator.
pub const LIST_ENTITIES_RESPONSES: &[MessageKind] = &[
    MessageKind::ListEntitiesBinarySensorResponse,
    MessageKind::ListEntitiesCoverResponse,
    MessageKind::ListEntitiesFanResponse,
    MessageKind::ListEntitiesLightResponse,
    MessageKind::ListEntitiesSensorResponse,
    MessageKind::ListEntitiesSwitchResponse,
    MessageKind::ListEntitiesTextSensorResponse,
    MessageKind::ListEntitiesServicesResponse,
    MessageKind::ListEntitiesDoneResponse,
];

/// State updates pushed after a `SubscribeStatesRequest`.
pub const STATE_RESPONSES: &[MessageKind] = &[
    MessageKind::BinarySensorStateResponse,
    MessageKind::CoverStateResponse,
    MessageKind::FanStateResponse,
    MessageKind::LightStateResponse,
    MessageKind::SensorStateResponse,
    MessageKind::SwitchStateResponse,
    MessageKind::TextSensorStateResponse,
];
