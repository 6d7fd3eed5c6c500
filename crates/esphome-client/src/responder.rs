//! Answers for requests the device sends to the client.

use std::time::{SystemTime, UNIX_EPOCH};

use esphome_frame::TaggedMessage;
use esphome_proto::api::{DisconnectResponse, GetTimeResponse, PingResponse};
use esphome_proto::Message;
use tracing::{debug, info};

use crate::connection::Shared;
use crate::error::ApiError;
use crate::state::ConnectionState;

/// Handle `message` if it is a device request. Returns whether it was one.
pub(crate) async fn answer(shared: &Shared, message: &TaggedMessage<Message>) -> bool {
    let result = match message.message() {
        Message::PingRequest(_) => shared.send(PingResponse {}).await,
        Message::GetTimeRequest(_) => {
            shared
                .send(GetTimeResponse {
                    epoch_seconds: epoch_seconds(),
                })
                .await
        }
        Message::DisconnectRequest(_) => {
            info!(host = %shared.config.host, "device requested disconnect");
            let orderly = shared.transition(ConnectionState::Disconnecting);
            let result = shared.send(DisconnectResponse {}).await;
            if orderly {
                shared.finish_disconnect().await;
            } else {
                shared.fail(ApiError::Network(
                    "device ended the session during setup".to_string(),
                ));
            }
            result
        }
        _ => return false,
    };

    if let Err(err) = result {
        debug!(type_id = message.type_id(), error = %err, "answering device request failed");
    }
    true
}

fn epoch_seconds() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| u32::try_from(elapsed.as_secs()).ok())
        .unwrap_or(0)
}
