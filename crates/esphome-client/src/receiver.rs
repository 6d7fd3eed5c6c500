//! The receive loop: the only reader of the socket.

use std::sync::Arc;

use esphome_frame::{decode_payload, FrameReader, UnknownTypePolicy};
use tracing::{debug, trace, warn};

use crate::connection::Shared;
use crate::error::ApiError;
use crate::responder;
use crate::state::ConnectionState;

/// Decode frames until the socket ends, then report why.
///
/// Unknown type ids are skipped. A malformed frame fails the connection,
/// since later frame boundaries can no longer be trusted.
pub(crate) async fn run(shared: Arc<Shared>, mut reader: FrameReader) {
    let liveness = shared.config.liveness_timeout;

    loop {
        let frame = match reader.next_frame(liveness).await {
            Ok(frame) => frame,
            Err(err) => return stopped(&shared, err.into()),
        };
        trace!(type_id = frame.type_id, len = frame.payload.len(), "frame received");

        let message =
            match decode_payload(&frame, &shared.registry, None, UnknownTypePolicy::Skip) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(err) => {
                    warn!(type_id = frame.type_id, error = %err, "undecodable frame");
                    shared.fail(err.into());
                    return;
                }
            };

        if responder::answer(&shared, &message).await {
            continue;
        }
        shared.dispatcher.deliver(message);
    }
}

fn stopped(shared: &Shared, err: ApiError) {
    match (&err, shared.state()) {
        (ApiError::Cancelled(_), _) => debug!("receive loop cancelled"),
        (_, ConnectionState::Disconnecting | ConnectionState::Disconnected) => {
            debug!(reason = %err, "receive loop ended after disconnect")
        }
        _ => {
            warn!(host = %shared.config.host, error = %err, "receive loop failed");
            shared.fail(err);
        }
    }
}
