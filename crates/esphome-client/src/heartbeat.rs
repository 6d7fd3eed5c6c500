//! Periodic ping while the connection is ready.
//!
//! A single missed pong is fatal: the connection moves to `Failed`.

use std::sync::Arc;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{trace, warn};

use crate::connection::Shared;
use crate::error::ApiError;
use crate::state::ConnectionState;

pub(crate) async fn run(shared: Arc<Shared>) {
    let period = shared.config.heartbeat_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        if shared.state() != ConnectionState::Ready {
            continue;
        }

        match shared.ping().await {
            Ok(rtt) => trace!(?rtt, "heartbeat"),
            Err(err) => {
                // Torn down while the ping was in flight.
                if shared.state() != ConnectionState::Ready {
                    return;
                }
                warn!(
                    host = %shared.config.host,
                    error = %err,
                    "heartbeat missed, closing connection"
                );
                shared.fail(ApiError::Timeout(format!("heartbeat: {err}")));
                return;
            }
        }
    }
}
