use std::sync::Arc;

use crate::connection::Shared;

/// Wait for the cancellation token and release everything bound to it.
///
/// Covers tokens cancelled from outside, such as a parent passed to
/// [`Connection::with_cancellation`](crate::Connection::with_cancellation).
pub(crate) async fn run(shared: Arc<Shared>) {
    shared.cancel.cancelled().await;
    shared.abort("connection cancelled");
}
