//! Event streams over dispatcher subscriptions.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use esphome_proto::Message;
use futures_core::Stream;

use crate::dispatcher::Subscription;
use crate::error::ApiError;
use crate::model::{EntityState, LogEntry};

/// Matching frames converted into user values.
///
/// Ends when the connection ends. Frames that do not convert are skipped.
pub struct EventStream<T> {
    inner: Subscription<Message>,
    convert: fn(&Message) -> Option<T>,
}

pub type LogStream = EventStream<LogEntry>;
pub type StateStream = EventStream<EntityState>;

impl<T> EventStream<T> {
    pub(crate) fn with_converter(
        inner: Subscription<Message>,
        convert: fn(&Message) -> Option<T>,
    ) -> Self {
        Self { inner, convert }
    }

    pub async fn next(&mut self) -> Option<T> {
        loop {
            let tagged = self.inner.recv().await?;
            if let Some(item) = (self.convert)(tagged.message()) {
                return Some(item);
            }
        }
    }

    /// Why the stream ended.
    pub fn end_reason(&self) -> ApiError {
        self.inner.end_reason()
    }
}

impl LogStream {
    pub(crate) fn new(inner: Subscription<Message>) -> Self {
        Self::with_converter(inner, LogEntry::from_message)
    }
}

impl StateStream {
    pub(crate) fn new(inner: Subscription<Message>) -> Self {
        Self::with_converter(inner, EntityState::from_message)
    }
}

impl<T> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        loop {
            match ready!(this.inner.poll_recv(cx)) {
                Some(tagged) => {
                    if let Some(item) = (this.convert)(tagged.message()) {
                        return Poll::Ready(Some(item));
                    }
                }
                None => return Poll::Ready(None),
            }
        }
    }
}
