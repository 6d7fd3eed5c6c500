//! Correlates decoded inbound frames with the callers waiting for them.
//!
//! Callers register a predicate over type ids and get either a
//! [`PendingReply`] (the next matching frame, once) or a [`Subscription`]
//! (every matching frame until dropped). The receive loop hands each frame
//! to [`Dispatcher::deliver`], which drains the waiter list under the lock
//! and offers the frame to each waiter outside of it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use esphome_frame::TaggedMessage;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::error::{ApiError, Result};

type Predicate = Box<dyn Fn(u32) -> bool + Send + Sync>;

enum Slot<M> {
    Once(Option<oneshot::Sender<Result<TaggedMessage<M>>>>),
    Stream(mpsc::UnboundedSender<TaggedMessage<M>>),
}

struct Waiter<M> {
    id: u64,
    predicate: Predicate,
    slot: Slot<M>,
}

impl<M> Waiter<M> {
    /// The call site has gone away or the waiter was already served.
    fn is_closed(&self) -> bool {
        match &self.slot {
            Slot::Once(Some(tx)) => tx.is_closed(),
            Slot::Once(None) => true,
            Slot::Stream(tx) => tx.is_closed(),
        }
    }

    fn fail(self, reason: &ApiError) {
        // Dropping a stream sender ends the subscription.
        if let Slot::Once(Some(tx)) = self.slot {
            let _ = tx.send(Err(reason.clone()));
        }
    }
}

struct Waiters<M> {
    list: Vec<Waiter<M>>,
    closed: Option<ApiError>,
}

struct Inner<M> {
    waiters: Mutex<Waiters<M>>,
    next_id: AtomicU64,
}

impl<M> Inner<M> {
    fn lock(&self) -> MutexGuard<'_, Waiters<M>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) {
        self.lock().list.retain(|waiter| waiter.id != id);
    }
}

/// Registry of pending waiters, shared by call sites and the receive loop.
pub struct Dispatcher<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> Default for Dispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Dispatcher<M> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                waiters: Mutex::new(Waiters {
                    list: Vec::new(),
                    closed: None,
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Wait for the next frame whose type id satisfies `predicate`.
    ///
    /// Once the dispatcher is closed the reply resolves immediately with the
    /// close reason.
    pub fn register_waiter<F>(&self, predicate: F) -> PendingReply<M>
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let id = self.push(predicate, Slot::Once(Some(tx)));
        PendingReply {
            id,
            rx,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Receive every frame whose type id satisfies `predicate`, in order,
    /// until the subscription is dropped or the dispatcher closes.
    pub fn subscribe<F>(&self, predicate: F) -> Subscription<M>
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.push(predicate, Slot::Stream(tx));
        Subscription {
            id,
            rx,
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn push<F>(&self, predicate: F, slot: Slot<M>) -> u64
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let waiter = Waiter {
            id,
            predicate: Box::new(predicate),
            slot,
        };

        let mut waiters = self.inner.lock();
        match &waiters.closed {
            Some(reason) => {
                let reason = reason.clone();
                drop(waiters);
                waiter.fail(&reason);
            }
            None => waiters.list.push(waiter),
        }
        id
    }

    /// Close the dispatcher. Pending replies resolve with `reason`,
    /// subscriptions end, and later registrations fail the same way.
    pub fn close(&self, reason: ApiError) {
        let drained = {
            let mut waiters = self.inner.lock();
            if waiters.closed.is_some() {
                return;
            }
            waiters.closed = Some(reason.clone());
            std::mem::take(&mut waiters.list)
        };

        trace!(waiters = drained.len(), %reason, "dispatcher closed");
        for waiter in drained {
            waiter.fail(&reason);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed.is_some()
    }

    pub fn close_reason(&self) -> Option<ApiError> {
        self.inner.lock().closed.clone()
    }

    /// Registered waiters and subscriptions.
    pub fn waiter_count(&self) -> usize {
        self.inner.lock().list.len()
    }
}

impl<M: Clone> Dispatcher<M> {
    /// Offer `message` to every waiter registered before this call.
    ///
    /// Single-shot waiters that match are resolved and removed. Waiters
    /// that do not match stay registered, ahead of any that registered
    /// while this pass was running. With no matching waiter the frame is
    /// dropped.
    pub fn deliver(&self, message: TaggedMessage<M>) {
        let drained = {
            let mut waiters = self.inner.lock();
            if waiters.closed.is_some() {
                return;
            }
            std::mem::take(&mut waiters.list)
        };

        let type_id = message.type_id();
        let mut kept = Vec::with_capacity(drained.len());
        let mut matched = 0usize;

        for mut waiter in drained {
            if waiter.is_closed() {
                continue;
            }
            if !(waiter.predicate)(type_id) {
                kept.push(waiter);
                continue;
            }

            matched += 1;
            match &mut waiter.slot {
                Slot::Once(tx) => {
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(Ok(message.clone()));
                    }
                }
                Slot::Stream(tx) => {
                    if tx.send(message.clone()).is_ok() {
                        kept.push(waiter);
                    }
                }
            }
        }

        if matched == 0 {
            trace!(type_id, "no waiter for frame, dropped");
        }

        let mut waiters = self.inner.lock();
        if let Some(reason) = waiters.closed.clone() {
            drop(waiters);
            for waiter in kept {
                waiter.fail(&reason);
            }
            return;
        }
        // Callers may have dropped their waiter while the list was drained.
        kept.retain(|waiter| !waiter.is_closed());
        kept.append(&mut waiters.list);
        waiters.list = kept;
    }
}

/// A registered single-shot waiter.
///
/// Dropping it, including through a timeout, removes the registration.
pub struct PendingReply<M> {
    id: u64,
    rx: oneshot::Receiver<Result<TaggedMessage<M>>>,
    inner: Weak<Inner<M>>,
}

impl<M> PendingReply<M> {
    /// Wait up to `timeout` for the matching frame.
    pub async fn wait(mut self, timeout: Duration) -> Result<TaggedMessage<M>> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ApiError::Cancelled("dispatcher dropped".to_string())),
            Err(_) => Err(ApiError::Timeout(format!("no reply within {timeout:?}"))),
        }
    }
}

impl<M> Drop for PendingReply<M> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove(self.id);
        }
    }
}

/// A registered multi-shot waiter.
pub struct Subscription<M> {
    id: u64,
    rx: mpsc::UnboundedReceiver<TaggedMessage<M>>,
    inner: Weak<Inner<M>>,
}

impl<M> Subscription<M> {
    /// Next matching frame, or `None` once the dispatcher has closed.
    pub async fn recv(&mut self) -> Option<TaggedMessage<M>> {
        self.rx.recv().await
    }

    /// Like [`Subscription::recv`], bounded by `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<TaggedMessage<M>> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(self.end_reason()),
            Err(_) => Err(ApiError::Timeout(format!("no message within {timeout:?}"))),
        }
    }

    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<TaggedMessage<M>>> {
        self.rx.poll_recv(cx)
    }

    /// Why the subscription ended, once it has.
    pub fn end_reason(&self) -> ApiError {
        self.inner
            .upgrade()
            .and_then(|inner| inner.lock().closed.clone())
            .unwrap_or_else(|| ApiError::Cancelled("dispatcher dropped".to_string()))
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove(self.id);
        }
    }
}
