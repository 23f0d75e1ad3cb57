//! Per-subscription state shared between a watcher task and its consumer.

use crate::core::stream::ReconnectingStream;
use kwatch_http::ConnectionId;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cancellation flag plus the stream a watcher opened, if any.
///
/// Every consumer callback runs through [`Subscription::deliver`], so none
/// starts after [`Subscription::cancel`] has returned.
#[derive(Debug, Default)]
pub struct Subscription {
    cancelled: AtomicBool,
    /// Held while a callback runs and while the flag is set. Reentrant so a
    /// callback may cancel its own subscription.
    gate: ReentrantMutex<()>,
    token: CancellationToken,
    stream: Mutex<Option<ReconnectingStream>>,
}

impl Subscription {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stop the subscription and tear down its stream. Idempotent and safe
    /// to call before the stream exists.
    ///
    /// Waits for a callback running on another thread to finish.
    pub fn cancel(&self) {
        {
            let _gate = self.gate.lock();
            if self.cancelled.swap(true, Ordering::SeqCst) {
                return;
            }
        }
        self.token.cancel();
        let stream = self.stream.lock().take();
        if let Some(stream) = stream {
            stream.cancel();
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run `f` unless the subscription is cancelled. Returns false if it
    /// was skipped.
    pub fn deliver(&self, f: impl FnOnce()) -> bool {
        let _gate = self.gate.lock();
        if self.is_cancelled() {
            return false;
        }
        f();
        true
    }

    /// Resolves once [`Subscription::cancel`] has been called.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Hand the opened stream to the subscription. A stream attached after
    /// cancellation is cancelled on the spot.
    pub fn attach(&self, stream: ReconnectingStream) {
        let mut slot = self.stream.lock();
        if self.is_cancelled() {
            drop(slot);
            stream.cancel();
        } else {
            *slot = Some(stream);
        }
    }

    pub fn has_stream(&self) -> bool {
        self.stream.lock().is_some()
    }

    pub fn current_handle(&self) -> Option<ConnectionId> {
        self.stream
            .lock()
            .as_ref()
            .and_then(ReconnectingStream::current_handle)
    }
}

/// Consumer-side handle of a watch.
///
/// Dropping the handle leaves the watch running; call [`WatchHandle::cancel`].
#[derive(Clone, Debug)]
pub struct WatchHandle {
    inner: Arc<Subscription>,
}

impl WatchHandle {
    pub(crate) fn new(inner: Arc<Subscription>) -> Self {
        Self { inner }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// True once the initial fetch succeeded and the stream was opened.
    pub fn is_streaming(&self) -> bool {
        self.inner.has_stream()
    }

    /// Id of the live stream connection, for telling reconnects apart.
    pub fn current_handle(&self) -> Option<ConnectionId> {
        self.inner.current_handle()
    }
}
