//! Stream adapter for the channel-based watch variants.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Values published by a watch, in publish order.
///
/// Ends once the watch is cancelled or its setup failed. Dropping it cancels
/// the feeding watch the next time that watch publishes.
///
/// The buffer is unbounded and a collection watch publishes a full copy of
/// its mirror per event, so a consumer that falls behind holds one copy per
/// pending event. Such a consumer should read with [`Updates::latest`].
pub struct Updates<T> {
    receiver: UnboundedReceiver<T>,
}

impl<T> Updates<T> {
    pub(crate) fn channel() -> (UnboundedSender<T>, Self) {
        let (tx, receiver) = futures::channel::mpsc::unbounded();
        (tx, Updates { receiver })
    }

    /// Next published value, `None` once the watch has ended.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.next().await
    }

    /// Next value if one is already buffered.
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next value, then discard everything buffered behind it
    /// and return the newest one.
    pub async fn latest(&mut self) -> Option<T> {
        let mut newest = self.recv().await?;
        while let Some(next) = self.try_recv() {
            newest = next;
        }
        Some(newest)
    }
}

impl<T> Stream for Updates<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}
