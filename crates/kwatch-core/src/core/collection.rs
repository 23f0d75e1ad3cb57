//! Collection watcher: list once, then reconcile deltas into a [`Mirror`].

use crate::core::error::{ErrorCallback, WatchError};
use crate::core::mirror::Mirror;
use crate::core::stream::{ReconnectingStream, StreamOptions};
use crate::core::subscription::Subscription;
use kwatch_http::client::{watch_collection_path, DecodeMode, Payload};
use kwatch_http::{ApiClient, Resource, ResourceList, WatchEvent};
use std::sync::Arc;

/// Decode one frame as a delta event. Undecodable frames are logged and
/// dropped.
pub(crate) fn decode_event(payload: Payload, path: &str) -> Option<WatchEvent> {
    let Some(value) = payload.into_json() else {
        tracing::warn!(path = %path, "Dropping non-JSON watch frame");
        return None;
    };
    match serde_json::from_value::<WatchEvent>(value) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Dropping malformed watch event");
            None
        }
    }
}

/// Run a collection watch on `sub`.
///
/// `on_collection` receives the whole mirror after seeding and after every
/// decoded event, including events that changed nothing.
pub(crate) fn spawn<C>(
    api: ApiClient,
    path: String,
    sub: Arc<Subscription>,
    mut on_collection: C,
    on_error: Option<ErrorCallback>,
    options: StreamOptions,
) where
    C: FnMut(Vec<Resource>) + Send + 'static,
{
    tokio::spawn(async move {
        let fetched = tokio::select! {
            biased;
            _ = sub.cancelled() => return,
            res = api.fetch::<ResourceList>(&path) => res,
        };

        let list = match fetched {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(url = %path, error = %e, "Error in api request");
                if let Some(on_error) = on_error {
                    sub.deliver(|| on_error(WatchError::from(e)));
                }
                return;
            }
        };

        let marker = list.resource_version().map(str::to_string);
        let mut mirror = Mirror::new();
        let seeded = mirror.seed(list);
        tracing::debug!(url = %path, items = seeded, resource_version = ?marker, "Collection seeded");
        let snapshot = mirror.snapshot();
        if !sub.deliver(|| on_collection(snapshot)) {
            return;
        }

        if marker.is_none() {
            tracing::warn!(url = %path, "List has no resourceVersion, watching from now");
        }
        let watch_path = watch_collection_path(&path, marker.as_deref());
        let guard = sub.clone();
        let stream = ReconnectingStream::start(
            api,
            watch_path.clone(),
            move |payload| {
                let Some(event) = decode_event(payload, &watch_path) else {
                    return;
                };
                let applied = mirror.apply(event);
                tracing::trace!(path = %watch_path, ?applied, size = mirror.len(), "Applied update");
                let snapshot = mirror.snapshot();
                guard.deliver(|| on_collection(snapshot));
            },
            options.with_decode(DecodeMode::Json),
        );
        sub.attach(stream);
    });
}
