//! Single-item watcher: fetch one resource, then follow its snapshots.

use crate::core::error::{ErrorCallback, WatchError};
use crate::core::stream::{ReconnectingStream, StreamOptions};
use crate::core::subscription::Subscription;
use kwatch_http::client::{combine_path, watch_item_path, DecodeMode, Payload};
use kwatch_http::{ApiClient, Resource};
use std::sync::Arc;

/// Pull the `object` out of a `{type, object}` frame. The type is not
/// inspected.
pub(crate) fn decode_object(payload: Payload, path: &str) -> Option<Resource> {
    let object = payload
        .into_json()
        .and_then(|mut v| v.get_mut("object").map(serde_json::Value::take));
    let Some(object) = object else {
        tracing::warn!(path = %path, "Dropping watch frame without object");
        return None;
    };
    match serde_json::from_value::<Resource>(object) {
        Ok(resource) => Some(resource),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Dropping malformed watch object");
            None
        }
    }
}

fn report(sub: &Subscription, on_error: Option<ErrorCallback>, err: WatchError) {
    if let Some(on_error) = on_error {
        sub.deliver(|| on_error(err));
    }
}

/// Run a single-item watch on `sub`.
pub(crate) fn spawn<I>(
    api: ApiClient,
    collection_path: String,
    name: String,
    sub: Arc<Subscription>,
    mut on_item: I,
    on_error: Option<ErrorCallback>,
    options: StreamOptions,
) where
    I: FnMut(Resource) + Send + 'static,
{
    tokio::spawn(async move {
        if name.is_empty() || name.contains('/') {
            tracing::error!(url = %collection_path, name = %name, "Invalid item name");
            report(&sub, on_error, WatchError::InvalidName(name));
            return;
        }

        let item_path = combine_path(&collection_path, &name);
        let fetched = tokio::select! {
            biased;
            _ = sub.cancelled() => return,
            res = api.fetch::<Resource>(&item_path) => res,
        };

        let item = match fetched {
            Ok(item) => item,
            Err(e) => {
                tracing::error!(url = %item_path, error = %e, "Error in api request");
                report(&sub, on_error, e.into());
                return;
            }
        };
        if !sub.deliver(|| on_item(item)) {
            return;
        }

        let watch_path = watch_item_path(&collection_path, &name);
        let guard = sub.clone();
        let stream = ReconnectingStream::start(
            api,
            watch_path.clone(),
            move |payload| {
                let Some(item) = decode_object(payload, &watch_path) else {
                    return;
                };
                guard.deliver(|| on_item(item));
            },
            options.with_decode(DecodeMode::Json),
        );
        sub.attach(stream);
    });
}
