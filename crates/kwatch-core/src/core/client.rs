//! Consumer-facing entry point.

use crate::core::collection;
use crate::core::error::{ErrorCallback, Result, WatchError};
use crate::core::item;
use crate::core::stream::{ReconnectingStream, StreamOptions};
use crate::core::subscription::{Subscription, WatchHandle};
use crate::core::updates::Updates;
use kwatch_http::client::Payload;
use kwatch_http::{ApiClient, ClientConfig, Resource, TokenSource, WatchNetwork};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Opens watches against one server.
///
/// Every watch method must be called from within a tokio runtime.
#[derive(Clone)]
pub struct WatchClient {
    api: ApiClient,
    options: StreamOptions,
}

impl WatchClient {
    pub fn new(
        network: Arc<dyn WatchNetwork>,
        auth: Arc<dyn TokenSource>,
        config: ClientConfig,
    ) -> Self {
        Self::from_api(ApiClient::new(network, auth, config))
    }

    /// Client using the native reqwest / websocket network.
    pub fn native(config: ClientConfig, auth: Arc<dyn TokenSource>) -> Result<Self> {
        Ok(Self::from_api(ApiClient::native(config, auth)?))
    }

    pub fn from_api(api: ApiClient) -> Self {
        Self {
            api,
            options: StreamOptions::default(),
        }
    }

    /// Stream options applied to every watch opened by this client.
    #[must_use]
    pub fn with_stream_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn config(&self) -> &ClientConfig {
        self.api.config()
    }

    /// One-shot fetch of `path` decoded as `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(self.api.fetch(path).await?)
    }

    /// Open a raw reconnecting stream.
    pub fn open_stream<F>(&self, path: &str, on_message: F, options: StreamOptions) -> ReconnectingStream
    where
        F: FnMut(Payload) + Send + 'static,
    {
        ReconnectingStream::start(self.api.clone(), path, on_message, options)
    }

    /// Watch a collection, publishing the full mirror to `on_collection`
    /// after the initial list and after every event.
    pub fn watch_collection_with<C>(
        &self,
        path: &str,
        on_collection: C,
        on_error: Option<ErrorCallback>,
    ) -> WatchHandle
    where
        C: FnMut(Vec<Resource>) + Send + 'static,
    {
        let sub = Subscription::new();
        collection::spawn(
            self.api.clone(),
            path.to_string(),
            sub.clone(),
            on_collection,
            on_error,
            self.options.clone(),
        );
        WatchHandle::new(sub)
    }

    /// Channel variant of [`WatchClient::watch_collection_with`].
    ///
    /// A setup failure arrives as the single `Err` item before the stream
    /// ends.
    pub fn watch_collection(&self, path: &str) -> (WatchHandle, Updates<Result<Vec<Resource>>>) {
        let (tx, updates) = Updates::channel();
        let sub = Subscription::new();
        let err_tx = tx.clone();
        let stop = Arc::downgrade(&sub);
        collection::spawn(
            self.api.clone(),
            path.to_string(),
            sub.clone(),
            move |items| {
                if tx.unbounded_send(Ok(items)).is_err() {
                    cancel_dropped(&stop);
                }
            },
            Some(Box::new(move |e: WatchError| {
                let _ = err_tx.unbounded_send(Err(e));
            })),
            self.options.clone(),
        );
        (WatchHandle::new(sub), updates)
    }

    /// Watch one item of a collection by name.
    pub fn watch_item_with<I>(
        &self,
        collection_path: &str,
        name: &str,
        on_item: I,
        on_error: Option<ErrorCallback>,
    ) -> WatchHandle
    where
        I: FnMut(Resource) + Send + 'static,
    {
        let sub = Subscription::new();
        item::spawn(
            self.api.clone(),
            collection_path.to_string(),
            name.to_string(),
            sub.clone(),
            on_item,
            on_error,
            self.options.clone(),
        );
        WatchHandle::new(sub)
    }

    /// Channel variant of [`WatchClient::watch_item_with`].
    pub fn watch_item(
        &self,
        collection_path: &str,
        name: &str,
    ) -> (WatchHandle, Updates<Result<Resource>>) {
        let (tx, updates) = Updates::channel();
        let sub = Subscription::new();
        let err_tx = tx.clone();
        let stop = Arc::downgrade(&sub);
        item::spawn(
            self.api.clone(),
            collection_path.to_string(),
            name.to_string(),
            sub.clone(),
            move |item| {
                if tx.unbounded_send(Ok(item)).is_err() {
                    cancel_dropped(&stop);
                }
            },
            Some(Box::new(move |e: WatchError| {
                let _ = err_tx.unbounded_send(Err(e));
            })),
            self.options.clone(),
        );
        (WatchHandle::new(sub), updates)
    }
}

/// The consumer dropped its [`Updates`]; nobody is listening any more.
fn cancel_dropped(sub: &std::sync::Weak<Subscription>) {
    if let Some(sub) = sub.upgrade() {
        tracing::debug!("Update receiver dropped, cancelling watch");
        sub.cancel();
    }
}
