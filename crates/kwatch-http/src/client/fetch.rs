//! Main kwatch HTTP client.

use crate::client::auth::stream_protocols;
use crate::client::config::ClientConfig;
use crate::client::endpoint::combine_path;
use crate::client::native_network::NativeNetwork;
use crate::client::socket::{DecodeMode, Socket};
use crate::error::Result;
use crate::traits::{TokenSource, WatchNetwork};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Bundles the network, the credential source and the configuration.
#[derive(Clone)]
pub struct ApiClient {
    network: Arc<dyn WatchNetwork>,
    auth: Arc<dyn TokenSource>,
    config: Arc<ClientConfig>,
}

impl ApiClient {
    pub fn new(
        network: Arc<dyn WatchNetwork>,
        auth: Arc<dyn TokenSource>,
        config: ClientConfig,
    ) -> Self {
        ApiClient {
            network,
            auth,
            config: Arc::new(config),
        }
    }

    /// Client backed by reqwest and tokio-tungstenite.
    pub fn native(config: ClientConfig, auth: Arc<dyn TokenSource>) -> Result<Self> {
        config.validate()?;
        let network = Arc::new(NativeNetwork::new(&config)?);
        Ok(Self::new(network, auth, config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn network(&self) -> &Arc<dyn WatchNetwork> {
        &self.network
    }

    pub fn http_url(&self, path: &str) -> String {
        combine_path(&self.config.http_base_url, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        combine_path(&self.config.ws_base_url, path)
    }

    /// GET `path` and return the JSON body.
    ///
    /// A 401 for a request that carried a token triggers
    /// [`TokenSource::on_unauthorized`] before the error is returned.
    pub async fn fetch_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = self.http_url(path);
        let token = self.auth.token();
        match self.network.fetch_json(&url, token.as_deref()).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_unauthorized() && token.is_some() {
                    tracing::warn!(url = %url, "Unauthorized, dropping credentials");
                    self.auth.on_unauthorized();
                }
                Err(e)
            }
        }
    }

    /// GET `path` and decode the body as `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.fetch_json(path).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Open one watch connection to `path`.
    pub async fn open_socket(
        &self,
        path: &str,
        mode: DecodeMode,
        extra_protocols: &[String],
    ) -> Result<Socket> {
        let url = self.ws_url(path);
        let token = self.auth.token();
        let protocols = stream_protocols(
            &self.config.binary_protocol,
            &self.config.auth_domain,
            token.as_deref(),
            extra_protocols,
        );
        Socket::open(self.network.as_ref(), &url, mode, &protocols).await
    }
}
