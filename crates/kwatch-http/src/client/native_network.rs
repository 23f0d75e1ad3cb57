use crate::client::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::traits::{RawConnection, RawEvent, WatchNetwork};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

pub struct NativeNetwork {
    client: Client,
    frame_buffer: usize,
}

impl NativeNetwork {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // No request timeout: list responses for large collections can be slow.
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            frame_buffer: config.frame_buffer,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl WatchNetwork for NativeNetwork {
    async fn fetch_json(&self, url: &str, token: Option<&str>) -> Result<serde_json::Value> {
        let mut req_builder = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = token {
            req_builder = req_builder.bearer_auth(token);
        }

        tracing::debug!(url = %url, "GET");

        let response = req_builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::from_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                &body,
            ));
        }

        Ok(serde_json::from_slice(&body)?)
    }

    async fn connect(&self, url: &str, protocols: &[String]) -> Result<RawConnection> {
        let mut request = url
            .into_client_request()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        if !protocols.is_empty() {
            let offer = HeaderValue::from_str(&protocols.join(", "))
                .map_err(|e| ClientError::Config(e.to_string()))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, offer);
        }

        let (ws, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        tracing::debug!(url = %url, status = %response.status(), "Watch connected");

        let (mut sink, mut stream) = ws.split();
        let (tx, rx) = async_channel::bounded(self.frame_buffer);
        let (close_tx, close_rx) = async_channel::bounded::<()>(1);
        let url = url.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = close_rx.recv() => {
                        if let Err(e) = sink.send(Message::Close(None)).await {
                            tracing::debug!(url = %url, error = %e, "Close handshake failed");
                        }
                        break;
                    }
                    msg = stream.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            let frame = Bytes::copy_from_slice(text.as_str().as_bytes());
                            if tx.send(RawEvent::Frame(frame)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if tx.send(RawEvent::Frame(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::debug!(url = %url, ?frame, "Server closed watch");
                            let _ = tx.send(RawEvent::Closed).await;
                            break;
                        }
                        // Ping/pong replies are handled by tungstenite.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = tx.send(RawEvent::Error(e.to_string())).await;
                            let _ = tx.send(RawEvent::Closed).await;
                            break;
                        }
                        None => {
                            let _ = tx.send(RawEvent::Closed).await;
                            break;
                        }
                    }
                }
            }
            tracing::debug!(url = %url, "Watch task ended");
        });

        Ok(RawConnection::new(rx, close_tx))
    }
}
