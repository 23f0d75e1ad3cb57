//! In-memory [`WatchNetwork`] for tests.
//!
//! Fetch responses are registered per URL. Every `connect` call hands a
//! [`MockConnection`] to the test through [`MockNetwork::next_connection`],
//! which the test then drives by pushing frames or closing it.

use crate::error::{ClientError, Result};
use crate::traits::{RawConnection, RawEvent, WatchNetwork};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone, Debug)]
enum MockResponse {
    Json(serde_json::Value),
    Status(u16, String),
}

/// Remote end of one mocked connection.
pub struct MockConnection {
    pub url: String,
    pub protocols: Vec<String>,
    tx: async_channel::Sender<RawEvent>,
    close_rx: async_channel::Receiver<()>,
}

impl MockConnection {
    pub fn send_text(&self, text: &str) {
        let _ = self
            .tx
            .try_send(RawEvent::Frame(Bytes::copy_from_slice(text.as_bytes())));
    }

    pub fn send_json(&self, value: &serde_json::Value) {
        self.send_text(&value.to_string());
    }

    pub fn send_error(&self, message: &str) {
        let _ = self.tx.try_send(RawEvent::Error(message.to_string()));
    }

    /// Simulate the server dropping the connection.
    pub fn close(&self) {
        let _ = self.tx.try_send(RawEvent::Closed);
    }

    /// Resolves once the client asked to close this connection.
    pub async fn close_requested(&self) -> bool {
        self.close_rx.recv().await.is_ok()
    }
}

pub struct MockNetwork {
    responses: Mutex<HashMap<String, MockResponse>>,
    fetches: Mutex<Vec<(String, Option<String>)>>,
    refuse: AtomicUsize,
    hold: tokio::sync::watch::Sender<bool>,
    conn_tx: async_channel::Sender<MockConnection>,
    conn_rx: async_channel::Receiver<MockConnection>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    pub fn new() -> Self {
        let (conn_tx, conn_rx) = async_channel::unbounded();
        let (hold, _) = tokio::sync::watch::channel(false);
        Self {
            responses: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
            refuse: AtomicUsize::new(0),
            hold,
            conn_tx,
            conn_rx,
        }
    }

    pub fn respond(&self, url: &str, body: serde_json::Value) {
        self.responses
            .lock()
            .insert(url.to_string(), MockResponse::Json(body));
    }

    pub fn fail(&self, url: &str, status: u16, message: &str) {
        self.responses
            .lock()
            .insert(url.to_string(), MockResponse::Status(status, message.to_string()));
    }

    /// Make the next `count` connection attempts fail.
    pub fn refuse_connections(&self, count: usize) {
        self.refuse.store(count, Ordering::SeqCst);
    }

    /// Block fetches until [`MockNetwork::release_fetches`] is called.
    pub fn hold_fetches(&self) {
        self.hold.send_replace(true);
    }

    pub fn release_fetches(&self) {
        self.hold.send_replace(false);
    }

    /// URLs and tokens of every fetch so far.
    pub fn fetches(&self) -> Vec<(String, Option<String>)> {
        self.fetches.lock().clone()
    }

    pub async fn next_connection(&self) -> MockConnection {
        match self.conn_rx.recv().await {
            Ok(conn) => conn,
            Err(_) => panic!("mock network dropped"),
        }
    }

    /// Like [`MockNetwork::next_connection`] but gives up after `wait`.
    pub async fn try_next_connection(&self, wait: Duration) -> Option<MockConnection> {
        tokio::time::timeout(wait, self.conn_rx.recv())
            .await
            .ok()
            .and_then(|r| r.ok())
    }
}

#[async_trait]
impl WatchNetwork for MockNetwork {
    async fn fetch_json(&self, url: &str, token: Option<&str>) -> Result<serde_json::Value> {
        self.fetches
            .lock()
            .push((url.to_string(), token.map(str::to_string)));

        let mut held = self.hold.subscribe();
        let _ = held.wait_for(|h| !*h).await;

        let response = self.responses.lock().get(url).cloned();
        match response {
            Some(MockResponse::Json(v)) => Ok(v),
            Some(MockResponse::Status(status, message)) => Err(ClientError::Http {
                status,
                status_text: message.clone(),
                message,
            }),
            None => Err(ClientError::Http {
                status: 404,
                status_text: "Not Found".into(),
                message: format!("no mock response for {}", url),
            }),
        }
    }

    async fn connect(&self, url: &str, protocols: &[String]) -> Result<RawConnection> {
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ClientError::Transport(format!("connection refused: {}", url)));
        }

        let (tx, rx) = async_channel::unbounded();
        let (close_tx, close_rx) = async_channel::bounded(1);
        let _ = self.conn_tx.try_send(MockConnection {
            url: url.to_string(),
            protocols: protocols.to_vec(),
            tx,
            close_rx,
        });
        Ok(RawConnection::new(rx, close_tx))
    }
}
