use crate::error::Result;
use crate::types::ConnectionId;
use async_trait::async_trait;
use bytes::Bytes;

/// Event produced by a raw duplex connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    /// One inbound frame, text or binary.
    Frame(Bytes),
    /// A transport-level error. The connection may still be alive.
    Error(String),
    /// The peer or the transport closed the connection.
    Closed,
}

/// A live duplex connection handed out by a [`WatchNetwork`].
pub struct RawConnection {
    pub id: ConnectionId,
    pub events: async_channel::Receiver<RawEvent>,
    closer: async_channel::Sender<()>,
}

impl RawConnection {
    pub fn new(
        events: async_channel::Receiver<RawEvent>,
        closer: async_channel::Sender<()>,
    ) -> Self {
        Self {
            id: ConnectionId::next(),
            events,
            closer,
        }
    }

    /// Ask the transport to close. Never blocks.
    pub fn request_close(&self) {
        let _ = self.closer.try_send(());
        self.closer.close();
    }
}

impl std::fmt::Debug for RawConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawConnection").field("id", &self.id).finish()
    }
}

/// Abstraction for network operations.
#[async_trait]
pub trait WatchNetwork: Send + Sync + 'static {
    /// One-shot GET returning the decoded JSON body.
    async fn fetch_json(&self, url: &str, token: Option<&str>) -> Result<serde_json::Value>;

    /// Open a duplex event connection offering the given sub-protocols.
    async fn connect(&self, url: &str, protocols: &[String]) -> Result<RawConnection>;
}

/// Source of the bearer credential.
pub trait TokenSource: Send + Sync + 'static {
    fn token(&self) -> Option<String>;

    /// Called when the server rejected a request that carried a token.
    fn on_unauthorized(&self) {}
}

/// A fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() {
            Self(None)
        } else {
            Self(Some(token))
        }
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }

    fn on_unauthorized(&self) {
        tracing::warn!("Server rejected the configured token");
    }
}
