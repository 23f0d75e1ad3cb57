//! A single watch connection with frame decoding.

use crate::error::Result;
use crate::traits::{RawConnection, RawEvent, WatchNetwork};
use crate::types::ConnectionId;
use bytes::Bytes;

/// How inbound frames are handed to the owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Parse every frame as JSON.
    #[default]
    Json,
    /// Pass frame bytes through untouched.
    Raw,
}

/// A decoded frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Raw(Bytes),
}

impl Payload {
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Raw(b) => serde_json::from_slice(&b).ok(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SocketEvent {
    Message(Payload),
    /// The connection ended without `close()` being called. Reported once.
    Failed,
}

/// One open connection.
///
/// Frames come out of [`Socket::next`] in arrival order. Once [`Socket::close`]
/// has been called, or a failure has been reported, `next` yields `None`.
pub struct Socket {
    conn: RawConnection,
    url: String,
    mode: DecodeMode,
    closing: bool,
    finished: bool,
}

impl Socket {
    /// Open a connection to `url` offering `protocols`.
    pub async fn open(
        network: &dyn WatchNetwork,
        url: &str,
        mode: DecodeMode,
        protocols: &[String],
    ) -> Result<Self> {
        let conn = network.connect(url, protocols).await?;
        tracing::debug!(url = %url, connection = %conn.id, "Socket opened");
        Ok(Socket {
            conn,
            url: url.to_string(),
            mode,
            closing: false,
            finished: false,
        })
    }

    #[inline]
    pub fn handle(&self) -> ConnectionId {
        self.conn.id
    }

    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[inline]
    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub async fn next(&mut self) -> Option<SocketEvent> {
        loop {
            if self.closing || self.finished {
                return None;
            }
            match self.conn.events.recv().await {
                Ok(RawEvent::Frame(frame)) => match self.decode(frame) {
                    Ok(payload) => return Some(SocketEvent::Message(payload)),
                    Err(e) => {
                        tracing::warn!(url = %self.url, error = %e, "Dropping undecodable frame");
                    }
                },
                Ok(RawEvent::Error(e)) => {
                    tracing::error!(url = %self.url, error = %e, "Error in watch stream");
                }
                Ok(RawEvent::Closed) | Err(_) => {
                    self.finished = true;
                    if self.closing {
                        return None;
                    }
                    tracing::warn!(url = %self.url, connection = %self.conn.id, "Socket closed unexpectedly");
                    return Some(SocketEvent::Failed);
                }
            }
        }
    }

    /// Close the connection. The resulting close event is expected and is
    /// never reported as a failure.
    pub fn close(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;
        self.conn.request_close();
    }

    fn decode(&self, frame: Bytes) -> std::result::Result<Payload, serde_json::Error> {
        match self.mode {
            DecodeMode::Json => serde_json::from_slice(&frame).map(Payload::Json),
            DecodeMode::Raw => Ok(Payload::Raw(frame)),
        }
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if !self.closing && !self.finished {
            self.conn.request_close();
        }
    }
}
