//! kwatch-core: keeps a client-side mirror of server-held resources fresh.
//!
//! - **stream**: a watch connection that reopens itself after unexpected closes.
//! - **mirror**: the keyed local collection and the delta reconciliation rule.
//! - **item** / **collection**: fetch-then-watch subscriptions built on both.
//! - **client**: the [`WatchClient`] facade tying them to a network.

pub mod core;

// Top-level re-exports for common usage
pub use crate::core::error::{Result, WatchError};
pub use crate::core::{
    Applied, ErrorCallback, Mirror, ReconnectingStream, StreamOptions, StreamState, Subscription,
    Updates, WatchClient, WatchHandle,
};
pub use kwatch_http as http;
pub use kwatch_http::client::{DecodeMode, Payload};
pub use kwatch_http::{ClientConfig, ConnectionId, EventType, Resource, ResourceList, WatchEvent};
