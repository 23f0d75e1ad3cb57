//! The watch-reconciliation engine.

pub mod client;
pub mod collection;
pub mod error;
pub mod item;
pub mod mirror;
pub mod stream;
pub mod subscription;
pub mod updates;

pub use client::WatchClient;
pub use error::{ErrorCallback, Result, WatchError};
pub use mirror::{Applied, Mirror};
pub use stream::{ReconnectingStream, StreamOptions, StreamState};
pub use subscription::{Subscription, WatchHandle};
pub use updates::Updates;
