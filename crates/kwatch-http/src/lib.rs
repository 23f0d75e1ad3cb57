pub mod client;
pub mod error;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{ApiClient, ClientConfig};
pub use error::{ClientError, Result};
pub use traits::{RawConnection, RawEvent, StaticToken, TokenSource, WatchNetwork};
pub use types::{ConnectionId, EventType, Resource, ResourceList, WatchEvent};
