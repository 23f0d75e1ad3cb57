//! kwatch client implementation.

mod auth;
mod config;
mod endpoint;
mod fetch;
pub mod native_network;
mod socket;

pub use auth::{bearer_protocol, stream_protocols};
pub use config::ClientConfig;
pub use endpoint::{combine_path, watch_collection_path, watch_item_path};
pub use fetch::ApiClient;
pub use native_network::NativeNetwork;
pub use socket::{DecodeMode, Payload, Socket, SocketEvent};
