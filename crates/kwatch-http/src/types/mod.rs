pub mod connection;
pub mod event;
pub mod resource;

pub use connection::ConnectionId;
pub use event::{EventType, WatchEvent};
pub use resource::{ListMeta, ObjectMeta, Resource, ResourceList};
