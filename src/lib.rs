pub mod portal;

// Re-export the types embedders touch most.
pub use portal::{
    api::{HttpPortalApi, ImageUpload, PortalApi},
    engine::{SyncEngine, SyncEngineConfig},
    error::PortalError,
    listener::{EmptyPortalListener, PortalListener},
    types::{Contact, Direction, Message, MessageStatus},
};
