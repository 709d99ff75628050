pub(crate) mod bridge;
pub(crate) mod runtime;
pub(crate) mod types;

pub(crate) use bridge::HubBridge;
pub(crate) use runtime::{SessionHandle, spawn_session};
pub use types::{ConnectionSpec, JsonObject};
