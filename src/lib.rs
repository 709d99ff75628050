pub mod api;
pub mod config;
pub mod endpoint;
pub(crate) mod error;
pub(crate) mod mcp;
pub mod routing;

pub use error::{HubError, Result};
pub use mcp::{ConnectionSpec, JsonObject};
