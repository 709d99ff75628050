pub mod local;
pub mod manager;
pub mod registry;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use local::StdioConnector;
pub use manager::{HubManager, HubTimeouts, LoadReport, ToolListings};
pub use registry::{Connection, ConnectionRegistry, ConnectionState};
pub use traits::{Connector, ToolSession};
