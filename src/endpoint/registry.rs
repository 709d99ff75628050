use super::traits::Connector;
use crate::config::ToolFilter;
use crate::error::{HubError, Result};
use crate::mcp::{ConnectionSpec, JsonObject, SessionHandle, spawn_session};
use crate::routing::CompiledFilter;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lifecycle of a connection name as seen by the registry
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Absent,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Absent => "absent",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        write!(f, "{}", s)
    }
}

/// A live connection: the session handle and its per-connection filter
pub struct Connection {
    name: String,
    handle: SessionHandle,
    filter: Option<CompiledFilter>,
}

impl Connection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> Option<&CompiledFilter> {
        self.filter.as_ref()
    }

    pub(crate) async fn list_tools(&self) -> Result<Vec<Value>> {
        self.handle.list_tools().await
    }

    pub(crate) async fn call_tool(&self, tool: &str, arguments: JsonObject) -> Result<Value> {
        self.handle.call_tool(tool, arguments).await
    }
}

enum Slot {
    Connecting,
    Connected(Arc<Connection>),
}

/// Name → connection map.
///
/// Handle and filter live in one entry so removal is a single map operation.
#[derive(Clone)]
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    entries: Arc<DashMap<String, Slot>>,
    close_timeout: Duration,
}

/// Holds a `Connecting` slot; dropping it without `commit` frees the name
struct Reservation<'a> {
    entries: &'a DashMap<String, Slot>,
    name: &'a str,
    committed: bool,
}

impl Reservation<'_> {
    fn commit(mut self, connection: Arc<Connection>) {
        self.entries
            .insert(self.name.to_string(), Slot::Connected(connection));
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.entries
                .remove_if(self.name, |_, slot| matches!(slot, Slot::Connecting));
        }
    }
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>, close_timeout: Duration) -> Self {
        Self {
            connector,
            entries: Arc::new(DashMap::new()),
            close_timeout,
        }
    }

    /// Establish a session under `name`
    pub async fn connect(
        &self,
        name: &str,
        spec: &ConnectionSpec,
        filter: Option<ToolFilter>,
    ) -> Result<()> {
        let reservation = self.reserve(name)?;

        info!("Connecting to MCP server: {}", name);
        debug!("Command: {} {}", spec.command, spec.args.join(" "));

        let session = match self.connector.connect(name, spec).await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to connect to {}: {}", name, e);
                return Err(e);
            }
        };

        let connection = Arc::new(Connection {
            name: name.to_string(),
            handle: spawn_session(name, session),
            filter: filter.map(CompiledFilter::new),
        });
        reservation.commit(connection);

        info!("Successfully connected to MCP server: {}", name);
        Ok(())
    }

    fn reserve<'a>(&'a self, name: &'a str) -> Result<Reservation<'a>> {
        match self.entries.entry(name.to_string()) {
            Entry::Occupied(_) => Err(HubError::AlreadyConnected(name.to_string())),
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Connecting);
                Ok(Reservation {
                    entries: &self.entries,
                    name,
                    committed: false,
                })
            }
        }
    }

    /// Remove `name` and close its session
    pub async fn disconnect(&self, name: &str) -> Result<()> {
        let connection = match self
            .entries
            .remove_if(name, |_, slot| matches!(slot, Slot::Connected(_)))
        {
            Some((_, Slot::Connected(connection))) => connection,
            _ => return Err(HubError::NotConnected(name.to_string())),
        };

        info!("Disconnecting MCP server: {}", name);

        match tokio::time::timeout(self.close_timeout, connection.handle.stop()).await {
            Ok(result) => result?,
            Err(_) => {
                connection.handle.abort("close timed out").await;
                return Err(HubError::timeout(name, "close", self.close_timeout));
            }
        }

        info!("Successfully disconnected MCP server: {}", name);
        Ok(())
    }

    /// Disconnect every connected name, attempting all of them.
    ///
    /// Returns the first failure once every connection has been tried.
    pub async fn disconnect_all(&self) -> Result<()> {
        let names = self.list_names();
        info!("Disconnecting {} MCP servers", names.len());

        let results = join_all(names.iter().map(|name| self.disconnect(name))).await;

        let mut first_error = None;
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(()) => {}
                Err(HubError::NotConnected(_)) => {
                    debug!("{} was already disconnected", name);
                }
                Err(e) => {
                    warn!("Error disconnecting {}: {}", name, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Connected names, sorted
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Connected(_)))
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<Connection>> {
        match self.entries.get(name).as_deref() {
            Some(Slot::Connected(connection)) => Ok(Arc::clone(connection)),
            _ => Err(HubError::NotConnected(name.to_string())),
        }
    }

    pub fn state(&self, name: &str) -> ConnectionState {
        match self.entries.get(name).as_deref() {
            None => ConnectionState::Absent,
            Some(Slot::Connecting) => ConnectionState::Connecting,
            Some(Slot::Connected(_)) => ConnectionState::Connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::testing::{FakeConnector, tools};

    fn registry(connector: FakeConnector) -> (ConnectionRegistry, Arc<FakeConnector>) {
        let connector = Arc::new(connector);
        let registry = ConnectionRegistry::new(connector.clone(), Duration::from_millis(200));
        (registry, connector)
    }

    fn spec() -> ConnectionSpec {
        ConnectionSpec::new("fake-server")
    }

    #[tokio::test]
    async fn test_connect_and_resolve() {
        let (registry, _) = registry(FakeConnector::new().server("a", tools(&["t1"])));

        registry.connect("a", &spec(), None).await.unwrap();

        let connection = registry.resolve("a").unwrap();
        assert_eq!(connection.name(), "a");
        assert!(connection.filter().is_none());
        assert_eq!(connection.list_tools().await.unwrap().len(), 1);
        assert_eq!(registry.state("a"), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_duplicate_connect_fails_and_keeps_first() {
        let (registry, connector) = registry(FakeConnector::new().server("a", tools(&["t1"])));

        registry.connect("a", &spec(), None).await.unwrap();
        let result = registry.connect("a", &spec(), None).await;

        assert!(matches!(result, Err(HubError::AlreadyConnected(_))));
        assert_eq!(connector.connects(), 1);
        assert!(connector.closed().is_empty());
        assert_eq!(
            registry.resolve("a").unwrap().list_tools().await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_no_entry() {
        let (registry, _) = registry(FakeConnector::new());

        let result = registry.connect("missing", &spec(), None).await;

        assert!(matches!(result, Err(HubError::Transport { .. })));
        assert_eq!(registry.state("missing"), ConnectionState::Absent);
        assert!(registry.list_names().is_empty());
        assert!(matches!(
            registry.resolve("missing"),
            Err(HubError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_stores_filter() {
        let (registry, _) = registry(FakeConnector::new().server("a", vec![]));
        let filter = ToolFilter {
            include: Some(vec!["read*".to_string()]),
            exclude: None,
        };

        registry
            .connect("a", &spec(), Some(filter.clone()))
            .await
            .unwrap();

        let connection = registry.resolve("a").unwrap();
        assert_eq!(connection.filter().unwrap().source(), &filter);
    }

    #[tokio::test]
    async fn test_connecting_name_is_reserved() {
        let (registry, _) = registry(
            FakeConnector::new()
                .server("slow", vec![])
                .connect_delay(Duration::from_millis(100)),
        );

        let background = registry.clone();
        let first = tokio::spawn(async move { background.connect("slow", &spec(), None).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(registry.state("slow"), ConnectionState::Connecting);
        assert!(registry.list_names().is_empty());
        assert!(matches!(
            registry.resolve("slow"),
            Err(HubError::NotConnected(_))
        ));
        assert!(matches!(
            registry.connect("slow", &spec(), None).await,
            Err(HubError::AlreadyConnected(_))
        ));

        first.await.unwrap().unwrap();
        assert_eq!(registry.state("slow"), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_cancelled_connect_releases_name() {
        let (registry, _) = registry(
            FakeConnector::new()
                .server("slow", vec![])
                .connect_delay(Duration::from_secs(10)),
        );

        let attempt = tokio::time::timeout(
            Duration::from_millis(20),
            registry.connect("slow", &spec(), None),
        )
        .await;

        assert!(attempt.is_err());
        assert_eq!(registry.state("slow"), ConnectionState::Absent);
    }

    #[tokio::test]
    async fn test_disconnect_removes_and_closes() {
        let (registry, connector) = registry(FakeConnector::new().server("a", vec![]));
        registry.connect("a", &spec(), None).await.unwrap();

        registry.disconnect("a").await.unwrap();

        assert_eq!(registry.state("a"), ConnectionState::Absent);
        assert_eq!(connector.closed(), vec!["a"]);
        assert!(matches!(
            registry.disconnect("a").await,
            Err(HubError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let (registry, connector) = registry(FakeConnector::new().server("a", vec![]));

        registry.connect("a", &spec(), None).await.unwrap();
        registry.disconnect("a").await.unwrap();
        registry.connect("a", &spec(), None).await.unwrap();

        assert_eq!(connector.connects(), 2);
        assert_eq!(registry.state("a"), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_disconnect_unknown() {
        let (registry, _) = registry(FakeConnector::new());
        assert!(matches!(
            registry.disconnect("ghost").await,
            Err(HubError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_all_attempts_every_connection() {
        let (registry, connector) = registry(
            FakeConnector::new()
                .server("a", vec![])
                .server("b", vec![])
                .server("c", vec![])
                .failing_close("b"),
        );
        for name in ["a", "b", "c"] {
            registry.connect(name, &spec(), None).await.unwrap();
        }

        let result = registry.disconnect_all().await;

        match result {
            Err(HubError::Transport { name, .. }) => assert_eq!(name, "b"),
            other => panic!("expected transport failure, got {:?}", other),
        }
        assert_eq!(connector.closed(), vec!["a", "b", "c"]);
        assert!(registry.list_names().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_all_bounds_hung_close() {
        let (registry, connector) = registry(
            FakeConnector::new()
                .hanging("stuck")
                .server("ok", vec![]),
        );
        registry.connect("stuck", &spec(), None).await.unwrap();
        registry.connect("ok", &spec(), None).await.unwrap();

        // Park the stuck worker so its close request never gets served
        let stuck = registry.resolve("stuck").unwrap();
        tokio::spawn(async move {
            let _ = stuck.list_tools().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = registry.disconnect_all().await;

        assert!(matches!(result, Err(HubError::Timeout { .. })));
        assert_eq!(connector.closed(), vec!["ok"]);
        assert!(registry.list_names().is_empty());
    }

    #[tokio::test]
    async fn test_close_timeout_kills_session_before_reconnect() {
        let (registry, connector) = registry(FakeConnector::new().hanging("stuck"));
        registry.connect("stuck", &spec(), None).await.unwrap();

        let stuck = registry.resolve("stuck").unwrap();
        tokio::spawn(async move {
            let _ = stuck.list_tools().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = registry.disconnect("stuck").await;
        assert!(matches!(result, Err(HubError::Timeout { .. })));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(connector.dropped(), vec!["stuck"]);
        assert!(connector.closed().is_empty());

        registry.connect("stuck", &spec(), None).await.unwrap();
        assert_eq!(connector.connects(), 2);
        assert_eq!(registry.state("stuck"), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_list_names_sorted() {
        let (registry, _) = registry(
            FakeConnector::new()
                .server("zeta", vec![])
                .server("alpha", vec![]),
        );
        registry.connect("zeta", &spec(), None).await.unwrap();
        registry.connect("alpha", &spec(), None).await.unwrap();

        assert_eq!(registry.list_names(), vec!["alpha", "zeta"]);
    }
}
