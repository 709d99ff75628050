use super::traits::{Connector, ToolSession};
use crate::error::{HubError, Result};
use crate::mcp::{ConnectionSpec, JsonObject};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn tools(names: &[&str]) -> Vec<Value> {
    names
        .iter()
        .map(|name| json!({"name": name, "inputSchema": {"type": "object"}}))
        .collect()
}

pub(crate) struct FakeSession {
    name: String,
    tools: Vec<Value>,
    delay: Option<Duration>,
    hang_on_list: bool,
    fail_close: bool,
    closed: Arc<AtomicBool>,
    closed_log: Option<Arc<Mutex<Vec<String>>>>,
    dropped: Arc<AtomicBool>,
    dropped_log: Option<Arc<Mutex<Vec<String>>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeSession {
    pub(crate) fn new(tools: Vec<Value>) -> Self {
        Self {
            name: "fake".to_string(),
            tools,
            delay: None,
            hang_on_list: false,
            fail_close: false,
            closed: Arc::new(AtomicBool::new(false)),
            closed_log: None,
            dropped: Arc::new(AtomicBool::new(false)),
            dropped_log: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub(crate) fn hanging(mut self) -> Self {
        self.hang_on_list = true;
        self
    }

    pub(crate) fn dropped_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.dropped)
    }

    pub(crate) fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    pub(crate) fn max_in_flight(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.max_in_flight)
    }
}

#[async_trait]
impl ToolSession for FakeSession {
    async fn list_tools(&self) -> Result<Vec<Value>> {
        if self.hang_on_list {
            std::future::pending::<()>().await;
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, tool: &str, arguments: JsonObject) -> Result<Value> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let echo = json!({
            "tool": tool,
            "arguments": arguments,
            "server": self.name,
        });
        Ok(json!({
            "content": [{"type": "text", "text": echo.to_string()}],
            "structuredContent": echo,
            "isError": false,
        }))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(log) = &self.closed_log {
            log.lock().unwrap().push(self.name.clone());
        }
        if self.fail_close {
            return Err(HubError::transport(&self.name, "close failed"));
        }
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
        if let Some(log) = &self.dropped_log {
            log.lock().unwrap().push(self.name.clone());
        }
    }
}

/// Serves canned catalogs by connection name; unknown names fail to spawn
#[derive(Default)]
pub(crate) struct FakeConnector {
    catalogs: HashMap<String, Vec<Value>>,
    hanging: HashSet<String>,
    failing_close: HashSet<String>,
    connect_delay: Option<Duration>,
    connects: AtomicUsize,
    closed: Arc<Mutex<Vec<String>>>,
    dropped: Arc<Mutex<Vec<String>>>,
}

impl FakeConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn server(mut self, name: &str, tools: Vec<Value>) -> Self {
        self.catalogs.insert(name.to_string(), tools);
        self
    }

    pub(crate) fn hanging(mut self, name: &str) -> Self {
        self.catalogs.insert(name.to_string(), vec![]);
        self.hanging.insert(name.to_string());
        self
    }

    pub(crate) fn failing_close(mut self, name: &str) -> Self {
        self.failing_close.insert(name.to_string());
        self
    }

    pub(crate) fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> Vec<String> {
        let mut closed = self.closed.lock().unwrap().clone();
        closed.sort();
        closed
    }

    pub(crate) fn dropped(&self) -> Vec<String> {
        let mut dropped = self.dropped.lock().unwrap().clone();
        dropped.sort();
        dropped
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, name: &str, _spec: &ConnectionSpec) -> Result<Box<dyn ToolSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }

        let tools = self
            .catalogs
            .get(name)
            .cloned()
            .ok_or_else(|| HubError::transport(name, "spawn failed: command not found"))?;

        let mut session = FakeSession::new(tools);
        session.name = name.to_string();
        session.hang_on_list = self.hanging.contains(name);
        session.fail_close = self.failing_close.contains(name);
        session.closed_log = Some(Arc::clone(&self.closed));
        session.dropped_log = Some(Arc::clone(&self.dropped));
        Ok(Box::new(session))
    }
}
