use super::types::JsonObject;
use crate::endpoint::ToolSession;
use crate::error::{HubError, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const REQUEST_BUFFER: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RuntimeState {
    Running,
    Stopped,
    Failed(String),
}

/// Cloneable front end to the task that owns a session.
///
/// Requests queue on a channel and are served one at a time, in order.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    name: Arc<str>,
    tx: mpsc::Sender<SessionRequest>,
    state: Arc<RwLock<RuntimeState>>,
    join: Arc<Mutex<Option<JoinHandle<()>>>>,
}

enum SessionRequest {
    ListTools {
        resp: oneshot::Sender<Result<Vec<Value>>>,
    },
    CallTool {
        tool: String,
        arguments: JsonObject,
        resp: oneshot::Sender<Result<Value>>,
    },
    Stop {
        resp: oneshot::Sender<Result<()>>,
    },
}

pub(crate) fn spawn_session(name: &str, session: Box<dyn ToolSession>) -> SessionHandle {
    let (tx, mut rx) = mpsc::channel(REQUEST_BUFFER);
    let state = Arc::new(RwLock::new(RuntimeState::Running));
    let state_clone = Arc::clone(&state);
    let server_name = name.to_string();

    let join = tokio::spawn(async move {
        let mut session = session;

        loop {
            match rx.recv().await {
                Some(SessionRequest::ListTools { resp }) => {
                    debug!("Listing tools for server: {}", server_name);
                    let _ = resp.send(session.list_tools().await);
                }
                Some(SessionRequest::CallTool {
                    tool,
                    arguments,
                    resp,
                }) => {
                    debug!("Calling tool '{}' on server: {}", tool, server_name);
                    let _ = resp.send(session.call_tool(&tool, arguments).await);
                }
                Some(SessionRequest::Stop { resp }) => {
                    let result = session.close().await;
                    set_state(&state_clone, &result).await;
                    let _ = resp.send(result);
                    break;
                }
                None => {
                    let result = session.close().await;
                    if let Err(e) = &result {
                        warn!("Closing abandoned session {} failed: {}", server_name, e);
                    }
                    set_state(&state_clone, &result).await;
                    break;
                }
            }
        }

        debug!("Session worker for {} exited", server_name);
    });

    SessionHandle {
        name: Arc::from(name),
        tx,
        state,
        join: Arc::new(Mutex::new(Some(join))),
    }
}

impl SessionHandle {
    #[cfg(test)]
    pub(crate) async fn state(&self) -> RuntimeState {
        self.state.read().await.clone()
    }

    pub(crate) async fn list_tools(&self) -> Result<Vec<Value>> {
        self.ensure_running().await?;

        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(SessionRequest::ListTools { resp: resp_tx }).await?;

        resp_rx
            .await
            .map_err(|_| HubError::transport(&*self.name, "list tools cancelled"))?
    }

    pub(crate) async fn call_tool(&self, tool: &str, arguments: JsonObject) -> Result<Value> {
        self.ensure_running().await?;

        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(SessionRequest::CallTool {
            tool: tool.to_string(),
            arguments,
            resp: resp_tx,
        })
        .await?;

        resp_rx
            .await
            .map_err(|_| HubError::transport(&*self.name, "call tool cancelled"))?
    }

    pub(crate) async fn stop(&self) -> Result<()> {
        self.ensure_running().await?;

        let (resp_tx, resp_rx) = oneshot::channel();
        self.send(SessionRequest::Stop { resp: resp_tx }).await?;

        resp_rx
            .await
            .map_err(|_| HubError::transport(&*self.name, "stop cancelled"))??;

        let mut join_lock = self.join.lock().await;
        if let Some(join_handle) = join_lock.as_mut() {
            let joined = join_handle.await;
            *join_lock = None;
            if let Err(err) = joined {
                let message = format!("worker panicked: {}", err);
                return Err(self.runtime_failed(&message).await);
            }
        }

        Ok(())
    }

    /// Kill the worker without a graceful close; the session is dropped with it
    pub(crate) async fn abort(&self, reason: &str) {
        if let Some(join_handle) = self.join.lock().await.take() {
            join_handle.abort();
        }
        warn!("Aborted session worker for {}: {}", self.name, reason);
        *self.state.write().await = RuntimeState::Failed(reason.to_string());
    }

    async fn send(&self, request: SessionRequest) -> Result<()> {
        if self.tx.send(request).await.is_err() {
            return Err(self.runtime_failed("worker channel closed").await);
        }
        Ok(())
    }

    async fn ensure_running(&self) -> Result<()> {
        match self.state.read().await.clone() {
            RuntimeState::Running => Ok(()),
            RuntimeState::Stopped => Err(HubError::NotConnected(self.name.to_string())),
            RuntimeState::Failed(details) => Err(HubError::transport(&*self.name, details)),
        }
    }

    async fn runtime_failed(&self, details: &str) -> HubError {
        let mut state = self.state.write().await;
        *state = RuntimeState::Failed(details.to_string());
        HubError::transport(&*self.name, details)
    }
}

async fn set_state(state: &Arc<RwLock<RuntimeState>>, result: &Result<()>) {
    let mut state_lock = state.write().await;
    match result {
        Ok(()) => *state_lock = RuntimeState::Stopped,
        Err(err) => *state_lock = RuntimeState::Failed(err.to_string()),
    }
}
