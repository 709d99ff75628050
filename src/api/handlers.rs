use crate::endpoint::HubManager;
use axum::{Json, extract::State, response::IntoResponse};
use serde_json::{Value, json};

pub(crate) async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(crate) async fn list_servers(State(manager): State<HubManager>) -> impl IntoResponse {
    let servers: Vec<Value> = manager
        .list_connections()
        .into_iter()
        .map(|name| {
            let state = manager.registry().state(&name);
            json!({
                "name": name,
                "state": state.to_string(),
            })
        })
        .collect();

    Json(json!({ "servers": servers }))
}
