use crate::endpoint::HubManager;
use axum::{Router, routing::get};

pub fn hub_routes() -> Router<HubManager> {
    Router::new()
        .route("/health", get(super::handlers::health_check))
        .route("/servers", get(super::handlers::list_servers))
}
