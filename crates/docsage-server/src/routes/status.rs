use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}

/// Service health plus index availability. Always 200; an unavailable index
/// is reported in the body.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let index = match state.search_service().await {
        Ok(search) => serde_json::json!({
            "available": true,
            "stats": search.index().stats(),
        }),
        Err(e) => serde_json::json!({
            "available": false,
            "error": { "kind": e.kind(), "message": e.to_string() },
        }),
    };

    Json(serde_json::json!({
        "status": "healthy",
        "service": "docsage",
        "version": env!("CARGO_PKG_VERSION"),
        "embedder": state.embedder.name(),
        "index_dir": state.config.index_dir.display().to_string(),
        "index": index,
    }))
}
