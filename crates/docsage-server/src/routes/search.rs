//! `POST /api/search`: semantic search with context expansion.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::state::AppState;
use docsage_core::Error;
use docsage_resolve::ExpandedPassage;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/search", post(search))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ExpandedPassage>,
    pub total: usize,
    pub query: String,
}

async fn search(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(req) = body.map_err(|e| Error::InvalidQuery(e.body_text()))?;
    let k = req.k.unwrap_or(state.config.retrieval.top_k);
    let secs = state.config.server.request_timeout_secs;

    let results = tokio::time::timeout(Duration::from_secs(secs), async {
        let service = state.search_service().await?;
        service.search(&req.query, k).await
    })
    .await
    .map_err(|_| Error::Timeout(format!("search exceeded {}s", secs)))??;

    Ok(Json(SearchResponse {
        total: results.len(),
        results,
        query: req.query,
    }))
}
