//! `GET /api/tools`: function-calling tool definitions for assistant clients.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub const SEARCH_TOOL_NAME: &str = "search_documents";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tools", get(list_tools))
}

/// The `search_documents` tool. Clients invoke it through `POST /api/search`.
pub fn search_documents_tool() -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "name": SEARCH_TOOL_NAME,
        "description": "Semantic search over our internal knowledge base. Should be used for answering most questions by the user. Returns a list of relevant documents.",
        "parameters": {
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to use for the semantic search."
                }
            },
            "required": ["query"]
        }
    })
}

async fn list_tools() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "tools": [search_documents_tool()] }))
}
