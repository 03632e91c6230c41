//! Recent analyses.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::history::HistoryEntry;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Newest first.
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<HistoryEntry>> {
    Json(state.history.list(query.limit).await)
}
