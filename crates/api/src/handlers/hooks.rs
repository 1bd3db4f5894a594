//! Handlers for reading recorded webhook delivery outcomes.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/sendhooks/v1/hooks
pub async fn list_hooks(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let hooks = state.hooks.list().await?;
    Ok(Json(DataResponse { data: hooks }))
}

/// GET /api/sendhooks/v1/hooks/{hook_id}
///
/// The id is the stream entry id the record was ingested from (e.g. `5-0`).
pub async fn get_hook(
    State(state): State<AppState>,
    Path(hook_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let hook = state.hooks.get(&hook_id).await?;
    Ok(Json(DataResponse { data: hook }))
}
