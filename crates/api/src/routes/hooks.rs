use axum::routing::get;
use axum::Router;

use crate::handlers::hooks;
use crate::state::AppState;

/// Hook routes mounted at `/hooks`.
///
/// ```text
/// GET /             -> list_hooks
/// GET /{hook_id}    -> get_hook
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(hooks::list_hooks))
        .route("/{hook_id}", get(hooks::get_hook))
}
