pub mod health;
pub mod hooks;

use axum::Router;

use crate::state::AppState;

/// Build the route tree mounted under [`API_PREFIX`](crate::API_PREFIX).
///
/// ```text
/// /hooks                  list
/// /hooks/{hook_id}        get by id
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/hooks", hooks::router())
}
