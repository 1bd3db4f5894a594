use crate::service::HookQueryService;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; the store behind the query service is shared.
#[derive(Clone)]
pub struct AppState {
    /// Read access to hook records.
    pub hooks: HookQueryService,
}
