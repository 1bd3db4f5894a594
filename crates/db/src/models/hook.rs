//! Row model for the `hooks` table.

use sendhooks_core::hook::{HookRecord, HookStatus};
use sendhooks_core::types::{HookId, Timestamp};
use sqlx::FromRow;

/// A row from the `hooks` table.
///
/// `status` is stored as text (guarded by a CHECK constraint) and converted
/// into [`HookStatus`] via [`TryFrom`].
#[derive(Debug, Clone, FromRow)]
pub struct HookRow {
    pub id: HookId,
    pub status: String,
    pub created: Timestamp,
    pub delivered: Option<Timestamp>,
    pub error: Option<String>,
    pub recorded_at: Timestamp,
}

impl TryFrom<HookRow> for HookRecord {
    type Error = String;

    fn try_from(row: HookRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<HookStatus>()
            .map_err(|e| format!("hook {}: {e}", row.id))?;

        Ok(HookRecord {
            id: row.id,
            status,
            created: row.created,
            delivered: row.delivered,
            error: row.error,
        })
    }
}
