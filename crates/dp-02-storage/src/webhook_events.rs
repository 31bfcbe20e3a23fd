//! Webhook idempotency ledger. One row per platform message id; the claim
//! protocol below makes inbound processing exactly-once per message id
//! while tolerating workers that died mid-processing.

use shared_types::{DispatchResult, WebhookStatus, WEBHOOK_STALE_AFTER_SECS};
use sqlx::{PgConnection, Row};

use crate::error::db_err;

/// Outcome of attempting to claim an inbound message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// First sighting; caller owns processing.
    Claimed { event_id: i64 },
    /// Already processed or being processed by a live worker; no-op.
    Duplicate,
    /// A previous worker went stale or failed; caller re-owns processing.
    Reclaimed { event_id: i64 },
}

/// Claims `platform_message_id` for processing.
///
/// A `processing` row older than 120 s is treated as stale and reclaimed;
/// `failed` rows are always reclaimed; `received`/`processed` and fresh
/// `processing` rows are duplicates.
pub async fn try_claim(
    conn: &mut PgConnection,
    platform_message_id: &str,
) -> DispatchResult<ClaimOutcome> {
    let inserted = sqlx::query(
        "INSERT INTO webhook_events (platform_message_id, status) \
         VALUES ($1, 'processing') \
         ON CONFLICT (platform_message_id) DO NOTHING \
         RETURNING id",
    )
    .bind(platform_message_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?;

    if let Some(row) = inserted {
        let event_id: i64 = row.try_get("id").map_err(db_err)?;
        return Ok(ClaimOutcome::Claimed { event_id });
    }

    // Row exists: lock it and decide between duplicate and stale reclaim.
    let row = sqlx::query(
        "SELECT id, status, \
                EXTRACT(EPOCH FROM (now() - updated_at))::BIGINT AS age_secs \
         FROM webhook_events WHERE platform_message_id = $1 FOR UPDATE",
    )
    .bind(platform_message_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)?;

    let event_id: i64 = row.try_get("id").map_err(db_err)?;
    let status: String = row.try_get("status").map_err(db_err)?;
    let age_secs: i64 = row.try_get("age_secs").map_err(db_err)?;

    let reclaim = match WebhookStatus::parse(&status) {
        Some(WebhookStatus::Failed) => true,
        Some(WebhookStatus::Processing) => age_secs > WEBHOOK_STALE_AFTER_SECS,
        Some(WebhookStatus::Received) | Some(WebhookStatus::Processed) | None => false,
    };

    if !reclaim {
        return Ok(ClaimOutcome::Duplicate);
    }

    sqlx::query("UPDATE webhook_events SET status = 'processing', updated_at = now() WHERE id = $1")
        .bind(event_id)
        .execute(conn)
        .await
        .map_err(db_err)?;
    Ok(ClaimOutcome::Reclaimed { event_id })
}

pub async fn mark_processed(conn: &mut PgConnection, event_id: i64) -> DispatchResult<()> {
    sqlx::query("UPDATE webhook_events SET status = 'processed', updated_at = now() WHERE id = $1")
        .bind(event_id)
        .execute(conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

pub async fn mark_failed(conn: &mut PgConnection, event_id: i64) -> DispatchResult<()> {
    sqlx::query("UPDATE webhook_events SET status = 'failed', updated_at = now() WHERE id = $1")
        .bind(event_id)
        .execute(conn)
        .await
        .map_err(db_err)?;
    Ok(())
}
