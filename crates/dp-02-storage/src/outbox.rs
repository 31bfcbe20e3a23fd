//! Outbox repository: the durable outbound-notification queue.
//!
//! Producers enqueue inside their own business transaction; a rollback
//! therefore also discards the notification. Workers claim batches with
//! `FOR UPDATE SKIP LOCKED` so concurrent drainers never contend on the
//! same rows.

use chrono::{DateTime, Utc};
use dispatch_telemetry::current_correlation_id;
use shared_types::{
    DispatchError, DispatchResult, OutboundContent, OutboxMessage, OutboxStatus, Platform,
    StationId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::error::db_err;

const OUTBOX_COLUMNS: &str = "id, platform, recipient_id, message_type, content, station_id, \
     status, retry_count, max_retries, correlation_id, created_at, processed_at, \
     next_retry_at, last_error";

fn outbox_from_row(row: &PgRow) -> DispatchResult<OutboxMessage> {
    let platform_s: String = row.try_get("platform").map_err(db_err)?;
    let status_s: String = row.try_get("status").map_err(db_err)?;
    let content_v: serde_json::Value = row.try_get("content").map_err(db_err)?;
    Ok(OutboxMessage {
        id: row.try_get("id").map_err(db_err)?,
        platform: Platform::parse(&platform_s)
            .ok_or_else(|| DispatchError::Internal(format!("unknown platform {platform_s}")))?,
        recipient_id: row.try_get("recipient_id").map_err(db_err)?,
        message_type: row.try_get("message_type").map_err(db_err)?,
        content: serde_json::from_value(content_v)
            .map_err(|e| DispatchError::Internal(format!("bad outbox content: {e}")))?,
        station_id: row.try_get("station_id").map_err(db_err)?,
        status: OutboxStatus::parse(&status_s)
            .ok_or_else(|| DispatchError::Internal(format!("unknown status {status_s}")))?,
        retry_count: row.try_get("retry_count").map_err(db_err)?,
        max_retries: row.try_get("max_retries").map_err(db_err)?,
        correlation_id: row.try_get("correlation_id").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        processed_at: row.try_get("processed_at").map_err(db_err)?,
        next_retry_at: row.try_get("next_retry_at").map_err(db_err)?,
        last_error: row.try_get("last_error").map_err(db_err)?,
    })
}

/// Enqueues an outbound message. Must be called on the same connection (and
/// inside the same transaction) as the business mutation that produced it.
///
/// The ambient correlation ID is persisted with the row so the drain
/// worker's logs and outbound calls stay stitched to the request that
/// produced the notification.
pub async fn enqueue(
    conn: &mut PgConnection,
    platform: Platform,
    recipient_id: &str,
    message_type: &str,
    content: &OutboundContent,
    station_id: Option<StationId>,
    max_retries: i32,
) -> DispatchResult<i64> {
    let content_v = serde_json::to_value(content)
        .map_err(|e| DispatchError::Internal(format!("serialize outbox content: {e}")))?;
    let correlation_id = current_correlation_id().map(|id| id.to_string());
    let row = sqlx::query(
        "INSERT INTO outbox_messages \
             (platform, recipient_id, message_type, content, station_id, max_retries, \
              correlation_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(platform.as_str())
    .bind(recipient_id)
    .bind(message_type)
    .bind(content_v)
    .bind(station_id)
    .bind(max_retries)
    .bind(correlation_id)
    .fetch_one(conn)
    .await
    .map_err(db_err)?;
    row.try_get("id").map_err(db_err)
}

/// Claims a batch of due pending rows and marks them `processing` (the
/// lease). Runs its own short transaction; `SKIP LOCKED` keeps concurrent
/// workers off each other's rows.
pub async fn claim_batch(
    conn: &mut PgConnection,
    batch_size: i64,
    now: DateTime<Utc>,
) -> DispatchResult<Vec<OutboxMessage>> {
    let sql = format!(
        "UPDATE outbox_messages SET status = 'processing' \
         WHERE id IN ( \
             SELECT id FROM outbox_messages \
             WHERE status = 'pending' AND (next_retry_at IS NULL OR next_retry_at <= $1) \
             ORDER BY id \
             LIMIT $2 \
             FOR UPDATE SKIP LOCKED \
         ) \
         RETURNING {OUTBOX_COLUMNS}"
    );
    let rows = sqlx::query(&sql)
        .bind(now)
        .bind(batch_size)
        .fetch_all(conn)
        .await
        .map_err(db_err)?;
    rows.iter().map(outbox_from_row).collect()
}

pub async fn mark_sent(conn: &mut PgConnection, id: i64) -> DispatchResult<()> {
    sqlx::query(
        "UPDATE outbox_messages SET status = 'sent', processed_at = now() WHERE id = $1",
    )
    .bind(id)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Permanent failure or retry budget exhausted: park for the operator.
pub async fn mark_failed(conn: &mut PgConnection, id: i64, error: &str) -> DispatchResult<()> {
    sqlx::query(
        "UPDATE outbox_messages \
         SET status = 'failed', processed_at = now(), last_error = $2 WHERE id = $1",
    )
    .bind(id)
    .bind(error)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Transient failure: bump the retry counter and return the row to
/// `pending` with its next attempt time.
pub async fn schedule_retry(
    conn: &mut PgConnection,
    id: i64,
    retry_count: i32,
    next_retry_at: DateTime<Utc>,
    error: &str,
) -> DispatchResult<()> {
    sqlx::query(
        "UPDATE outbox_messages \
         SET status = 'pending', retry_count = $2, next_retry_at = $3, last_error = $4 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(retry_count)
    .bind(next_retry_at)
    .bind(error)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Counts by status for the debug surface.
pub async fn summary(conn: &mut PgConnection) -> DispatchResult<Vec<(String, i64)>> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS n FROM outbox_messages GROUP BY status ORDER BY status",
    )
    .fetch_all(conn)
    .await
    .map_err(db_err)?;
    rows.iter()
        .map(|r| {
            Ok((
                r.try_get::<String, _>("status").map_err(db_err)?,
                r.try_get::<i64, _>("n").map_err(db_err)?,
            ))
        })
        .collect()
}

/// Recent messages, optionally filtered by status, newest first.
pub async fn recent(
    conn: &mut PgConnection,
    status: Option<OutboxStatus>,
    limit: i64,
) -> DispatchResult<Vec<OutboxMessage>> {
    let rows = match status {
        Some(s) => {
            let sql = format!(
                "SELECT {OUTBOX_COLUMNS} FROM outbox_messages \
                 WHERE status = $1 ORDER BY id DESC LIMIT $2"
            );
            sqlx::query(&sql)
                .bind(s.as_str())
                .bind(limit)
                .fetch_all(conn)
                .await
                .map_err(db_err)?
        }
        None => {
            let sql = format!(
                "SELECT {OUTBOX_COLUMNS} FROM outbox_messages ORDER BY id DESC LIMIT $1"
            );
            sqlx::query(&sql)
                .bind(limit)
                .fetch_all(conn)
                .await
                .map_err(db_err)?
        }
    };
    rows.iter().map(outbox_from_row).collect()
}

/// Operator retry: only a `failed` row flips back to `pending`. Returns
/// false when the row was missing or not failed.
pub async fn retry_failed(conn: &mut PgConnection, id: i64) -> DispatchResult<bool> {
    let result = sqlx::query(
        "UPDATE outbox_messages \
         SET status = 'pending', retry_count = 0, next_retry_at = NULL, last_error = NULL \
         WHERE id = $1 AND status = 'failed'",
    )
    .bind(id)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(result.rows_affected() > 0)
}
