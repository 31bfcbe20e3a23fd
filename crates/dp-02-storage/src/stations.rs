//! Station governance repository: stations, owners, dispatchers, blacklist,
//! audit trail, and manual charges.

use shared_types::{
    AuditLogEntry, DispatchError, DispatchResult, ManualCharge, Money, Station, StationId, UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::error::{db_err, is_unique_violation};

fn station_from_row(row: &PgRow) -> DispatchResult<Station> {
    Ok(Station {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        group_chat_id: row.try_get("group_chat_id").map_err(db_err)?,
        is_active: row.try_get("is_active").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

pub async fn get_station(conn: &mut PgConnection, id: StationId) -> DispatchResult<Station> {
    let row = sqlx::query(
        "SELECT id, name, group_chat_id, is_active, created_at FROM stations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
    .map_err(db_err)?
    .ok_or(DispatchError::StationNotFound(id))?;
    station_from_row(&row)
}

/// The station a user owns, if any. Owner/dispatcher lookups return Option
/// so intake can fall back to an explicit error menu instead of crashing.
pub async fn station_for_owner(
    conn: &mut PgConnection,
    user_id: UserId,
) -> DispatchResult<Option<Station>> {
    let row = sqlx::query(
        "SELECT s.id, s.name, s.group_chat_id, s.is_active, s.created_at \
         FROM stations s JOIN station_owners o ON o.station_id = s.id \
         WHERE o.user_id = $1 AND s.is_active \
         ORDER BY s.id LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(db_err)?;
    row.as_ref().map(station_from_row).transpose()
}

pub async fn station_for_dispatcher(
    conn: &mut PgConnection,
    user_id: UserId,
) -> DispatchResult<Option<Station>> {
    let row = sqlx::query(
        "SELECT s.id, s.name, s.group_chat_id, s.is_active, s.created_at \
         FROM stations s JOIN station_dispatchers d ON d.station_id = s.id \
         WHERE d.user_id = $1 AND s.is_active \
         ORDER BY s.id LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(db_err)?;
    row.as_ref().map(station_from_row).transpose()
}

pub async fn is_dispatcher(
    conn: &mut PgConnection,
    station_id: StationId,
    user_id: UserId,
) -> DispatchResult<bool> {
    let row = sqlx::query(
        "SELECT 1 AS one FROM station_dispatchers WHERE station_id = $1 AND user_id = $2",
    )
    .bind(station_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
    .map_err(db_err)?;
    Ok(row.is_some())
}

pub async fn add_dispatcher(
    conn: &mut PgConnection,
    station_id: StationId,
    user_id: UserId,
) -> DispatchResult<()> {
    sqlx::query("INSERT INTO station_dispatchers (station_id, user_id) VALUES ($1, $2)")
        .bind(station_id)
        .bind(user_id)
        .execute(conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DispatchError::AlreadyStationMember { user_id }
            } else {
                db_err(e)
            }
        })?;
    Ok(())
}

pub async fn remove_dispatcher(
    conn: &mut PgConnection,
    station_id: StationId,
    user_id: UserId,
) -> DispatchResult<bool> {
    let result =
        sqlx::query("DELETE FROM station_dispatchers WHERE station_id = $1 AND user_id = $2")
            .bind(station_id)
            .bind(user_id)
            .execute(conn)
            .await
            .map_err(db_err)?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_owner(
    conn: &mut PgConnection,
    station_id: StationId,
    user_id: UserId,
) -> DispatchResult<()> {
    sqlx::query("INSERT INTO station_owners (station_id, user_id) VALUES ($1, $2)")
        .bind(station_id)
        .bind(user_id)
        .execute(conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DispatchError::AlreadyStationMember { user_id }
            } else {
                db_err(e)
            }
        })?;
    Ok(())
}

pub async fn remove_owner(
    conn: &mut PgConnection,
    station_id: StationId,
    user_id: UserId,
) -> DispatchResult<bool> {
    let result = sqlx::query("DELETE FROM station_owners WHERE station_id = $1 AND user_id = $2")
        .bind(station_id)
        .bind(user_id)
        .execute(conn)
        .await
        .map_err(db_err)?;
    Ok(result.rows_affected() > 0)
}

pub async fn is_blacklisted(
    conn: &mut PgConnection,
    station_id: StationId,
    courier_id: UserId,
) -> DispatchResult<bool> {
    let row = sqlx::query(
        "SELECT 1 AS one FROM station_blacklist WHERE station_id = $1 AND courier_id = $2",
    )
    .bind(station_id)
    .bind(courier_id)
    .fetch_optional(conn)
    .await
    .map_err(db_err)?;
    Ok(row.is_some())
}

pub async fn add_to_blacklist(
    conn: &mut PgConnection,
    station_id: StationId,
    courier_id: UserId,
) -> DispatchResult<()> {
    sqlx::query(
        "INSERT INTO station_blacklist (station_id, courier_id) VALUES ($1, $2) \
         ON CONFLICT (station_id, courier_id) DO NOTHING",
    )
    .bind(station_id)
    .bind(courier_id)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

pub async fn remove_from_blacklist(
    conn: &mut PgConnection,
    station_id: StationId,
    courier_id: UserId,
) -> DispatchResult<bool> {
    let result =
        sqlx::query("DELETE FROM station_blacklist WHERE station_id = $1 AND courier_id = $2")
            .bind(station_id)
            .bind(courier_id)
            .execute(conn)
            .await
            .map_err(db_err)?;
    Ok(result.rows_affected() > 0)
}

/// Courier ids blacklisted by a station; used to filter broadcast fan-out.
pub async fn blacklisted_couriers(
    conn: &mut PgConnection,
    station_id: StationId,
) -> DispatchResult<Vec<UserId>> {
    let rows =
        sqlx::query("SELECT courier_id FROM station_blacklist WHERE station_id = $1")
            .bind(station_id)
            .fetch_all(conn)
            .await
            .map_err(db_err)?;
    rows.iter()
        .map(|r| r.try_get::<i64, _>("courier_id").map_err(db_err))
        .collect()
}

/// Binds or replaces the station's group chat (where capture-approval
/// prompts are posted).
pub async fn set_group_chat(
    conn: &mut PgConnection,
    station_id: StationId,
    group_chat_id: &str,
) -> DispatchResult<()> {
    let result = sqlx::query("UPDATE stations SET group_chat_id = $2 WHERE id = $1")
        .bind(station_id)
        .bind(group_chat_id)
        .execute(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected() == 0 {
        return Err(DispatchError::StationNotFound(station_id));
    }
    Ok(())
}

pub async fn insert_audit(
    conn: &mut PgConnection,
    station_id: StationId,
    actor_user_id: UserId,
    action: &str,
    target_user_id: Option<UserId>,
    details: Option<serde_json::Value>,
) -> DispatchResult<()> {
    sqlx::query(
        "INSERT INTO audit_log (station_id, actor_user_id, action, target_user_id, details) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(station_id)
    .bind(actor_user_id)
    .bind(action)
    .bind(target_user_id)
    .bind(details)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

pub async fn recent_audit(
    conn: &mut PgConnection,
    station_id: StationId,
    limit: i64,
) -> DispatchResult<Vec<AuditLogEntry>> {
    let rows = sqlx::query(
        "SELECT id, station_id, actor_user_id, action, target_user_id, details, created_at \
         FROM audit_log WHERE station_id = $1 \
         ORDER BY created_at DESC LIMIT $2",
    )
    .bind(station_id)
    .bind(limit)
    .fetch_all(conn)
    .await
    .map_err(db_err)?;
    rows.iter()
        .map(|row| {
            Ok(AuditLogEntry {
                id: row.try_get("id").map_err(db_err)?,
                station_id: row.try_get("station_id").map_err(db_err)?,
                actor_user_id: row.try_get("actor_user_id").map_err(db_err)?,
                action: row.try_get("action").map_err(db_err)?,
                target_user_id: row.try_get("target_user_id").map_err(db_err)?,
                details: row.try_get("details").map_err(db_err)?,
                created_at: row.try_get("created_at").map_err(db_err)?,
            })
        })
        .collect()
}

pub async fn insert_manual_charge(
    conn: &mut PgConnection,
    station_id: StationId,
    courier_id: UserId,
    charged_by: UserId,
    amount: Money,
    reason: &str,
) -> DispatchResult<ManualCharge> {
    let row = sqlx::query(
        "INSERT INTO manual_charges (station_id, courier_id, charged_by, amount, reason) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, station_id, courier_id, charged_by, amount, reason, created_at",
    )
    .bind(station_id)
    .bind(courier_id)
    .bind(charged_by)
    .bind(amount)
    .bind(reason)
    .fetch_one(conn)
    .await
    .map_err(db_err)?;
    Ok(ManualCharge {
        id: row.try_get("id").map_err(db_err)?,
        station_id: row.try_get("station_id").map_err(db_err)?,
        courier_id: row.try_get("courier_id").map_err(db_err)?,
        charged_by: row.try_get("charged_by").map_err(db_err)?,
        amount: row.try_get("amount").map_err(db_err)?,
        reason: row.try_get("reason").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}
