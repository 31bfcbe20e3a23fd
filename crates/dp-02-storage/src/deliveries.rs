//! Delivery repository. Capture-path reads always lock the row; status
//! preconditions are re-checked by the caller after the lock is held.

use chrono::{DateTime, Utc};
use shared_types::{
    Delivery, DeliveryId, DeliveryStatus, DispatchError, DispatchResult, Money, StationId, User,
    UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::error::db_err;
use crate::users;

const DELIVERY_COLUMNS: &str = "id, token, sender_id, courier_id, station_id, \
     requesting_courier_id, pickup_address, pickup_lat, pickup_lng, pickup_contact_name, \
     pickup_contact_phone, dropoff_address, dropoff_lat, dropoff_lng, dropoff_contact_name, \
     dropoff_contact_phone, status, fee, notes, created_at, captured_at, delivered_at, \
     cancelled_at";

pub(crate) fn delivery_from_row(row: &PgRow) -> DispatchResult<Delivery> {
    let status_s: String = row.try_get("status").map_err(db_err)?;
    Ok(Delivery {
        id: row.try_get("id").map_err(db_err)?,
        token: row.try_get("token").map_err(db_err)?,
        sender_id: row.try_get("sender_id").map_err(db_err)?,
        courier_id: row.try_get("courier_id").map_err(db_err)?,
        station_id: row.try_get("station_id").map_err(db_err)?,
        requesting_courier_id: row.try_get("requesting_courier_id").map_err(db_err)?,
        pickup_address: row.try_get("pickup_address").map_err(db_err)?,
        pickup_lat: row.try_get("pickup_lat").map_err(db_err)?,
        pickup_lng: row.try_get("pickup_lng").map_err(db_err)?,
        pickup_contact_name: row.try_get("pickup_contact_name").map_err(db_err)?,
        pickup_contact_phone: row.try_get("pickup_contact_phone").map_err(db_err)?,
        dropoff_address: row.try_get("dropoff_address").map_err(db_err)?,
        dropoff_lat: row.try_get("dropoff_lat").map_err(db_err)?,
        dropoff_lng: row.try_get("dropoff_lng").map_err(db_err)?,
        dropoff_contact_name: row.try_get("dropoff_contact_name").map_err(db_err)?,
        dropoff_contact_phone: row.try_get("dropoff_contact_phone").map_err(db_err)?,
        status: DeliveryStatus::parse(&status_s)
            .ok_or_else(|| DispatchError::Internal(format!("unknown status {status_s}")))?,
        fee: row.try_get("fee").map_err(db_err)?,
        notes: row.try_get("notes").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        captured_at: row.try_get("captured_at").map_err(db_err)?,
        delivered_at: row.try_get("delivered_at").map_err(db_err)?,
        cancelled_at: row.try_get("cancelled_at").map_err(db_err)?,
    })
}

/// Insert payload for a new shipment.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub token: String,
    pub sender_id: UserId,
    pub station_id: Option<StationId>,
    pub pickup_address: String,
    pub pickup_contact_name: Option<String>,
    pub pickup_contact_phone: Option<String>,
    pub dropoff_address: String,
    pub dropoff_contact_name: Option<String>,
    pub dropoff_contact_phone: Option<String>,
    pub fee: Money,
    pub notes: Option<String>,
}

pub async fn insert_delivery(
    conn: &mut PgConnection,
    new: &NewDelivery,
) -> DispatchResult<Delivery> {
    let sql = format!(
        "INSERT INTO deliveries (token, sender_id, station_id, pickup_address, \
             pickup_contact_name, pickup_contact_phone, dropoff_address, \
             dropoff_contact_name, dropoff_contact_phone, fee, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {DELIVERY_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(&new.token)
        .bind(new.sender_id)
        .bind(new.station_id)
        .bind(&new.pickup_address)
        .bind(&new.pickup_contact_name)
        .bind(&new.pickup_contact_phone)
        .bind(&new.dropoff_address)
        .bind(&new.dropoff_contact_name)
        .bind(&new.dropoff_contact_phone)
        .bind(new.fee)
        .bind(&new.notes)
        .fetch_one(conn)
        .await
        .map_err(db_err)?;
    delivery_from_row(&row)
}

pub async fn get_delivery(
    conn: &mut PgConnection,
    id: DeliveryId,
) -> DispatchResult<Delivery> {
    let sql = format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(db_err)?
        .ok_or(DispatchError::DeliveryNotFound)?;
    delivery_from_row(&row)
}

/// Locks the delivery row for the remainder of the transaction.
pub async fn lock_delivery(
    conn: &mut PgConnection,
    id: DeliveryId,
) -> DispatchResult<Delivery> {
    let sql = format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE id = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(db_err)?
        .ok_or(DispatchError::DeliveryNotFound)?;
    delivery_from_row(&row)
}

pub async fn get_delivery_by_token(
    conn: &mut PgConnection,
    token: &str,
) -> DispatchResult<Delivery> {
    let sql = format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE token = $1");
    let row = sqlx::query(&sql)
        .bind(token)
        .fetch_optional(conn)
        .await
        .map_err(db_err)?
        .ok_or(DispatchError::DeliveryNotFound)?;
    delivery_from_row(&row)
}

/// Smart-link lookup: locks by the secure capture token instead of the id,
/// so sequential ids are never exposed to the capture surface.
pub async fn lock_delivery_by_token(
    conn: &mut PgConnection,
    token: &str,
) -> DispatchResult<Delivery> {
    let sql = format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE token = $1 FOR UPDATE");
    let row = sqlx::query(&sql)
        .bind(token)
        .fetch_optional(conn)
        .await
        .map_err(db_err)?
        .ok_or(DispatchError::DeliveryNotFound)?;
    delivery_from_row(&row)
}

/// Applies the capture transition on an already-locked row.
pub async fn apply_capture(
    conn: &mut PgConnection,
    id: DeliveryId,
    courier_id: UserId,
    fee: Money,
    now: DateTime<Utc>,
) -> DispatchResult<()> {
    sqlx::query(
        "UPDATE deliveries \
         SET status = 'CAPTURED', courier_id = $2, fee = $3, captured_at = $4, \
             requesting_courier_id = NULL \
         WHERE id = $1",
    )
    .bind(id)
    .bind(courier_id)
    .bind(fee)
    .bind(now)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Records a two-step capture request on an already-locked OPEN row.
pub async fn apply_capture_request(
    conn: &mut PgConnection,
    id: DeliveryId,
    requesting_courier_id: UserId,
) -> DispatchResult<()> {
    sqlx::query(
        "UPDATE deliveries \
         SET status = 'PENDING_APPROVAL', requesting_courier_id = $2 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(requesting_courier_id)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

pub async fn apply_status(
    conn: &mut PgConnection,
    id: DeliveryId,
    status: DeliveryStatus,
) -> DispatchResult<()> {
    let timestamp_sql = match status {
        DeliveryStatus::Delivered => ", delivered_at = now()",
        DeliveryStatus::Cancelled => ", cancelled_at = now()",
        _ => "",
    };
    let sql = format!("UPDATE deliveries SET status = $2{timestamp_sql} WHERE id = $1");
    sqlx::query(&sql)
        .bind(id)
        .bind(status.as_str())
        .execute(conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

pub async fn open_deliveries(
    conn: &mut PgConnection,
    limit: i64,
) -> DispatchResult<Vec<Delivery>> {
    let sql = format!(
        "SELECT {DELIVERY_COLUMNS} FROM deliveries \
         WHERE status = 'OPEN' ORDER BY created_at LIMIT $1"
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .fetch_all(conn)
        .await
        .map_err(db_err)?;
    rows.iter().map(delivery_from_row).collect()
}

pub async fn active_for_courier(
    conn: &mut PgConnection,
    courier_id: UserId,
) -> DispatchResult<Vec<Delivery>> {
    let sql = format!(
        "SELECT {DELIVERY_COLUMNS} FROM deliveries \
         WHERE courier_id = $1 AND status IN ('CAPTURED', 'IN_PROGRESS') \
         ORDER BY captured_at"
    );
    let rows = sqlx::query(&sql)
        .bind(courier_id)
        .fetch_all(conn)
        .await
        .map_err(db_err)?;
    rows.iter().map(delivery_from_row).collect()
}

pub async fn history_for_courier(
    conn: &mut PgConnection,
    courier_id: UserId,
    limit: i64,
) -> DispatchResult<Vec<Delivery>> {
    let sql = format!(
        "SELECT {DELIVERY_COLUMNS} FROM deliveries \
         WHERE courier_id = $1 AND status = 'DELIVERED' \
         ORDER BY delivered_at DESC LIMIT $2"
    );
    let rows = sqlx::query(&sql)
        .bind(courier_id)
        .bind(limit)
        .fetch_all(conn)
        .await
        .map_err(db_err)?;
    rows.iter().map(delivery_from_row).collect()
}

pub async fn deliveries_for_sender(
    conn: &mut PgConnection,
    sender_id: UserId,
    limit: i64,
) -> DispatchResult<Vec<Delivery>> {
    let sql = format!(
        "SELECT {DELIVERY_COLUMNS} FROM deliveries \
         WHERE sender_id = $1 ORDER BY created_at DESC LIMIT $2"
    );
    let rows = sqlx::query(&sql)
        .bind(sender_id)
        .bind(limit)
        .fetch_all(conn)
        .await
        .map_err(db_err)?;
    rows.iter().map(delivery_from_row).collect()
}

pub async fn deliveries_for_station(
    conn: &mut PgConnection,
    station_id: StationId,
    statuses: &[DeliveryStatus],
    limit: i64,
) -> DispatchResult<Vec<Delivery>> {
    let status_list: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
    let sql = format!(
        "SELECT {DELIVERY_COLUMNS} FROM deliveries \
         WHERE station_id = $1 AND status = ANY($2) \
         ORDER BY created_at DESC LIMIT $3"
    );
    let rows = sqlx::query(&sql)
        .bind(station_id)
        .bind(&status_list)
        .bind(limit)
        .fetch_all(conn)
        .await
        .map_err(db_err)?;
    rows.iter().map(delivery_from_row).collect()
}

/// Eagerly loads a delivery together with its parties. Explicit queries
/// instead of implicit relationship access keep the hot path at a fixed
/// number of round trips.
pub async fn get_delivery_with_parties(
    conn: &mut PgConnection,
    id: DeliveryId,
) -> DispatchResult<(Delivery, User, Option<User>)> {
    let delivery = get_delivery(conn, id).await?;
    let sender = users::get_user(conn, delivery.sender_id).await?;
    let courier = match delivery.courier_id {
        Some(cid) => Some(users::get_user(conn, cid).await?),
        None => None,
    };
    Ok((delivery, sender, courier))
}
