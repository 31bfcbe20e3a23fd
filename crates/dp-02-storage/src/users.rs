//! User repository. Users are created lazily on first inbound message and
//! never hard-deleted.

use chrono::{DateTime, Utc};
use shared_types::{
    ApprovalStatus, DispatchError, DispatchResult, Platform, Role, User, UserId,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::error::db_err;

pub(crate) fn user_from_row(row: &PgRow) -> DispatchResult<User> {
    let role_s: String = row.try_get("role").map_err(db_err)?;
    let platform_s: String = row.try_get("platform").map_err(db_err)?;
    let approval_s: Option<String> = row.try_get("approval_status").map_err(db_err)?;

    Ok(User {
        id: row.try_get("id").map_err(db_err)?,
        phone: row.try_get("phone").map_err(db_err)?,
        chat_id: row.try_get("chat_id").map_err(db_err)?,
        display_name: row.try_get("display_name").map_err(db_err)?,
        role: Role::parse(&role_s)
            .ok_or_else(|| DispatchError::Internal(format!("unknown role {role_s}")))?,
        platform: Platform::parse(&platform_s)
            .ok_or_else(|| DispatchError::Internal(format!("unknown platform {platform_s}")))?,
        is_active: row.try_get("is_active").map_err(db_err)?,
        approval_status: match approval_s {
            Some(s) => Some(ApprovalStatus::parse(&s).ok_or_else(|| {
                DispatchError::Internal(format!("unknown approval status {s}"))
            })?),
            None => None,
        },
        full_name: row.try_get("full_name").map_err(db_err)?,
        id_document_ref: row.try_get("id_document_ref").map_err(db_err)?,
        selfie_ref: row.try_get("selfie_ref").map_err(db_err)?,
        vehicle_photo_ref: row.try_get("vehicle_photo_ref").map_err(db_err)?,
        vehicle_category: row.try_get("vehicle_category").map_err(db_err)?,
        service_area: row.try_get("service_area").map_err(db_err)?,
        terms_accepted_at: row.try_get("terms_accepted_at").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

const USER_COLUMNS: &str = "id, phone, chat_id, display_name, role, platform, is_active, \
     approval_status, full_name, id_document_ref, selfie_ref, vehicle_photo_ref, \
     vehicle_category, service_area, terms_accepted_at, created_at";

/// Upserts a user on first contact, keyed on (platform, chat_id).
///
/// An existing row keeps its role and phone; only the display name is
/// refreshed when the platform supplies a non-empty one.
pub async fn upsert_user(
    conn: &mut PgConnection,
    platform: Platform,
    chat_id: &str,
    phone: &str,
    display_name: &str,
) -> DispatchResult<User> {
    let sql = format!(
        "INSERT INTO users (platform, chat_id, phone, display_name, role) \
         VALUES ($1, $2, $3, $4, 'SENDER') \
         ON CONFLICT (platform, chat_id) DO UPDATE \
         SET display_name = CASE WHEN EXCLUDED.display_name <> '' \
                                 THEN EXCLUDED.display_name \
                                 ELSE users.display_name END \
         RETURNING {USER_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(platform.as_str())
        .bind(chat_id)
        .bind(phone)
        .bind(display_name)
        .fetch_one(conn)
        .await
        .map_err(db_err)?;
    user_from_row(&row)
}

pub async fn get_user(conn: &mut PgConnection, id: UserId) -> DispatchResult<User> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(db_err)?
        .ok_or(DispatchError::UserNotFound(id))?;
    user_from_row(&row)
}

pub async fn get_user_by_chat(
    conn: &mut PgConnection,
    platform: Platform,
    chat_id: &str,
) -> DispatchResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE platform = $1 AND chat_id = $2");
    let row = sqlx::query(&sql)
        .bind(platform.as_str())
        .bind(chat_id)
        .fetch_optional(conn)
        .await
        .map_err(db_err)?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn get_user_by_phone(
    conn: &mut PgConnection,
    phone: &str,
) -> DispatchResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1");
    let row = sqlx::query(&sql)
        .bind(phone)
        .fetch_optional(conn)
        .await
        .map_err(db_err)?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn set_display_name(
    conn: &mut PgConnection,
    id: UserId,
    display_name: &str,
) -> DispatchResult<()> {
    let result = sqlx::query("UPDATE users SET display_name = $2 WHERE id = $1")
        .bind(id)
        .bind(display_name)
        .execute(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected() == 0 {
        return Err(DispatchError::UserNotFound(id));
    }
    Ok(())
}

pub async fn set_role(conn: &mut PgConnection, id: UserId, role: Role) -> DispatchResult<()> {
    let result = sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
        .bind(id)
        .bind(role.as_str())
        .execute(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected() == 0 {
        return Err(DispatchError::UserNotFound(id));
    }
    Ok(())
}

pub async fn set_approval_status(
    conn: &mut PgConnection,
    id: UserId,
    status: ApprovalStatus,
) -> DispatchResult<()> {
    let result = sqlx::query("UPDATE users SET approval_status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected() == 0 {
        return Err(DispatchError::UserNotFound(id));
    }
    Ok(())
}

/// Courier onboarding fields updated one at a time as the flow advances.
pub async fn set_courier_field(
    conn: &mut PgConnection,
    id: UserId,
    field: CourierField,
    value: &str,
) -> DispatchResult<()> {
    let sql = match field {
        CourierField::FullName => "UPDATE users SET full_name = $2 WHERE id = $1",
        CourierField::IdDocumentRef => "UPDATE users SET id_document_ref = $2 WHERE id = $1",
        CourierField::SelfieRef => "UPDATE users SET selfie_ref = $2 WHERE id = $1",
        CourierField::VehiclePhotoRef => "UPDATE users SET vehicle_photo_ref = $2 WHERE id = $1",
        CourierField::VehicleCategory => "UPDATE users SET vehicle_category = $2 WHERE id = $1",
        CourierField::ServiceArea => "UPDATE users SET service_area = $2 WHERE id = $1",
    };
    let result = sqlx::query(sql)
        .bind(id)
        .bind(value)
        .execute(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected() == 0 {
        return Err(DispatchError::UserNotFound(id));
    }
    Ok(())
}

/// Column selector for `set_courier_field`; keeps the SQL static.
#[derive(Debug, Clone, Copy)]
pub enum CourierField {
    FullName,
    IdDocumentRef,
    SelfieRef,
    VehiclePhotoRef,
    VehicleCategory,
    ServiceArea,
}

pub async fn set_terms_accepted(
    conn: &mut PgConnection,
    id: UserId,
    at: DateTime<Utc>,
) -> DispatchResult<()> {
    sqlx::query("UPDATE users SET terms_accepted_at = $2 WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

/// Broadcast audience: active approved couriers, excluding placeholder-only
/// group identities (negative bot chat ids denote groups).
pub async fn active_approved_couriers(conn: &mut PgConnection) -> DispatchResult<Vec<User>> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE role = 'COURIER' AND is_active AND approval_status = 'approved' \
           AND chat_id NOT LIKE '-%'"
    );
    let rows = sqlx::query(&sql).fetch_all(conn).await.map_err(db_err)?;
    rows.iter().map(user_from_row).collect()
}
