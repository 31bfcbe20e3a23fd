//! Conversation session repository. One row per (user, platform); the row
//! itself serializes concurrent handlers for the same conversation.

use shared_types::{ConversationSession, DispatchError, DispatchResult, Platform, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::error::db_err;

fn session_from_row(row: &PgRow) -> DispatchResult<ConversationSession> {
    let platform_s: String = row.try_get("platform").map_err(db_err)?;
    let context: serde_json::Value = row.try_get("context_data").map_err(db_err)?;
    let context_data = match context {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Ok(ConversationSession {
        user_id: row.try_get("user_id").map_err(db_err)?,
        platform: Platform::parse(&platform_s)
            .ok_or_else(|| DispatchError::Internal(format!("unknown platform {platform_s}")))?,
        current_state: row.try_get("current_state").map_err(db_err)?,
        context_data,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
        last_activity_at: row.try_get("last_activity_at").map_err(db_err)?,
    })
}

/// Fetches the session, creating an INITIAL one on first contact.
pub async fn get_or_create_session(
    conn: &mut PgConnection,
    user_id: UserId,
    platform: Platform,
) -> DispatchResult<ConversationSession> {
    sqlx::query(
        "INSERT INTO conversation_sessions (user_id, platform) VALUES ($1, $2) \
         ON CONFLICT (user_id, platform) DO NOTHING",
    )
    .bind(user_id)
    .bind(platform.as_str())
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    let row = sqlx::query(
        "SELECT user_id, platform, current_state, context_data, updated_at, last_activity_at \
         FROM conversation_sessions WHERE user_id = $1 AND platform = $2",
    )
    .bind(user_id)
    .bind(platform.as_str())
    .fetch_one(conn)
    .await
    .map_err(db_err)?;
    session_from_row(&row)
}

pub async fn get_session(
    conn: &mut PgConnection,
    user_id: UserId,
    platform: Platform,
) -> DispatchResult<Option<ConversationSession>> {
    let row = sqlx::query(
        "SELECT user_id, platform, current_state, context_data, updated_at, last_activity_at \
         FROM conversation_sessions WHERE user_id = $1 AND platform = $2",
    )
    .bind(user_id)
    .bind(platform.as_str())
    .fetch_optional(conn)
    .await
    .map_err(db_err)?;
    row.as_ref().map(session_from_row).transpose()
}

/// Writes the new state and the full (already merged) context.
pub async fn save_session(
    conn: &mut PgConnection,
    user_id: UserId,
    platform: Platform,
    current_state: &str,
    context_data: &serde_json::Map<String, serde_json::Value>,
) -> DispatchResult<()> {
    sqlx::query(
        "UPDATE conversation_sessions \
         SET current_state = $3, context_data = $4, updated_at = now(), \
             last_activity_at = now() \
         WHERE user_id = $1 AND platform = $2",
    )
    .bind(user_id)
    .bind(platform.as_str())
    .bind(current_state)
    .bind(serde_json::Value::Object(context_data.clone()))
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Explicit reset: back to INITIAL with an empty context.
pub async fn reset_session(
    conn: &mut PgConnection,
    user_id: UserId,
    platform: Platform,
) -> DispatchResult<()> {
    sqlx::query(
        "UPDATE conversation_sessions \
         SET current_state = 'INITIAL', context_data = '{}', updated_at = now() \
         WHERE user_id = $1 AND platform = $2",
    )
    .bind(user_id)
    .bind(platform.as_str())
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}
