//! Database error mapping.

use shared_types::DispatchError;

/// Postgres unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";

/// True when the error is a unique-constraint violation. The capture path
/// relies on this to turn a duplicate ledger insert into a clean
/// `DUPLICATE_CHARGE` rollback.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|c| c == UNIQUE_VIOLATION)
        .unwrap_or(false)
}

/// Maps an unexpected database error to the internal error kind. Callers
/// that expect specific violations (uniqueness, not-found) must check those
/// first.
pub fn db_err(e: sqlx::Error) -> DispatchError {
    DispatchError::Internal(format!("database error: {e}"))
}
