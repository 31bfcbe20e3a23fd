//! Wallet repositories: courier wallets + append-only ledger, and the
//! parallel station structures.
//!
//! Every read-modify-write on a wallet must hold the wallet row `FOR UPDATE`
//! in the same transaction as the balance write and the ledger insert. The
//! unique (courier_id, delivery_id, entry_type) index turns a replayed debit
//! into a rollback instead of a double charge.

use rust_decimal::Decimal;
use shared_types::{
    CourierWallet, DeliveryId, DispatchError, DispatchResult, LedgerEntryType, Money, StationId,
    StationLedgerEntry, StationWallet, UserId, WalletLedgerEntry,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::error::{db_err, is_unique_violation};

fn wallet_from_row(row: &PgRow) -> DispatchResult<CourierWallet> {
    Ok(CourierWallet {
        courier_id: row.try_get("courier_id").map_err(db_err)?,
        balance: row.try_get("balance").map_err(db_err)?,
        credit_limit: row.try_get("credit_limit").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn ledger_from_row(row: &PgRow) -> DispatchResult<WalletLedgerEntry> {
    let type_s: String = row.try_get("entry_type").map_err(db_err)?;
    Ok(WalletLedgerEntry {
        id: row.try_get("id").map_err(db_err)?,
        courier_id: row.try_get("courier_id").map_err(db_err)?,
        delivery_id: row.try_get("delivery_id").map_err(db_err)?,
        entry_type: LedgerEntryType::parse(&type_s)
            .ok_or_else(|| DispatchError::Internal(format!("unknown entry type {type_s}")))?,
        amount: row.try_get("amount").map_err(db_err)?,
        balance_after: row.try_get("balance_after").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn station_wallet_from_row(row: &PgRow) -> DispatchResult<StationWallet> {
    Ok(StationWallet {
        station_id: row.try_get("station_id").map_err(db_err)?,
        balance: row.try_get("balance").map_err(db_err)?,
        commission_rate: row.try_get("commission_rate").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn station_ledger_from_row(row: &PgRow) -> DispatchResult<StationLedgerEntry> {
    let type_s: String = row.try_get("entry_type").map_err(db_err)?;
    Ok(StationLedgerEntry {
        id: row.try_get("id").map_err(db_err)?,
        station_id: row.try_get("station_id").map_err(db_err)?,
        delivery_id: row.try_get("delivery_id").map_err(db_err)?,
        entry_type: LedgerEntryType::parse(&type_s)
            .ok_or_else(|| DispatchError::Internal(format!("unknown entry type {type_s}")))?,
        amount: row.try_get("amount").map_err(db_err)?,
        balance_after: row.try_get("balance_after").map_err(db_err)?,
        description: row.try_get("description").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

// =============================================================================
// COURIER WALLETS
// =============================================================================

/// Idempotent, race-safe wallet creation: a concurrent insert loses the
/// conflict and the follow-up select observes the winner's row.
pub async fn get_or_create_wallet(
    conn: &mut PgConnection,
    courier_id: UserId,
) -> DispatchResult<CourierWallet> {
    sqlx::query(
        "INSERT INTO courier_wallets (courier_id) VALUES ($1) \
         ON CONFLICT (courier_id) DO NOTHING",
    )
    .bind(courier_id)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    let row = sqlx::query(
        "SELECT courier_id, balance, credit_limit, updated_at \
         FROM courier_wallets WHERE courier_id = $1",
    )
    .bind(courier_id)
    .fetch_one(conn)
    .await
    .map_err(db_err)?;
    wallet_from_row(&row)
}

/// Locks the wallet row, creating it first if absent.
pub async fn lock_wallet(
    conn: &mut PgConnection,
    courier_id: UserId,
) -> DispatchResult<CourierWallet> {
    sqlx::query(
        "INSERT INTO courier_wallets (courier_id) VALUES ($1) \
         ON CONFLICT (courier_id) DO NOTHING",
    )
    .bind(courier_id)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    let row = sqlx::query(
        "SELECT courier_id, balance, credit_limit, updated_at \
         FROM courier_wallets WHERE courier_id = $1 FOR UPDATE",
    )
    .bind(courier_id)
    .fetch_one(conn)
    .await
    .map_err(db_err)?;
    wallet_from_row(&row)
}

pub async fn update_wallet_balance(
    conn: &mut PgConnection,
    courier_id: UserId,
    new_balance: Money,
) -> DispatchResult<()> {
    sqlx::query(
        "UPDATE courier_wallets SET balance = $2, updated_at = now() WHERE courier_id = $1",
    )
    .bind(courier_id)
    .bind(new_balance)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Inserts a ledger row. A unique violation on
/// (courier_id, delivery_id, entry_type) becomes `DuplicateCharge` so the
/// enclosing transaction rolls back cleanly.
pub async fn insert_ledger(
    conn: &mut PgConnection,
    courier_id: UserId,
    delivery_id: Option<DeliveryId>,
    entry_type: LedgerEntryType,
    amount: Money,
    balance_after: Money,
    description: &str,
) -> DispatchResult<WalletLedgerEntry> {
    let row = sqlx::query(
        "INSERT INTO wallet_ledger \
             (courier_id, delivery_id, entry_type, amount, balance_after, description) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, courier_id, delivery_id, entry_type, amount, balance_after, \
                   description, created_at",
    )
    .bind(courier_id)
    .bind(delivery_id)
    .bind(entry_type.as_str())
    .bind(amount)
    .bind(balance_after)
    .bind(description)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DispatchError::DuplicateCharge {
                delivery_id: delivery_id.unwrap_or_default(),
            }
        } else {
            db_err(e)
        }
    })?;
    ledger_from_row(&row)
}

/// Most recent ledger entries, newest first.
pub async fn ledger_history(
    conn: &mut PgConnection,
    courier_id: UserId,
    limit: i64,
) -> DispatchResult<Vec<WalletLedgerEntry>> {
    let rows = sqlx::query(
        "SELECT id, courier_id, delivery_id, entry_type, amount, balance_after, \
                description, created_at \
         FROM wallet_ledger WHERE courier_id = $1 \
         ORDER BY created_at DESC, id DESC LIMIT $2",
    )
    .bind(courier_id)
    .bind(limit)
    .fetch_all(conn)
    .await
    .map_err(db_err)?;
    rows.iter().map(ledger_from_row).collect()
}

// =============================================================================
// STATION WALLETS
// =============================================================================

pub async fn get_or_create_station_wallet(
    conn: &mut PgConnection,
    station_id: StationId,
) -> DispatchResult<StationWallet> {
    sqlx::query(
        "INSERT INTO station_wallets (station_id) VALUES ($1) \
         ON CONFLICT (station_id) DO NOTHING",
    )
    .bind(station_id)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    let row = sqlx::query(
        "SELECT station_id, balance, commission_rate, updated_at \
         FROM station_wallets WHERE station_id = $1",
    )
    .bind(station_id)
    .fetch_one(conn)
    .await
    .map_err(db_err)?;
    station_wallet_from_row(&row)
}

pub async fn lock_station_wallet(
    conn: &mut PgConnection,
    station_id: StationId,
) -> DispatchResult<StationWallet> {
    sqlx::query(
        "INSERT INTO station_wallets (station_id) VALUES ($1) \
         ON CONFLICT (station_id) DO NOTHING",
    )
    .bind(station_id)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    let row = sqlx::query(
        "SELECT station_id, balance, commission_rate, updated_at \
         FROM station_wallets WHERE station_id = $1 FOR UPDATE",
    )
    .bind(station_id)
    .fetch_one(conn)
    .await
    .map_err(db_err)?;
    station_wallet_from_row(&row)
}

pub async fn update_station_balance(
    conn: &mut PgConnection,
    station_id: StationId,
    new_balance: Money,
) -> DispatchResult<()> {
    sqlx::query(
        "UPDATE station_wallets SET balance = $2, updated_at = now() WHERE station_id = $1",
    )
    .bind(station_id)
    .bind(new_balance)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

pub async fn insert_station_ledger(
    conn: &mut PgConnection,
    station_id: StationId,
    delivery_id: Option<DeliveryId>,
    entry_type: LedgerEntryType,
    amount: Money,
    balance_after: Money,
    description: &str,
) -> DispatchResult<StationLedgerEntry> {
    let row = sqlx::query(
        "INSERT INTO station_ledger \
             (station_id, delivery_id, entry_type, amount, balance_after, description) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id, station_id, delivery_id, entry_type, amount, balance_after, \
                   description, created_at",
    )
    .bind(station_id)
    .bind(delivery_id)
    .bind(entry_type.as_str())
    .bind(amount)
    .bind(balance_after)
    .bind(description)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DispatchError::DuplicateCharge {
                delivery_id: delivery_id.unwrap_or_default(),
            }
        } else {
            db_err(e)
        }
    })?;
    station_ledger_from_row(&row)
}

pub async fn station_ledger_history(
    conn: &mut PgConnection,
    station_id: StationId,
    limit: i64,
) -> DispatchResult<Vec<StationLedgerEntry>> {
    let rows = sqlx::query(
        "SELECT id, station_id, delivery_id, entry_type, amount, balance_after, \
                description, created_at \
         FROM station_ledger WHERE station_id = $1 \
         ORDER BY created_at DESC, id DESC LIMIT $2",
    )
    .bind(station_id)
    .bind(limit)
    .fetch_all(conn)
    .await
    .map_err(db_err)?;
    rows.iter().map(station_ledger_from_row).collect()
}

/// Updates the commission rate. The [0.06, 0.12] bound is enforced here and
/// again by the DB CHECK constraint.
pub async fn set_commission_rate(
    conn: &mut PgConnection,
    station_id: StationId,
    rate: Decimal,
) -> DispatchResult<()> {
    if rate < shared_types::COMMISSION_RATE_MIN || rate > shared_types::COMMISSION_RATE_MAX {
        return Err(DispatchError::CommissionRateOutOfRange(rate));
    }
    sqlx::query(
        "UPDATE station_wallets SET commission_rate = $2, updated_at = now() \
         WHERE station_id = $1",
    )
    .bind(station_id)
    .bind(rate)
    .execute(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}
