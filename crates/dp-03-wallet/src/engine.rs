//! Wallet operations over the store.
//!
//! In-transaction primitives take `&mut PgConnection` so the shipment
//! workflow can compose them with its own row locks; the `WalletService`
//! wrapper owns a pool for standalone operations (menus, history, manual
//! charges).

use rust_decimal::Decimal;
use shared_types::{
    CourierWallet, DeliveryId, DispatchResult, LedgerEntryType, Money, StationId, UserId,
    WalletLedgerEntry,
};
use sqlx::{PgConnection, PgPool};
use tracing::info;

use dp_02_storage::wallets;

use crate::domain::{compute_commission, compute_debit};

/// Debits a courier wallet for a capture, inside the caller's transaction.
///
/// Locks the wallet row (creating it with the default credit limit if
/// absent), enforces the credit limit, writes the new balance, and appends
/// the `delivery_fee_debit` ledger row. A duplicate (courier, delivery,
/// entry_type) insert surfaces as `DuplicateCharge` and the caller's
/// transaction must roll back.
pub async fn debit_for_capture(
    conn: &mut PgConnection,
    courier_id: UserId,
    delivery_id: DeliveryId,
    fee: Money,
    description: &str,
) -> DispatchResult<(CourierWallet, WalletLedgerEntry)> {
    let wallet = wallets::lock_wallet(conn, courier_id).await?;
    let new_balance = compute_debit(wallet.balance, wallet.credit_limit, fee)?;

    wallets::update_wallet_balance(conn, courier_id, new_balance).await?;
    let entry = wallets::insert_ledger(
        conn,
        courier_id,
        Some(delivery_id),
        LedgerEntryType::DeliveryFeeDebit,
        -fee,
        new_balance,
        description,
    )
    .await?;

    info!(
        courier_id,
        delivery_id,
        amount = %(-fee),
        balance_after = %new_balance,
        "wallet debited for capture"
    );

    Ok((
        CourierWallet {
            balance: new_balance,
            ..wallet
        },
        entry,
    ))
}

/// Credits a courier wallet (refund or bonus), inside the caller's
/// transaction. Same locking discipline as the debit path.
pub async fn credit_for_delivery(
    conn: &mut PgConnection,
    courier_id: UserId,
    delivery_id: DeliveryId,
    amount: Money,
    entry_type: LedgerEntryType,
    description: &str,
) -> DispatchResult<(CourierWallet, WalletLedgerEntry)> {
    let wallet = wallets::lock_wallet(conn, courier_id).await?;
    let new_balance = shared_types::round_money(wallet.balance + amount);

    wallets::update_wallet_balance(conn, courier_id, new_balance).await?;
    let entry = wallets::insert_ledger(
        conn,
        courier_id,
        Some(delivery_id),
        entry_type,
        amount,
        new_balance,
        description,
    )
    .await?;

    Ok((
        CourierWallet {
            balance: new_balance,
            ..wallet
        },
        entry,
    ))
}

/// Credits the station wallet with its commission for a captured fee,
/// inside the caller's transaction. Returns the credited amount.
pub async fn credit_station_commission(
    conn: &mut PgConnection,
    station_id: StationId,
    delivery_id: DeliveryId,
    fee: Money,
) -> DispatchResult<Money> {
    let wallet = wallets::lock_station_wallet(conn, station_id).await?;
    let commission = compute_commission(fee, wallet.commission_rate);
    let new_balance = shared_types::round_money(wallet.balance + commission);

    wallets::update_station_balance(conn, station_id, new_balance).await?;
    wallets::insert_station_ledger(
        conn,
        station_id,
        Some(delivery_id),
        LedgerEntryType::Payment,
        commission,
        new_balance,
        "commission",
    )
    .await?;

    Ok(commission)
}

/// Pool-backed wallet operations for conversation handlers and the panel.
#[derive(Clone)]
pub struct WalletService {
    pool: PgPool,
}

impl WalletService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent wallet fetch-or-create.
    pub async fn get_or_create(&self, courier_id: UserId) -> DispatchResult<CourierWallet> {
        let mut conn = self.pool.acquire().await.map_err(dp_02_storage::db_err)?;
        wallets::get_or_create_wallet(&mut conn, courier_id).await
    }

    /// Read-only approximation of the capture credit check. The capture
    /// path re-checks under a row lock; this is for menu display only.
    pub async fn can_capture(
        &self,
        courier_id: UserId,
        fee: Money,
    ) -> DispatchResult<(bool, Option<String>)> {
        let wallet = self.get_or_create(courier_id).await?;
        match compute_debit(wallet.balance, wallet.credit_limit, fee) {
            Ok(_) => Ok((true, None)),
            Err(e) => Ok((false, Some(e.user_message()))),
        }
    }

    /// Most recent ledger entries, newest first.
    pub async fn history(
        &self,
        courier_id: UserId,
        limit: i64,
    ) -> DispatchResult<Vec<WalletLedgerEntry>> {
        let mut conn = self.pool.acquire().await.map_err(dp_02_storage::db_err)?;
        wallets::ledger_history(&mut conn, courier_id, limit).await
    }

    /// Records a payment received from a courier (deposit), as its own
    /// transaction.
    pub async fn record_payment(
        &self,
        courier_id: UserId,
        amount: Money,
        description: &str,
    ) -> DispatchResult<CourierWallet> {
        let mut tx = self.pool.begin().await.map_err(dp_02_storage::db_err)?;
        let wallet = wallets::lock_wallet(&mut tx, courier_id).await?;
        let new_balance = shared_types::round_money(wallet.balance + amount);
        wallets::update_wallet_balance(&mut tx, courier_id, new_balance).await?;
        wallets::insert_ledger(
            &mut tx,
            courier_id,
            None,
            LedgerEntryType::Payment,
            amount,
            new_balance,
            description,
        )
        .await?;
        tx.commit().await.map_err(dp_02_storage::db_err)?;

        info!(courier_id, amount = %amount, "payment recorded");
        Ok(CourierWallet {
            balance: new_balance,
            ..wallet
        })
    }

    /// Dispatcher-initiated manual charge: debits the courier under the
    /// same credit-limit rule as captures, recording a `ManualCharge` row
    /// plus an `adjustment` ledger entry atomically.
    pub async fn manual_charge(
        &self,
        station_id: StationId,
        courier_id: UserId,
        charged_by: UserId,
        amount: Money,
        reason: &str,
    ) -> DispatchResult<CourierWallet> {
        let mut tx = self.pool.begin().await.map_err(dp_02_storage::db_err)?;
        let wallet = wallets::lock_wallet(&mut tx, courier_id).await?;
        let new_balance = compute_debit(wallet.balance, wallet.credit_limit, amount)?;
        wallets::update_wallet_balance(&mut tx, courier_id, new_balance).await?;
        wallets::insert_ledger(
            &mut tx,
            courier_id,
            None,
            LedgerEntryType::Adjustment,
            -amount,
            new_balance,
            reason,
        )
        .await?;
        dp_02_storage::stations::insert_manual_charge(
            &mut tx,
            station_id,
            courier_id,
            charged_by,
            amount,
            reason,
        )
        .await?;
        tx.commit().await.map_err(dp_02_storage::db_err)?;

        info!(
            courier_id,
            station_id,
            charged_by,
            amount = %amount,
            "manual charge recorded"
        );
        Ok(CourierWallet {
            balance: new_balance,
            ..wallet
        })
    }

    /// Updates a station's commission rate, constrained to [0.06, 0.12].
    pub async fn set_commission_rate(
        &self,
        station_id: StationId,
        rate: Decimal,
    ) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(dp_02_storage::db_err)?;
        wallets::set_commission_rate(&mut conn, station_id, rate).await
    }

    /// Station wallet snapshot for the owner menu.
    pub async fn station_wallet(
        &self,
        station_id: StationId,
    ) -> DispatchResult<shared_types::StationWallet> {
        let mut conn = self.pool.acquire().await.map_err(dp_02_storage::db_err)?;
        wallets::get_or_create_station_wallet(&mut conn, station_id).await
    }
}
