//! In-memory `ConversationServices` double for flow tests.
//!
//! Holds users, deliveries, wallets, and station membership in mutex-guarded
//! maps, and records side effects so tests can assert on them. Business
//! rules that matter to flows (credit limits, blacklists, state
//! preconditions) are modeled; everything else is a faithful store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use shared_types::{
    ApprovalStatus, CourierWallet, Delivery, DeliveryId, DeliveryStatus, DispatchError,
    DispatchResult, Money, Role, Station, StationId, StationLedgerEntry, StationWallet, User,
    UserId, WalletLedgerEntry, COMMISSION_RATE_MAX, COMMISSION_RATE_MIN,
};

use dp_02_storage::users::CourierField;
use dp_04_shipment::{generate_token, CaptureOutcome, NewShipmentRequest};

use crate::ports::{ClaimByToken, ConversationServices};

/// Default credit limit mirrored from the schema.
fn default_credit_limit() -> Money {
    Decimal::from_parts(500, 0, 0, true, 0)
}

#[derive(Default)]
pub struct MockServices {
    pub users: Mutex<HashMap<UserId, User>>,
    pub deliveries: Mutex<HashMap<DeliveryId, Delivery>>,
    pub wallets: Mutex<HashMap<UserId, CourierWallet>>,
    pub stations: Mutex<HashMap<StationId, Station>>,
    pub dispatcher_of: Mutex<HashMap<UserId, StationId>>,
    pub owner_of: Mutex<HashMap<UserId, StationId>>,
    pub blacklist: Mutex<HashSet<(StationId, UserId)>>,
    pub admin_notes: Mutex<Vec<String>>,
    next_delivery_id: AtomicI64,
}

impl MockServices {
    pub fn new() -> Self {
        Self {
            next_delivery_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    pub fn add_user(&self, user: User) {
        self.users.lock().insert(user.id, user);
    }

    pub fn add_station(&self, station: Station) {
        self.stations.lock().insert(station.id, station);
    }

    pub fn make_dispatcher(&self, user_id: UserId, station_id: StationId) {
        self.dispatcher_of.lock().insert(user_id, station_id);
    }

    pub fn make_owner(&self, user_id: UserId, station_id: StationId) {
        self.owner_of.lock().insert(user_id, station_id);
    }

    pub fn set_balance(&self, courier_id: UserId, balance: Money, credit_limit: Money) {
        self.wallets.lock().insert(
            courier_id,
            CourierWallet {
                courier_id,
                balance,
                credit_limit,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn delivery_status(&self, id: DeliveryId) -> Option<DeliveryStatus> {
        self.deliveries.lock().get(&id).map(|d| d.status)
    }

    fn wallet_entry(&self, courier_id: UserId) -> CourierWallet {
        self.wallets
            .lock()
            .entry(courier_id)
            .or_insert_with(|| CourierWallet {
                courier_id,
                balance: Decimal::ZERO,
                credit_limit: default_credit_limit(),
                updated_at: Utc::now(),
            })
            .clone()
    }
}

#[async_trait]
impl ConversationServices for MockServices {
    async fn set_display_name(&self, user_id: UserId, name: &str) -> DispatchResult<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&user_id)
            .ok_or(DispatchError::UserNotFound(user_id))?;
        user.display_name = name.to_string();
        Ok(())
    }

    async fn set_role(&self, user_id: UserId, role: Role) -> DispatchResult<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&user_id)
            .ok_or(DispatchError::UserNotFound(user_id))?;
        user.role = role;
        Ok(())
    }

    async fn set_approval_status(
        &self,
        user_id: UserId,
        status: ApprovalStatus,
    ) -> DispatchResult<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&user_id)
            .ok_or(DispatchError::UserNotFound(user_id))?;
        user.approval_status = Some(status);
        Ok(())
    }

    async fn set_courier_field(
        &self,
        user_id: UserId,
        field: CourierField,
        value: &str,
    ) -> DispatchResult<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&user_id)
            .ok_or(DispatchError::UserNotFound(user_id))?;
        let value = value.to_string();
        match field {
            CourierField::FullName => user.full_name = Some(value),
            CourierField::IdDocumentRef => user.id_document_ref = Some(value),
            CourierField::SelfieRef => user.selfie_ref = Some(value),
            CourierField::VehiclePhotoRef => user.vehicle_photo_ref = Some(value),
            CourierField::VehicleCategory => user.vehicle_category = Some(value),
            CourierField::ServiceArea => user.service_area = Some(value),
        }
        Ok(())
    }

    async fn set_terms_accepted(&self, user_id: UserId) -> DispatchResult<()> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(&user_id)
            .ok_or(DispatchError::UserNotFound(user_id))?;
        user.terms_accepted_at = Some(Utc::now());
        Ok(())
    }

    async fn find_user_by_phone(&self, phone: &str) -> DispatchResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .values()
            .find(|u| u.phone == phone)
            .cloned())
    }

    async fn create_shipment(&self, request: NewShipmentRequest) -> DispatchResult<Delivery> {
        let id = self.next_delivery_id.fetch_add(1, Ordering::SeqCst);
        let delivery = Delivery {
            id,
            token: generate_token(),
            sender_id: request.sender_id,
            courier_id: None,
            station_id: request.station_id,
            requesting_courier_id: None,
            pickup_address: request.pickup_address,
            pickup_lat: None,
            pickup_lng: None,
            pickup_contact_name: request.pickup_contact_name,
            pickup_contact_phone: request.pickup_contact_phone,
            dropoff_address: request.dropoff_address,
            dropoff_lat: None,
            dropoff_lng: None,
            dropoff_contact_name: request.dropoff_contact_name,
            dropoff_contact_phone: request.dropoff_contact_phone,
            status: DeliveryStatus::Open,
            fee: request.fee,
            notes: request.notes,
            created_at: Utc::now(),
            captured_at: None,
            delivered_at: None,
            cancelled_at: None,
        };
        self.deliveries.lock().insert(id, delivery.clone());
        Ok(delivery)
    }

    async fn claim_by_token(
        &self,
        token: &str,
        courier_id: UserId,
    ) -> DispatchResult<ClaimByToken> {
        let mut deliveries = self.deliveries.lock();
        let delivery = deliveries
            .values_mut()
            .find(|d| d.token == token)
            .ok_or(DispatchError::DeliveryNotFound)?;
        if delivery.status != DeliveryStatus::Open {
            return Err(DispatchError::DeliveryNotAvailable {
                status: delivery.status.as_str().to_string(),
            });
        }

        if let Some(station_id) = delivery.station_id {
            if self.blacklist.lock().contains(&(station_id, courier_id)) {
                return Err(DispatchError::CourierBlacklisted {
                    courier_id,
                    station_id,
                });
            }
            delivery.status = DeliveryStatus::PendingApproval;
            delivery.requesting_courier_id = Some(courier_id);
            return Ok(ClaimByToken::PendingApproval(delivery.clone()));
        }

        let wallet = self.wallet_entry(courier_id);
        let new_balance = wallet.balance - delivery.fee;
        if new_balance < wallet.credit_limit {
            return Err(DispatchError::InsufficientCredit {
                balance: wallet.balance,
                credit_limit: wallet.credit_limit,
                fee: delivery.fee,
            });
        }
        if let Some(w) = self.wallets.lock().get_mut(&courier_id) {
            w.balance = new_balance;
        }
        delivery.status = DeliveryStatus::Captured;
        delivery.courier_id = Some(courier_id);
        delivery.captured_at = Some(Utc::now());
        Ok(ClaimByToken::Captured(CaptureOutcome {
            delivery: delivery.clone(),
            wallet: CourierWallet {
                balance: new_balance,
                ..wallet
            },
            commission: None,
        }))
    }

    async fn approve_by_token(
        &self,
        token: &str,
        _approver_id: UserId,
    ) -> DispatchResult<CaptureOutcome> {
        let mut deliveries = self.deliveries.lock();
        let delivery = deliveries
            .values_mut()
            .find(|d| d.token == token)
            .ok_or(DispatchError::DeliveryNotFound)?;
        if delivery.status != DeliveryStatus::PendingApproval {
            return Err(DispatchError::DeliveryNotAvailable {
                status: delivery.status.as_str().to_string(),
            });
        }
        let courier_id = delivery
            .requesting_courier_id
            .ok_or_else(|| DispatchError::Internal("no requesting courier".into()))?;
        let wallet = self.wallet_entry(courier_id);
        let new_balance = wallet.balance - delivery.fee;
        if new_balance < wallet.credit_limit {
            return Err(DispatchError::InsufficientCredit {
                balance: wallet.balance,
                credit_limit: wallet.credit_limit,
                fee: delivery.fee,
            });
        }
        if let Some(w) = self.wallets.lock().get_mut(&courier_id) {
            w.balance = new_balance;
        }
        delivery.status = DeliveryStatus::Captured;
        delivery.courier_id = Some(courier_id);
        delivery.requesting_courier_id = None;
        Ok(CaptureOutcome {
            delivery: delivery.clone(),
            wallet: CourierWallet {
                balance: new_balance,
                ..wallet
            },
            commission: None,
        })
    }

    async fn reject_by_token(&self, token: &str, _approver_id: UserId) -> DispatchResult<()> {
        let mut deliveries = self.deliveries.lock();
        let delivery = deliveries
            .values_mut()
            .find(|d| d.token == token)
            .ok_or(DispatchError::DeliveryNotFound)?;
        if delivery.status != DeliveryStatus::PendingApproval {
            return Err(DispatchError::InvalidStateTransition {
                from: delivery.status.as_str().to_string(),
                to: DeliveryStatus::Cancelled.as_str().to_string(),
            });
        }
        delivery.status = DeliveryStatus::Cancelled;
        Ok(())
    }

    async fn mark_picked_up(
        &self,
        delivery_id: DeliveryId,
        courier_id: UserId,
    ) -> DispatchResult<Delivery> {
        let mut deliveries = self.deliveries.lock();
        let delivery = deliveries
            .get_mut(&delivery_id)
            .ok_or(DispatchError::DeliveryNotFound)?;
        if delivery.status != DeliveryStatus::Captured {
            return Err(DispatchError::InvalidStateTransition {
                from: delivery.status.as_str().to_string(),
                to: DeliveryStatus::InProgress.as_str().to_string(),
            });
        }
        if delivery.courier_id != Some(courier_id) {
            return Err(DispatchError::NotAssignedCourier {
                delivery_id,
                courier_id,
            });
        }
        delivery.status = DeliveryStatus::InProgress;
        Ok(delivery.clone())
    }

    async fn mark_delivered(
        &self,
        delivery_id: DeliveryId,
        courier_id: UserId,
    ) -> DispatchResult<Delivery> {
        let mut deliveries = self.deliveries.lock();
        let delivery = deliveries
            .get_mut(&delivery_id)
            .ok_or(DispatchError::DeliveryNotFound)?;
        if delivery.status != DeliveryStatus::InProgress {
            return Err(DispatchError::InvalidStateTransition {
                from: delivery.status.as_str().to_string(),
                to: DeliveryStatus::Delivered.as_str().to_string(),
            });
        }
        if delivery.courier_id != Some(courier_id) {
            return Err(DispatchError::NotAssignedCourier {
                delivery_id,
                courier_id,
            });
        }
        delivery.status = DeliveryStatus::Delivered;
        delivery.delivered_at = Some(Utc::now());
        Ok(delivery.clone())
    }

    async fn open_deliveries(&self, limit: i64) -> DispatchResult<Vec<Delivery>> {
        Ok(self
            .deliveries
            .lock()
            .values()
            .filter(|d| d.status == DeliveryStatus::Open)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn active_for_courier(&self, courier_id: UserId) -> DispatchResult<Vec<Delivery>> {
        Ok(self
            .deliveries
            .lock()
            .values()
            .filter(|d| {
                d.courier_id == Some(courier_id)
                    && matches!(
                        d.status,
                        DeliveryStatus::Captured | DeliveryStatus::InProgress
                    )
            })
            .cloned()
            .collect())
    }

    async fn history_for_courier(
        &self,
        courier_id: UserId,
        limit: i64,
    ) -> DispatchResult<Vec<Delivery>> {
        Ok(self
            .deliveries
            .lock()
            .values()
            .filter(|d| d.courier_id == Some(courier_id) && d.status == DeliveryStatus::Delivered)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn deliveries_for_sender(
        &self,
        sender_id: UserId,
        limit: i64,
    ) -> DispatchResult<Vec<Delivery>> {
        Ok(self
            .deliveries
            .lock()
            .values()
            .filter(|d| d.sender_id == sender_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn deliveries_for_station(
        &self,
        station_id: StationId,
        statuses: &[DeliveryStatus],
        limit: i64,
    ) -> DispatchResult<Vec<Delivery>> {
        Ok(self
            .deliveries
            .lock()
            .values()
            .filter(|d| d.station_id == Some(station_id) && statuses.contains(&d.status))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn wallet(&self, courier_id: UserId) -> DispatchResult<CourierWallet> {
        Ok(self.wallet_entry(courier_id))
    }

    async fn wallet_history(
        &self,
        _courier_id: UserId,
        _limit: i64,
    ) -> DispatchResult<Vec<WalletLedgerEntry>> {
        Ok(Vec::new())
    }

    async fn manual_charge(
        &self,
        _station_id: StationId,
        courier_id: UserId,
        _charged_by: UserId,
        amount: Money,
        _reason: &str,
    ) -> DispatchResult<CourierWallet> {
        let wallet = self.wallet_entry(courier_id);
        let new_balance = wallet.balance - amount;
        if new_balance < wallet.credit_limit {
            return Err(DispatchError::InsufficientCredit {
                balance: wallet.balance,
                credit_limit: wallet.credit_limit,
                fee: amount,
            });
        }
        if let Some(w) = self.wallets.lock().get_mut(&courier_id) {
            w.balance = new_balance;
        }
        Ok(CourierWallet {
            balance: new_balance,
            ..wallet
        })
    }

    async fn station_wallet(&self, station_id: StationId) -> DispatchResult<StationWallet> {
        Ok(StationWallet {
            station_id,
            balance: Decimal::ZERO,
            commission_rate: COMMISSION_RATE_MIN,
            updated_at: Utc::now(),
        })
    }

    async fn station_ledger(
        &self,
        _station_id: StationId,
        _limit: i64,
    ) -> DispatchResult<Vec<StationLedgerEntry>> {
        Ok(Vec::new())
    }

    async fn set_commission_rate(
        &self,
        _station_id: StationId,
        rate: Decimal,
    ) -> DispatchResult<()> {
        if rate < COMMISSION_RATE_MIN || rate > COMMISSION_RATE_MAX {
            return Err(DispatchError::CommissionRateOutOfRange(rate));
        }
        Ok(())
    }

    async fn station_for_owner(&self, user_id: UserId) -> DispatchResult<Option<Station>> {
        let station_id = self.owner_of.lock().get(&user_id).copied();
        Ok(station_id.and_then(|id| self.stations.lock().get(&id).cloned()))
    }

    async fn station_for_dispatcher(&self, user_id: UserId) -> DispatchResult<Option<Station>> {
        let station_id = self.dispatcher_of.lock().get(&user_id).copied();
        Ok(station_id.and_then(|id| self.stations.lock().get(&id).cloned()))
    }

    async fn add_dispatcher(
        &self,
        station_id: StationId,
        user_id: UserId,
        _actor_id: UserId,
    ) -> DispatchResult<()> {
        let mut dispatchers = self.dispatcher_of.lock();
        if dispatchers.get(&user_id) == Some(&station_id) {
            return Err(DispatchError::AlreadyStationMember { user_id });
        }
        dispatchers.insert(user_id, station_id);
        Ok(())
    }

    async fn remove_dispatcher(
        &self,
        _station_id: StationId,
        user_id: UserId,
        _actor_id: UserId,
    ) -> DispatchResult<bool> {
        Ok(self.dispatcher_of.lock().remove(&user_id).is_some())
    }

    async fn add_owner(
        &self,
        station_id: StationId,
        user_id: UserId,
        _actor_id: UserId,
    ) -> DispatchResult<()> {
        let mut owners = self.owner_of.lock();
        if owners.get(&user_id) == Some(&station_id) {
            return Err(DispatchError::AlreadyStationMember { user_id });
        }
        owners.insert(user_id, station_id);
        Ok(())
    }

    async fn remove_owner(
        &self,
        _station_id: StationId,
        user_id: UserId,
        _actor_id: UserId,
    ) -> DispatchResult<bool> {
        Ok(self.owner_of.lock().remove(&user_id).is_some())
    }

    async fn add_to_blacklist(
        &self,
        station_id: StationId,
        courier_id: UserId,
        _actor_id: UserId,
    ) -> DispatchResult<()> {
        self.blacklist.lock().insert((station_id, courier_id));
        Ok(())
    }

    async fn remove_from_blacklist(
        &self,
        station_id: StationId,
        courier_id: UserId,
        _actor_id: UserId,
    ) -> DispatchResult<bool> {
        Ok(self.blacklist.lock().remove(&(station_id, courier_id)))
    }

    async fn set_station_group(
        &self,
        station_id: StationId,
        group_chat_id: &str,
    ) -> DispatchResult<()> {
        let mut stations = self.stations.lock();
        let station = stations
            .get_mut(&station_id)
            .ok_or(DispatchError::StationNotFound(station_id))?;
        station.group_chat_id = Some(group_chat_id.to_string());
        Ok(())
    }

    async fn notify_admins(&self, text: &str) -> DispatchResult<()> {
        self.admin_notes.lock().push(text.to_string());
        Ok(())
    }
}
