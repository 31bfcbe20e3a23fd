//! Dispatcher flows: the union of the courier menu with station tools —
//! the add-shipment wizard, the manual-charge wizard, station views, and
//! approve/reject callbacks for two-step captures.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use shared_types::{format_money, DeliveryStatus, DispatchResult, MediaRef, Station, User};

use dp_01_validation::{normalize_phone, sanitize, validate_address, validate_amount};
use dp_04_shipment::NewShipmentRequest;

use crate::domain::context::{ctx_str, patch_one};
use crate::domain::reply::HandlerReply;
use crate::domain::state::*;
use crate::keyboards;
use crate::ports::ConversationServices;
use crate::texts;

pub async fn handle(
    user: &User,
    station: &Station,
    state: &str,
    ctx: &Map<String, Value>,
    input: &str,
    _media: Option<&MediaRef>,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    // Approval callbacks work from any dispatcher state.
    if let Some(reply) = approval_callback(user, state, input, services).await? {
        return Ok(reply);
    }

    match state {
        DISPATCHER_MENU => handle_menu(user, station, input, services).await,

        DISPATCHER_ADD_SHIPMENT_PICKUP => match validate_address(input) {
            Ok(pickup) => Ok(HandlerReply::go(
                DISPATCHER_ADD_SHIPMENT_DROPOFF,
                texts::DISPATCHER_ASK_DROPOFF,
            )
            .with_patch(patch_one("pickup", pickup))),
            Err(e) => Ok(HandlerReply::stay(state, e.user_message())),
        },

        DISPATCHER_ADD_SHIPMENT_DROPOFF => match validate_address(input) {
            Ok(dropoff) => Ok(HandlerReply::go(
                DISPATCHER_ADD_SHIPMENT_FEE,
                texts::DISPATCHER_ASK_FEE,
            )
            .with_patch(patch_one("dropoff", dropoff))),
            Err(e) => Ok(HandlerReply::stay(state, e.user_message())),
        },

        DISPATCHER_ADD_SHIPMENT_FEE => match input.parse::<Decimal>().ok().map(validate_amount) {
            Some(Ok(fee)) => {
                let summary = format!(
                    "מ: {}\nאל: {}\nמחיר: {} ₪",
                    ctx_str(ctx, "pickup").unwrap_or_default(),
                    ctx_str(ctx, "dropoff").unwrap_or_default(),
                    format_money(fee)
                );
                Ok(HandlerReply::go(
                    DISPATCHER_ADD_SHIPMENT_CONFIRM,
                    texts::fill(texts::CONFIRM_SHIPMENT, "summary", &summary),
                )
                .with_patch(patch_one("fee", fee.to_string()))
                .with_keyboard(keyboards::confirm_cancel()))
            }
            _ => Ok(HandlerReply::stay(state, texts::DISPATCHER_ASK_FEE)),
        },

        DISPATCHER_ADD_SHIPMENT_CONFIRM => match input {
            texts::BTN_CONFIRM => {
                let fee = ctx_str(ctx, "fee")
                    .and_then(|f| f.parse().ok())
                    .unwrap_or_default();
                services
                    .create_shipment(NewShipmentRequest {
                        sender_id: user.id,
                        station_id: Some(station.id),
                        pickup_address: ctx_str(ctx, "pickup").unwrap_or_default().to_string(),
                        pickup_contact_name: None,
                        pickup_contact_phone: None,
                        dropoff_address: ctx_str(ctx, "dropoff").unwrap_or_default().to_string(),
                        dropoff_contact_name: None,
                        dropoff_contact_phone: None,
                        fee,
                        notes: None,
                    })
                    .await?;
                Ok(menu_ok(texts::DISPATCHER_SHIPMENT_CREATED))
            }
            texts::BTN_CANCEL => Ok(menu_ok(texts::SHIPMENT_CANCELLED_DRAFT)),
            _ => Ok(HandlerReply::stay(state, texts::UNKNOWN_INPUT)
                .with_keyboard(keyboards::confirm_cancel())),
        },

        DISPATCHER_CHARGE_PHONE => match normalize_phone(input) {
            Ok(phone) => match services.find_user_by_phone(&phone).await? {
                Some(courier) => Ok(HandlerReply::go(
                    DISPATCHER_CHARGE_AMOUNT,
                    texts::DISPATCHER_ASK_CHARGE_AMOUNT,
                )
                .with_patch(patch_one("charge_courier_id", courier.id))),
                None => Ok(HandlerReply::stay(state, texts::COURIER_NOT_FOUND_BY_PHONE)),
            },
            Err(e) => Ok(HandlerReply::stay(state, e.user_message())),
        },

        DISPATCHER_CHARGE_AMOUNT => match input.parse::<Decimal>().ok().map(validate_amount) {
            Some(Ok(amount)) => Ok(HandlerReply::go(
                DISPATCHER_CHARGE_REASON,
                texts::DISPATCHER_ASK_CHARGE_REASON,
            )
            .with_patch(patch_one("charge_amount", amount.to_string()))),
            _ => Ok(HandlerReply::stay(state, texts::DISPATCHER_ASK_CHARGE_AMOUNT)),
        },

        DISPATCHER_CHARGE_REASON => {
            let reason = sanitize(input);
            if reason.is_empty() {
                return Ok(HandlerReply::stay(state, texts::DISPATCHER_ASK_CHARGE_REASON));
            }
            let summary = format!(
                "חיוב של {} ₪: {}",
                ctx_str(ctx, "charge_amount").unwrap_or("?"),
                reason
            );
            Ok(HandlerReply::go(DISPATCHER_CHARGE_CONFIRM, summary)
                .with_patch(patch_one("charge_reason", reason))
                .with_keyboard(keyboards::confirm_cancel()))
        }

        DISPATCHER_CHARGE_CONFIRM => match input {
            texts::BTN_CONFIRM => {
                let courier_id = ctx
                    .get("charge_courier_id")
                    .and_then(Value::as_i64)
                    .unwrap_or_default();
                let amount: Decimal = ctx_str(ctx, "charge_amount")
                    .and_then(|a| a.parse().ok())
                    .unwrap_or_default();
                let reason = ctx_str(ctx, "charge_reason").unwrap_or_default().to_string();
                match services
                    .manual_charge(station.id, courier_id, user.id, amount, &reason)
                    .await
                {
                    Ok(wallet) => Ok(menu_ok(&texts::fill(
                        texts::DISPATCHER_CHARGE_DONE,
                        "balance",
                        &format_money(wallet.balance),
                    ))),
                    Err(e) => Ok(menu_ok(&e.user_message())),
                }
            }
            texts::BTN_CANCEL => Ok(menu_ok(texts::SHIPMENT_CANCELLED_DRAFT)),
            _ => Ok(HandlerReply::stay(state, texts::UNKNOWN_INPUT)
                .with_keyboard(keyboards::confirm_cancel())),
        },

        _ => Ok(menu_reply()),
    }
}

pub fn menu_reply() -> HandlerReply {
    HandlerReply::go(DISPATCHER_MENU, texts::ACTION_DONE)
        .with_keyboard(keyboards::dispatcher_menu())
}

fn menu_ok(text: &str) -> HandlerReply {
    HandlerReply::go(DISPATCHER_MENU, text)
        .with_keyboard(keyboards::dispatcher_menu())
        .clearing_context()
}

async fn handle_menu(
    user: &User,
    station: &Station,
    input: &str,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    match input {
        keyboards::BTN_ADD_SHIPMENT => Ok(HandlerReply::go(
            DISPATCHER_ADD_SHIPMENT_PICKUP,
            texts::DISPATCHER_ASK_PICKUP,
        )),
        keyboards::BTN_MANUAL_CHARGE => Ok(HandlerReply::go(
            DISPATCHER_CHARGE_PHONE,
            texts::DISPATCHER_ASK_CHARGE_PHONE,
        )),
        keyboards::BTN_STATION_ACTIVE => {
            let deliveries = services
                .deliveries_for_station(
                    station.id,
                    &[
                        DeliveryStatus::Open,
                        DeliveryStatus::PendingApproval,
                        DeliveryStatus::Captured,
                        DeliveryStatus::InProgress,
                    ],
                    20,
                )
                .await?;
            Ok(HandlerReply::stay(
                DISPATCHER_MENU,
                super::delivery_list(&deliveries, "אין משלוחים פעילים בתחנה."),
            )
            .with_keyboard(keyboards::dispatcher_menu()))
        }
        keyboards::BTN_STATION_HISTORY => {
            let deliveries = services
                .deliveries_for_station(station.id, &[DeliveryStatus::Delivered], 20)
                .await?;
            Ok(HandlerReply::stay(
                DISPATCHER_MENU,
                super::delivery_list(&deliveries, "אין היסטוריה עדיין."),
            )
            .with_keyboard(keyboards::dispatcher_menu()))
        }
        // Everything else: the courier side of the union menu.
        _ => match super::courier::menu_action(user, input, services).await? {
            Some((text, keyboard)) => {
                let reply = HandlerReply::stay(DISPATCHER_MENU, text);
                Ok(match keyboard {
                    Some(kb) => reply.with_keyboard(kb),
                    None => reply.with_keyboard(keyboards::dispatcher_menu()),
                })
            }
            None => Ok(HandlerReply::stay(DISPATCHER_MENU, texts::UNKNOWN_INPUT)
                .with_keyboard(keyboards::dispatcher_menu())),
        },
    }
}

/// `approve:<token>` / `reject:<token>` from the station group prompt.
async fn approval_callback(
    user: &User,
    state: &str,
    input: &str,
    services: &dyn ConversationServices,
) -> DispatchResult<Option<HandlerReply>> {
    if let Some(token) = input.strip_prefix("approve:") {
        let text = match services.approve_by_token(token, user.id).await {
            Ok(outcome) => format!(
                "אושר. המשלוח נתפס על ידי השליח (יתרה: {} ₪).",
                format_money(outcome.wallet.balance)
            ),
            Err(e) => e.user_message(),
        };
        return Ok(Some(HandlerReply::stay(state, text)));
    }
    if let Some(token) = input.strip_prefix("reject:") {
        let text = match services.reject_by_token(token, user.id).await {
            Ok(()) => texts::ACTION_DONE.to_string(),
            Err(e) => e.user_message(),
        };
        return Ok(Some(HandlerReply::stay(state, text)));
    }
    Ok(None)
}
