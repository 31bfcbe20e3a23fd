//! Station-owner flows: dispatcher and owner management (with a
//! confirmation step before removal), station wallet and commission rate,
//! the collection report, the blacklist, and group settings.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use shared_types::{format_money, DispatchError, DispatchResult, MediaRef, Station, User};

use dp_01_validation::{normalize_phone, sanitize, sanitize_for_html};

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
    match state {
        STATION_MENU => handle_menu(station, input, services).await,

        // --- dispatcher management ---
        STATION_DISPATCHERS_MENU => {
            submenu(input, STATION_DISPATCHERS_ADD_PHONE, STATION_DISPATCHERS_REMOVE_PHONE,
                texts::STATION_ASK_ADD_DISPATCHER_PHONE, texts::STATION_ASK_REMOVE_DISPATCHER_PHONE, state)
        }
        STATION_DISPATCHERS_ADD_PHONE => {
            add_member_by_phone(user, station, state, STATION_DISPATCHERS_MENU, input, services, MemberKind::Dispatcher)
                .await
        }
        STATION_DISPATCHERS_REMOVE_PHONE => {
            stage_removal(state, STATION_DISPATCHERS_REMOVE_CONFIRM, input, services).await
        }
        STATION_DISPATCHERS_REMOVE_CONFIRM => {
            confirm_removal(user, station, state, STATION_DISPATCHERS_MENU, ctx, input, services, MemberKind::Dispatcher)
                .await
        }

        // --- owner management ---
        STATION_OWNERS_MENU => {
            submenu(input, STATION_OWNERS_ADD_PHONE, STATION_OWNERS_REMOVE_PHONE,
                texts::STATION_ASK_ADD_OWNER_PHONE, texts::STATION_ASK_REMOVE_OWNER_PHONE, state)
        }
        STATION_OWNERS_ADD_PHONE => {
            add_member_by_phone(user, station, state, STATION_OWNERS_MENU, input, services, MemberKind::Owner)
                .await
        }
        STATION_OWNERS_REMOVE_PHONE => {
            stage_removal(state, STATION_OWNERS_REMOVE_CONFIRM, input, services).await
        }
        STATION_OWNERS_REMOVE_CONFIRM => {
            confirm_removal(user, station, state, STATION_OWNERS_MENU, ctx, input, services, MemberKind::Owner)
                .await
        }

        // --- wallet & commission ---
        STATION_WALLET_MENU => match input {
            keyboards::BTN_SET_COMMISSION => {
                Ok(HandlerReply::go(STATION_WALLET_COMMISSION, texts::STATION_ASK_COMMISSION))
            }
            keyboards::BTN_BACK => Ok(menu_reply(station)),
            _ => wallet_summary(station, services).await,
        },
        STATION_WALLET_COMMISSION => match input.parse::<Decimal>() {
            Ok(rate) => match services.set_commission_rate(station.id, rate).await {
                Ok(()) => Ok(HandlerReply::go(STATION_WALLET_MENU, texts::STATION_COMMISSION_SAVED)
                    .with_keyboard(keyboards::station_wallet_menu())),
                Err(e @ DispatchError::CommissionRateOutOfRange(_)) => {
                    Ok(HandlerReply::stay(state, e.user_message()))
                }
                Err(e) => Err(e),
            },
            Err(_) => Ok(HandlerReply::stay(state, texts::STATION_ASK_COMMISSION)),
        },

        // --- blacklist ---
        STATION_BLACKLIST_MENU => match input {
            keyboards::BTN_ADD => {
                Ok(HandlerReply::go(STATION_BLACKLIST_ADD_PHONE, texts::STATION_ASK_BLACKLIST_PHONE))
            }
            keyboards::BTN_REMOVE => {
                Ok(HandlerReply::go(STATION_BLACKLIST_REMOVE_PHONE, texts::STATION_ASK_UNBLACKLIST_PHONE))
            }
            keyboards::BTN_BACK => Ok(menu_reply(station)),
            _ => Ok(HandlerReply::stay(state, texts::UNKNOWN_INPUT)
                .with_keyboard(keyboards::add_remove_menu())),
        },
        STATION_BLACKLIST_ADD_PHONE => {
            blacklist_change(user, station, state, input, services, true).await
        }
        STATION_BLACKLIST_REMOVE_PHONE => {
            blacklist_change(user, station, state, input, services, false).await
        }

        // --- group settings ---
        STATION_GROUP_SET => {
            let group_id = sanitize(input);
            if group_id.is_empty() {
                return Ok(HandlerReply::stay(state, texts::STATION_ASK_GROUP));
            }
            services.set_station_group(station.id, &group_id).await?;
            Ok(HandlerReply::go(STATION_MENU, texts::STATION_GROUP_SAVED)
                .with_keyboard(keyboards::station_menu()))
        }

        _ => Ok(menu_reply(station)),
    }
}

/// The station-owner main menu.
pub fn menu_reply(station: &Station) -> HandlerReply {
    HandlerReply::go(
        STATION_MENU,
        format!("תחנת {}", sanitize_for_html(&station.name)),
    )
    .with_keyboard(keyboards::station_menu())
}

/// Explicit error menu for owners whose station lookup failed. The state
/// machine stays at INITIAL so a later fix re-routes cleanly.
pub fn lookup_failed_reply() -> HandlerReply {
    HandlerReply::go(INITIAL, texts::STATION_LOOKUP_FAILED)
}

#[derive(Clone, Copy)]
enum MemberKind {
    Dispatcher,
    Owner,
}

async fn handle_menu(
    station: &Station,
    input: &str,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    match input {
        keyboards::BTN_MANAGE_DISPATCHERS => {
            Ok(HandlerReply::go(STATION_DISPATCHERS_MENU, texts::ACTION_DONE)
                .with_keyboard(keyboards::add_remove_menu()))
        }
        keyboards::BTN_MANAGE_OWNERS => {
            Ok(HandlerReply::go(STATION_OWNERS_MENU, texts::ACTION_DONE)
                .with_keyboard(keyboards::add_remove_menu()))
        }
        keyboards::BTN_STATION_WALLET => {
            let reply = wallet_summary(station, services).await?;
            Ok(HandlerReply {
                new_state: STATION_WALLET_MENU.to_string(),
                ..reply
            })
        }
        keyboards::BTN_COLLECTION_REPORT => {
            let entries = services.station_ledger(station.id, 15).await?;
            let text = if entries.is_empty() {
                "אין תנועות עדיין.".to_string()
            } else {
                entries
                    .iter()
                    .map(|e| {
                        format!(
                            "{} {} ₪ (יתרה {})",
                            e.entry_type.as_str(),
                            format_money(e.amount),
                            format_money(e.balance_after)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            Ok(HandlerReply::stay(STATION_MENU, text).with_keyboard(keyboards::station_menu()))
        }
        keyboards::BTN_BLACKLIST => {
            Ok(HandlerReply::go(STATION_BLACKLIST_MENU, texts::ACTION_DONE)
                .with_keyboard(keyboards::add_remove_menu()))
        }
        keyboards::BTN_GROUP_SETTINGS => {
            Ok(HandlerReply::go(STATION_GROUP_SET, texts::STATION_ASK_GROUP))
        }
        _ => Ok(HandlerReply::stay(STATION_MENU, texts::UNKNOWN_INPUT)
            .with_keyboard(keyboards::station_menu())),
    }
}

fn submenu(
    input: &str,
    add_state: &str,
    remove_state: &str,
    add_prompt: &str,
    remove_prompt: &str,
    state: &str,
) -> DispatchResult<HandlerReply> {
    match input {
        keyboards::BTN_ADD => Ok(HandlerReply::go(add_state, add_prompt)),
        keyboards::BTN_REMOVE => Ok(HandlerReply::go(remove_state, remove_prompt)),
        keyboards::BTN_BACK => Ok(HandlerReply::go(STATION_MENU, texts::ACTION_DONE)
            .with_keyboard(keyboards::station_menu())),
        _ => Ok(HandlerReply::stay(state, texts::UNKNOWN_INPUT)
            .with_keyboard(keyboards::add_remove_menu())),
    }
}

async fn wallet_summary(
    station: &Station,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    let wallet = services.station_wallet(station.id).await?;
    let text = format!(
        "יתרת התחנה: {} ₪\nעמלה: {}",
        format_money(wallet.balance),
        wallet.commission_rate
    );
    Ok(HandlerReply::stay(STATION_WALLET_MENU, text)
        .with_keyboard(keyboards::station_wallet_menu()))
}

async fn add_member_by_phone(
    actor: &User,
    station: &Station,
    state: &str,
    back_state: &str,
    input: &str,
    services: &dyn ConversationServices,
    kind: MemberKind,
) -> DispatchResult<HandlerReply> {
    let phone = match normalize_phone(input) {
        Ok(p) => p,
        Err(e) => return Ok(HandlerReply::stay(state, e.user_message())),
    };
    let target = match services.find_user_by_phone(&phone).await? {
        Some(u) => u,
        None => return Ok(HandlerReply::stay(state, texts::COURIER_NOT_FOUND_BY_PHONE)),
    };
    let result = match kind {
        MemberKind::Dispatcher => services.add_dispatcher(station.id, target.id, actor.id).await,
        MemberKind::Owner => services.add_owner(station.id, target.id, actor.id).await,
    };
    let text = match result {
        Ok(()) => texts::STATION_MEMBER_ADDED.to_string(),
        Err(e @ DispatchError::AlreadyStationMember { .. }) => e.user_message(),
        Err(e) => return Err(e),
    };
    Ok(HandlerReply::go(back_state, text).with_keyboard(keyboards::add_remove_menu()))
}

/// Looks the target up and asks for confirmation before removing.
async fn stage_removal(
    state: &str,
    confirm_state: &str,
    input: &str,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    let phone = match normalize_phone(input) {
        Ok(p) => p,
        Err(e) => return Ok(HandlerReply::stay(state, e.user_message())),
    };
    let target = match services.find_user_by_phone(&phone).await? {
        Some(u) => u,
        None => return Ok(HandlerReply::stay(state, texts::COURIER_NOT_FOUND_BY_PHONE)),
    };
    let text = texts::fill(
        texts::STATION_CONFIRM_REMOVE,
        "name",
        &sanitize_for_html(&target.display_name),
    );
    Ok(HandlerReply::go(confirm_state, text)
        .with_patch(patch_one("remove_target_id", target.id))
        .with_keyboard(keyboards::confirm_cancel()))
}

async fn confirm_removal(
    actor: &User,
    station: &Station,
    state: &str,
    back_state: &str,
    ctx: &Map<String, Value>,
    input: &str,
    services: &dyn ConversationServices,
    kind: MemberKind,
) -> DispatchResult<HandlerReply> {
    match input {
        texts::BTN_CONFIRM => {
            let target_id = ctx
                .get("remove_target_id")
                .and_then(Value::as_i64)
                .unwrap_or_default();
            let removed = match kind {
                MemberKind::Dispatcher => {
                    services.remove_dispatcher(station.id, target_id, actor.id).await?
                }
                MemberKind::Owner => services.remove_owner(station.id, target_id, actor.id).await?,
            };
            let text = if removed {
                texts::STATION_MEMBER_REMOVED
            } else {
                texts::COURIER_NOT_FOUND_BY_PHONE
            };
            Ok(HandlerReply::go(back_state, text)
                .with_keyboard(keyboards::add_remove_menu())
                .clearing_context())
        }
        texts::BTN_CANCEL => Ok(HandlerReply::go(back_state, texts::ACTION_DONE)
            .with_keyboard(keyboards::add_remove_menu())
            .clearing_context()),
        _ => Ok(HandlerReply::stay(state, texts::UNKNOWN_INPUT)
            .with_keyboard(keyboards::confirm_cancel())),
    }
}

async fn blacklist_change(
    actor: &User,
    station: &Station,
    state: &str,
    input: &str,
    services: &dyn ConversationServices,
    add: bool,
) -> DispatchResult<HandlerReply> {
    let phone = match normalize_phone(input) {
        Ok(p) => p,
        Err(e) => return Ok(HandlerReply::stay(state, e.user_message())),
    };
    let target = match services.find_user_by_phone(&phone).await? {
        Some(u) => u,
        None => return Ok(HandlerReply::stay(state, texts::COURIER_NOT_FOUND_BY_PHONE)),
    };
    let text = if add {
        services.add_to_blacklist(station.id, target.id, actor.id).await?;
        texts::STATION_BLACKLIST_ADDED
    } else {
        services.remove_from_blacklist(station.id, target.id, actor.id).await?;
        texts::STATION_BLACKLIST_REMOVED
    };
    Ok(HandlerReply::go(STATION_BLACKLIST_MENU, text)
        .with_keyboard(keyboards::add_remove_menu()))
}
