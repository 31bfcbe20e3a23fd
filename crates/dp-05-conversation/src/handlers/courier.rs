//! Courier flows: onboarding (documents, vehicle, terms), the main menu,
//! capture/pickup/deliver callbacks, area change, and deposit requests.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use shared_types::{format_money, DispatchResult, MediaRef, User};

use dp_01_validation::{mask_phone, sanitize, validate_amount, validate_name};
use dp_02_storage::users::CourierField;

use crate::domain::context::{ctx_str, patch_one};
use crate::domain::reply::HandlerReply;
use crate::domain::state::*;
use crate::keyboards;
use crate::ports::{ClaimByToken, ConversationServices};
use crate::texts;

pub async fn handle(
    user: &User,
    state: &str,
    ctx: &Map<String, Value>,
    input: &str,
    media: Option<&MediaRef>,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    // Capture/pickup/deliver callbacks work from any courier state.
    if let Some(reply) = callback_reply(user, state, input, services).await? {
        return Ok(reply);
    }

    match state {
        COURIER_ONBOARD_NAME => match validate_name(input) {
            Ok(name) => {
                services
                    .set_courier_field(user.id, CourierField::FullName, &name)
                    .await?;
                Ok(HandlerReply::go(COURIER_ONBOARD_ID_DOC, texts::COURIER_ASK_ID_DOC))
            }
            Err(e) => Ok(HandlerReply::stay(state, e.user_message())),
        },

        COURIER_ONBOARD_ID_DOC => {
            collect_media(state, COURIER_ONBOARD_SELFIE, CourierField::IdDocumentRef, media, texts::COURIER_ASK_SELFIE, user, services)
                .await
        }

        COURIER_ONBOARD_SELFIE => {
            let reply = collect_media(
                state,
                COURIER_ONBOARD_VEHICLE_CATEGORY,
                CourierField::SelfieRef,
                media,
                texts::COURIER_ASK_VEHICLE_CATEGORY,
                user,
                services,
            )
            .await?;
            Ok(if reply.new_state == COURIER_ONBOARD_VEHICLE_CATEGORY {
                reply.with_keyboard(keyboards::vehicle_keyboard())
            } else {
                reply
            })
        }

        COURIER_ONBOARD_VEHICLE_CATEGORY => {
            if keyboards::VEHICLE_CATEGORIES.contains(&input) {
                services
                    .set_courier_field(user.id, CourierField::VehicleCategory, input)
                    .await?;
                Ok(HandlerReply::go(COURIER_ONBOARD_VEHICLE_PHOTO, texts::COURIER_ASK_VEHICLE_PHOTO))
            } else {
                Ok(HandlerReply::stay(state, texts::UNKNOWN_INPUT)
                    .with_keyboard(keyboards::vehicle_keyboard()))
            }
        }

        COURIER_ONBOARD_VEHICLE_PHOTO => {
            let reply = collect_media(
                state,
                COURIER_ONBOARD_TERMS,
                CourierField::VehiclePhotoRef,
                media,
                texts::COURIER_ASK_TERMS,
                user,
                services,
            )
            .await?;
            Ok(if reply.new_state == COURIER_ONBOARD_TERMS {
                reply.with_keyboard(keyboards::terms_keyboard())
            } else {
                reply
            })
        }

        COURIER_ONBOARD_TERMS => {
            if input == texts::BTN_CONFIRM {
                services.set_terms_accepted(user.id).await?;
                services
                    .set_approval_status(user.id, shared_types::ApprovalStatus::Pending)
                    .await?;
                services
                    .notify_admins(&format!(
                        "שליח חדש ממתין לאישור: {}",
                        mask_phone(&user.phone)
                    ))
                    .await?;
                Ok(HandlerReply::go(COURIER_PENDING_APPROVAL, texts::COURIER_PENDING))
            } else {
                Ok(HandlerReply::stay(state, texts::COURIER_ASK_TERMS)
                    .with_keyboard(keyboards::terms_keyboard()))
            }
        }

        COURIER_PENDING_APPROVAL => {
            if user.is_approved_courier() {
                Ok(menu_reply())
            } else {
                Ok(HandlerReply::stay(state, texts::COURIER_PENDING))
            }
        }

        COURIER_MENU => match menu_action(user, input, services).await? {
            Some((text, keyboard)) => {
                let reply = HandlerReply::stay(COURIER_MENU, text);
                Ok(match keyboard {
                    Some(kb) => reply.with_keyboard(kb),
                    None => reply.with_keyboard(keyboards::courier_menu()),
                })
            }
            None => match input {
                keyboards::BTN_CHANGE_AREA => {
                    Ok(HandlerReply::go(COURIER_CHANGE_AREA, texts::COURIER_ASK_AREA))
                }
                keyboards::BTN_DEPOSIT => {
                    Ok(HandlerReply::go(COURIER_DEPOSIT_AMOUNT, texts::COURIER_ASK_DEPOSIT_AMOUNT))
                }
                _ => Ok(HandlerReply::stay(COURIER_MENU, texts::UNKNOWN_INPUT)
                    .with_keyboard(keyboards::courier_menu())),
            },
        },

        COURIER_CHANGE_AREA => {
            let area = sanitize(input);
            if area.is_empty() {
                return Ok(HandlerReply::stay(state, texts::COURIER_ASK_AREA));
            }
            services
                .set_courier_field(user.id, CourierField::ServiceArea, &area)
                .await?;
            Ok(HandlerReply::go(COURIER_MENU, texts::COURIER_AREA_SAVED)
                .with_keyboard(keyboards::courier_menu()))
        }

        COURIER_DEPOSIT_AMOUNT => match input.parse::<Decimal>().ok().map(validate_amount) {
            Some(Ok(amount)) => {
                Ok(HandlerReply::go(COURIER_DEPOSIT_UPLOAD, texts::COURIER_ASK_DEPOSIT_UPLOAD)
                    .with_patch(patch_one("deposit_amount", amount.to_string())))
            }
            _ => Ok(HandlerReply::stay(state, texts::COURIER_ASK_DEPOSIT_AMOUNT)),
        },

        COURIER_DEPOSIT_UPLOAD => match media {
            Some(_) => {
                let amount = ctx_str(ctx, "deposit_amount").unwrap_or("?");
                services
                    .notify_admins(&format!(
                        "בקשת הפקדה: {} ₪ מ-{}",
                        amount,
                        mask_phone(&user.phone)
                    ))
                    .await?;
                Ok(HandlerReply::go(COURIER_MENU, texts::COURIER_DEPOSIT_SENT)
                    .with_keyboard(keyboards::courier_menu())
                    .clearing_context())
            }
            None => Ok(HandlerReply::stay(state, texts::MEDIA_REQUIRED)),
        },

        _ => Ok(entry_reply(user)),
    }
}

/// Where a courier lands when no specific state applies: the menu when
/// approved, the pending gate or onboarding otherwise.
pub fn entry_reply(user: &User) -> HandlerReply {
    if user.is_approved_courier() {
        menu_reply()
    } else if user.approval_status.is_some() {
        HandlerReply::go(COURIER_PENDING_APPROVAL, texts::COURIER_PENDING)
    } else {
        HandlerReply::go(COURIER_ONBOARD_NAME, texts::COURIER_ASK_FULL_NAME)
    }
}

pub fn menu_reply() -> HandlerReply {
    HandlerReply::go(COURIER_MENU, texts::ACTION_DONE).with_keyboard(keyboards::courier_menu())
}

/// Shared courier menu actions; the dispatcher menu delegates here so a
/// dispatcher sees the union of both menus. Returns None for inputs this
/// menu does not own.
pub async fn menu_action(
    user: &User,
    input: &str,
    services: &dyn ConversationServices,
) -> DispatchResult<Option<(String, Option<shared_types::Keyboard>)>> {
    match input {
        keyboards::BTN_AVAILABLE => {
            let deliveries = services.open_deliveries(10).await?;
            let mut text = super::delivery_list(&deliveries, "אין משלוחים זמינים כרגע.");
            let keyboard = if deliveries.is_empty() {
                None
            } else {
                text.push_str("\nבחרו משלוח לתפיסה:");
                Some(shared_types::Keyboard {
                    rows: deliveries
                        .iter()
                        .map(|d| vec![format!("capture:{}", d.token)])
                        .collect(),
                })
            };
            Ok(Some((text, keyboard)))
        }
        keyboards::BTN_ACTIVE => {
            let deliveries = services.active_for_courier(user.id).await?;
            let mut rows = Vec::new();
            for d in &deliveries {
                match d.status {
                    shared_types::DeliveryStatus::Captured => {
                        rows.push(vec![format!("pickup:{}", d.id)])
                    }
                    shared_types::DeliveryStatus::InProgress => {
                        rows.push(vec![format!("deliver:{}", d.id)])
                    }
                    _ => {}
                }
            }
            let text = super::delivery_list(&deliveries, "אין משלוחים פעילים.");
            let keyboard = if rows.is_empty() {
                None
            } else {
                Some(shared_types::Keyboard { rows })
            };
            Ok(Some((text, keyboard)))
        }
        keyboards::BTN_WALLET => {
            let wallet = services.wallet(user.id).await?;
            let history = services.wallet_history(user.id, 5).await?;
            let mut text = format!(
                "יתרה: {} ₪\nמסגרת: {} ₪",
                format_money(wallet.balance),
                format_money(wallet.credit_limit)
            );
            for entry in history {
                text.push_str(&format!(
                    "\n{} {} ₪ ({})",
                    entry.entry_type.as_str(),
                    format_money(entry.amount),
                    format_money(entry.balance_after)
                ));
            }
            Ok(Some((text, None)))
        }
        keyboards::BTN_HISTORY => {
            let deliveries = services.history_for_courier(user.id, 10).await?;
            Ok(Some((super::delivery_list(&deliveries, "אין היסטוריה עדיין."), None)))
        }
        keyboards::BTN_SUPPORT => Ok(Some(("כתבו לנו ונחזור אליכם בהקדם.".to_string(), None))),
        _ => Ok(None),
    }
}

/// Handles `capture:<token>`, `pickup:<id>`, and `deliver:<id>` callbacks.
/// Business errors surface as their localized message while the state stays
/// put.
async fn callback_reply(
    user: &User,
    state: &str,
    input: &str,
    services: &dyn ConversationServices,
) -> DispatchResult<Option<HandlerReply>> {
    if let Some(token) = input.strip_prefix("capture:") {
        let text = match services.claim_by_token(token, user.id).await {
            Ok(ClaimByToken::Captured(outcome)) => format!(
                "המשלוח נתפס! יתרה חדשה: {} ₪",
                format_money(outcome.wallet.balance)
            ),
            Ok(ClaimByToken::PendingApproval(_)) => {
                "הבקשה נשלחה לסדרן התחנה לאישור.".to_string()
            }
            Err(e) => e.user_message(),
        };
        return Ok(Some(
            HandlerReply::stay(state, text).with_keyboard(keyboards::courier_menu()),
        ));
    }
    if let Some(id) = input.strip_prefix("pickup:").and_then(|s| s.parse().ok()) {
        let text = match services.mark_picked_up(id, user.id).await {
            Ok(_) => texts::ACTION_DONE.to_string(),
            Err(e) => e.user_message(),
        };
        return Ok(Some(HandlerReply::stay(state, text)));
    }
    if let Some(id) = input.strip_prefix("deliver:").and_then(|s| s.parse().ok()) {
        let text = match services.mark_delivered(id, user.id).await {
            Ok(_) => texts::ACTION_DONE.to_string(),
            Err(e) => e.user_message(),
        };
        return Ok(Some(HandlerReply::stay(state, text)));
    }
    Ok(None)
}

async fn collect_media(
    state: &str,
    next_state: &str,
    field: CourierField,
    media: Option<&MediaRef>,
    next_prompt: &str,
    user: &User,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    match media {
        Some(m) => {
            services.set_courier_field(user.id, field, &m.url).await?;
            Ok(HandlerReply::go(next_state, next_prompt))
        }
        None => Ok(HandlerReply::stay(state, texts::MEDIA_REQUIRED)),
    }
}
