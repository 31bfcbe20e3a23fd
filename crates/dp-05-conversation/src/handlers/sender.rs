//! Sender flows: registration and the delivery-creation wizard.
//!
//! The wizard collects both addresses piecewise (city, street, number,
//! apartment), then urgency, optional time and price, a description, and a
//! final confirmation. Context keys hold the collected parts until the
//! confirm step assembles the shipment request.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use shared_types::{DispatchResult, MediaRef, Money, User};

use dp_01_validation::{sanitize, sanitize_for_html, validate_amount, validate_name};
use dp_04_shipment::NewShipmentRequest;

use crate::domain::context::{ctx_str, patch_one};
use crate::domain::reply::HandlerReply;
use crate::domain::state::*;
use crate::keyboards;
use crate::ports::ConversationServices;
use crate::texts;

/// Fee used when the sender skips the price step.
const DEFAULT_FEE: Decimal = Decimal::from_parts(1000, 0, 0, false, 2); // 10.00

pub async fn handle(
    user: &User,
    state: &str,
    ctx: &Map<String, Value>,
    input: &str,
    _media: Option<&MediaRef>,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    match state {
        INITIAL | SENDER_NEW => {
            if user.display_name.trim().is_empty() {
                Ok(HandlerReply::go(SENDER_REGISTER_COLLECT_NAME, texts::ASK_NAME))
            } else {
                Ok(menu_reply(user))
            }
        }

        SENDER_REGISTER_COLLECT_NAME => match validate_name(input) {
            Ok(name) => {
                services.set_display_name(user.id, &name).await?;
                let text =
                    texts::fill(texts::SENDER_WELCOME, "name", &sanitize_for_html(&name));
                Ok(HandlerReply::go(SENDER_MENU, text)
                    .with_keyboard(keyboards::sender_menu()))
            }
            Err(e) => Ok(HandlerReply::stay(state, e.user_message())),
        },

        SENDER_MENU => handle_menu(user, input, services).await,

        SENDER_CREATE_PICKUP_CITY => {
            collect_text(state, SENDER_CREATE_PICKUP_STREET, "pickup_city", input, texts::ASK_PICKUP_STREET)
        }
        SENDER_CREATE_PICKUP_STREET => {
            collect_text(state, SENDER_CREATE_PICKUP_NUMBER, "pickup_street", input, texts::ASK_PICKUP_NUMBER)
        }
        SENDER_CREATE_PICKUP_NUMBER => Ok(collect_text(
            state,
            SENDER_CREATE_PICKUP_APARTMENT,
            "pickup_number",
            input,
            texts::ASK_PICKUP_APARTMENT,
        )?
        .with_keyboard(keyboards::skip_keyboard())),
        SENDER_CREATE_PICKUP_APARTMENT => {
            let patch = optional_patch("pickup_apartment", input);
            Ok(HandlerReply::go(SENDER_CREATE_DROPOFF_CITY, texts::ASK_DROPOFF_CITY)
                .with_patch(patch))
        }
        SENDER_CREATE_DROPOFF_CITY => {
            collect_text(state, SENDER_CREATE_DROPOFF_STREET, "dropoff_city", input, texts::ASK_DROPOFF_STREET)
        }
        SENDER_CREATE_DROPOFF_STREET => {
            collect_text(state, SENDER_CREATE_DROPOFF_NUMBER, "dropoff_street", input, texts::ASK_DROPOFF_NUMBER)
        }
        SENDER_CREATE_DROPOFF_NUMBER => Ok(collect_text(
            state,
            SENDER_CREATE_DROPOFF_APARTMENT,
            "dropoff_number",
            input,
            texts::ASK_DROPOFF_APARTMENT,
        )?
        .with_keyboard(keyboards::skip_keyboard())),
        SENDER_CREATE_DROPOFF_APARTMENT => {
            let patch = optional_patch("dropoff_apartment", input);
            Ok(HandlerReply::go(SENDER_CREATE_URGENCY, texts::ASK_URGENCY)
                .with_patch(patch)
                .with_keyboard(keyboards::urgency_keyboard()))
        }

        SENDER_CREATE_URGENCY => match input {
            texts::URGENCY_IMMEDIATE => Ok(HandlerReply::go(
                SENDER_CREATE_DESCRIPTION,
                texts::ASK_DESCRIPTION,
            )
            .with_patch(patch_one("urgency", input))),
            texts::URGENCY_SCHEDULED => {
                Ok(HandlerReply::go(SENDER_CREATE_TIME, texts::ASK_TIME)
                    .with_patch(patch_one("urgency", input)))
            }
            _ => Ok(HandlerReply::stay(state, texts::UNKNOWN_INPUT)
                .with_keyboard(keyboards::urgency_keyboard())),
        },

        SENDER_CREATE_TIME => Ok(HandlerReply::go(SENDER_CREATE_PRICE, texts::ASK_PRICE)
            .with_patch(patch_one("time", sanitize(input)))
            .with_keyboard(keyboards::skip_keyboard())),

        SENDER_CREATE_PRICE => {
            if input == texts::BTN_SKIP {
                return Ok(HandlerReply::go(
                    SENDER_CREATE_DESCRIPTION,
                    texts::ASK_DESCRIPTION,
                ));
            }
            match input.parse::<Decimal>().ok().map(validate_amount) {
                Some(Ok(price)) => Ok(HandlerReply::go(
                    SENDER_CREATE_DESCRIPTION,
                    texts::ASK_DESCRIPTION,
                )
                .with_patch(patch_one("price", price.to_string()))),
                _ => Ok(HandlerReply::stay(state, texts::UNKNOWN_INPUT)),
            }
        }

        SENDER_CREATE_DESCRIPTION => {
            let description = sanitize(input);
            if description.is_empty() {
                return Ok(HandlerReply::stay(state, texts::ASK_DESCRIPTION));
            }
            let mut preview_ctx = ctx.clone();
            preview_ctx.insert("description".into(), Value::String(description.clone()));
            let summary = summary_text(&preview_ctx);
            Ok(HandlerReply::go(
                SENDER_CREATE_CONFIRM,
                texts::fill(texts::CONFIRM_SHIPMENT, "summary", &summary),
            )
            .with_patch(patch_one("description", description))
            .with_keyboard(keyboards::confirm_cancel()))
        }

        SENDER_CREATE_CONFIRM => match input {
            texts::BTN_CONFIRM => {
                let request = build_request(user, ctx)?;
                services.create_shipment(request).await?;
                Ok(HandlerReply::go(SENDER_MENU, texts::SHIPMENT_CREATED)
                    .with_keyboard(keyboards::sender_menu())
                    .clearing_context())
            }
            texts::BTN_CANCEL => Ok(HandlerReply::go(SENDER_MENU, texts::SHIPMENT_CANCELLED_DRAFT)
                .with_keyboard(keyboards::sender_menu())
                .clearing_context()),
            _ => Ok(HandlerReply::stay(state, texts::UNKNOWN_INPUT)
                .with_keyboard(keyboards::confirm_cancel())),
        },

        _ => Ok(menu_reply(user)),
    }
}

/// The sender main menu reply.
pub fn menu_reply(user: &User) -> HandlerReply {
    let text = texts::fill(
        texts::SENDER_WELCOME,
        "name",
        &sanitize_for_html(&user.display_name),
    );
    HandlerReply::go(SENDER_MENU, text).with_keyboard(keyboards::sender_menu())
}

async fn handle_menu(
    user: &User,
    input: &str,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    match input {
        keyboards::BTN_NEW_SHIPMENT => {
            Ok(HandlerReply::go(SENDER_CREATE_PICKUP_CITY, texts::ASK_PICKUP_CITY))
        }
        keyboards::BTN_MY_SHIPMENTS => {
            let deliveries = services.deliveries_for_sender(user.id, 10).await?;
            let text = super::delivery_list(&deliveries, texts::UNKNOWN_INPUT);
            Ok(HandlerReply::stay(SENDER_MENU, text).with_keyboard(keyboards::sender_menu()))
        }
        keyboards::BTN_HELP => Ok(HandlerReply::stay(SENDER_MENU, texts::ACTION_DONE)
            .with_keyboard(keyboards::sender_menu())),
        _ => Ok(HandlerReply::stay(SENDER_MENU, texts::UNKNOWN_INPUT)
            .with_keyboard(keyboards::sender_menu())),
    }
}

fn collect_text(
    state: &str,
    next_state: &str,
    key: &str,
    input: &str,
    next_prompt: &str,
) -> DispatchResult<HandlerReply> {
    let cleaned = sanitize(input);
    if cleaned.is_empty() {
        return Ok(HandlerReply::stay(state, texts::UNKNOWN_INPUT));
    }
    Ok(HandlerReply::go(next_state, next_prompt).with_patch(patch_one(key, cleaned)))
}

fn optional_patch(key: &str, input: &str) -> Map<String, Value> {
    if input == texts::BTN_SKIP {
        Map::new()
    } else {
        patch_one(key, sanitize(input))
    }
}

fn address_from_ctx(ctx: &Map<String, Value>, prefix: &str) -> String {
    let city = ctx_str(ctx, &format!("{prefix}_city")).unwrap_or_default();
    let street = ctx_str(ctx, &format!("{prefix}_street")).unwrap_or_default();
    let number = ctx_str(ctx, &format!("{prefix}_number")).unwrap_or_default();
    let mut address = format!("{street} {number}, {city}");
    if let Some(apartment) = ctx_str(ctx, &format!("{prefix}_apartment")) {
        address.push_str(&format!(" ({apartment})"));
    }
    address
}

fn summary_text(ctx: &Map<String, Value>) -> String {
    let mut lines = vec![
        format!("מ: {}", sanitize_for_html(&address_from_ctx(ctx, "pickup"))),
        format!("אל: {}", sanitize_for_html(&address_from_ctx(ctx, "dropoff"))),
    ];
    if let Some(urgency) = ctx_str(ctx, "urgency") {
        lines.push(format!("דחיפות: {}", sanitize_for_html(urgency)));
    }
    if let Some(time) = ctx_str(ctx, "time") {
        lines.push(format!("שעה: {}", sanitize_for_html(time)));
    }
    if let Some(price) = ctx_str(ctx, "price") {
        lines.push(format!("מחיר: {}", sanitize_for_html(price)));
    }
    if let Some(description) = ctx_str(ctx, "description") {
        lines.push(format!("תוכן: {}", sanitize_for_html(description)));
    }
    lines.join("\n")
}

fn build_request(user: &User, ctx: &Map<String, Value>) -> DispatchResult<NewShipmentRequest> {
    let fee: Money = match ctx_str(ctx, "price") {
        Some(p) => p.parse().unwrap_or(DEFAULT_FEE),
        None => DEFAULT_FEE,
    };
    let mut notes = String::new();
    if let Some(urgency) = ctx_str(ctx, "urgency") {
        notes.push_str(urgency);
    }
    if let Some(time) = ctx_str(ctx, "time") {
        if !notes.is_empty() {
            notes.push_str(", ");
        }
        notes.push_str(time);
    }
    if let Some(description) = ctx_str(ctx, "description") {
        if !notes.is_empty() {
            notes.push_str(" | ");
        }
        notes.push_str(description);
    }

    Ok(NewShipmentRequest {
        sender_id: user.id,
        station_id: None,
        pickup_address: address_from_ctx(ctx, "pickup"),
        pickup_contact_name: Some(user.display_name.clone()),
        pickup_contact_phone: Some(user.phone.clone()),
        dropoff_address: address_from_ctx(ctx, "dropoff"),
        dropoff_contact_name: None,
        dropoff_contact_phone: None,
        fee,
        notes: if notes.is_empty() { None } else { Some(notes) },
    })
}
