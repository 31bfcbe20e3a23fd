//! Role-based routing.
//!
//! Every role is handled explicitly — there is no generic fallback arm. A
//! station owner or dispatcher whose station lookup fails gets a clear
//! error menu rather than a crash or a silent demotion.

use shared_types::{DispatchResult, MediaRef, Role, User};
use tracing::error;

use crate::domain::reply::HandlerReply;
use crate::domain::state::{ADMIN_MENU, INITIAL};
use crate::handlers::{courier, dispatcher, sender, station};
use crate::ports::ConversationServices;
use crate::texts;

/// The menu a user lands on for `/start`, global keywords, and admin
/// resets. Exhaustive over `Role` by construction.
pub async fn route_to_role_menu(
    user: &User,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    match user.role {
        Role::Sender => {
            if user.display_name.trim().is_empty() {
                Ok(HandlerReply::go(
                    crate::domain::state::SENDER_REGISTER_COLLECT_NAME,
                    texts::ASK_NAME,
                ))
            } else {
                Ok(sender::menu_reply(user))
            }
        }
        Role::Courier => match services.station_for_dispatcher(user.id).await? {
            Some(_) => Ok(dispatcher::menu_reply()),
            None => Ok(courier::entry_reply(user)),
        },
        Role::Admin => Ok(HandlerReply::go(ADMIN_MENU, texts::ADMIN_MENU_TEXT)),
        Role::StationOwner => match services.station_for_owner(user.id).await? {
            Some(station) => Ok(station::menu_reply(&station)),
            None => {
                error!(user_id = user.id, "station owner without an active station");
                Ok(station::lookup_failed_reply())
            }
        },
    }
}

/// Dispatches one inbound message to the role handler. Exhaustive over
/// `Role`; courier callbacks (capture/pickup/deliver) reach the courier
/// handler even for dispatchers.
pub async fn dispatch(
    user: &User,
    state: &str,
    ctx: &serde_json::Map<String, serde_json::Value>,
    input: &str,
    media: Option<&MediaRef>,
    services: &dyn ConversationServices,
) -> DispatchResult<HandlerReply> {
    match user.role {
        Role::Sender => sender::handle(user, state, ctx, input, media, services).await,
        Role::Courier => {
            let dispatcher_station = services.station_for_dispatcher(user.id).await?;
            match dispatcher_station {
                Some(station) if !is_courier_callback(input) => {
                    let effective_state = if state == INITIAL {
                        crate::domain::state::DISPATCHER_MENU
                    } else {
                        state
                    };
                    dispatcher::handle(user, &station, effective_state, ctx, input, media, services)
                        .await
                }
                _ => courier::handle(user, state, ctx, input, media, services).await,
            }
        }
        Role::Admin => Ok(HandlerReply::stay(ADMIN_MENU, texts::ADMIN_MENU_TEXT)),
        Role::StationOwner => match services.station_for_owner(user.id).await? {
            Some(station) => {
                let effective_state = if state == INITIAL {
                    crate::domain::state::STATION_MENU
                } else {
                    state
                };
                station::handle(user, &station, effective_state, ctx, input, media, services).await
            }
            None => {
                error!(user_id = user.id, "station owner without an active station");
                Ok(station::lookup_failed_reply())
            }
        },
    }
}

fn is_courier_callback(input: &str) -> bool {
    input.starts_with("capture:") || input.starts_with("pickup:") || input.starts_with("deliver:")
}
