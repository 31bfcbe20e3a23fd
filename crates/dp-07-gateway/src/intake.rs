//! Webhook intake: idempotency, user upsert, engine dispatch, reply
//! enqueue.
//!
//! The reply and the idempotency-ledger completion commit in one
//! transaction; business side effects triggered by the handler already
//! enqueued their own notifications inside the services' transactions.

use shared_types::{DispatchError, DispatchResult, InboundMessage, Platform};
use tracing::{info, warn};

use dp_01_validation::{mask_phone, normalize_phone, phone_placeholder, validate_phone};
use dp_02_storage::webhook_events::ClaimOutcome;
use dp_02_storage::{db_err, outbox, users, webhook_events};

use crate::state::AppState;

/// Reply shown when a stored callback token has expired.
const BUTTON_EXPIRED: &str = "הכפתור פג תוקף. שלחו \"תפריט\" להתחלה.";

/// Processes one normalized inbound message end to end.
///
/// Returns `Ok(false)` when the message was a duplicate and was skipped.
pub async fn process_inbound(state: &AppState, inbound: InboundMessage) -> DispatchResult<bool> {
    if !inbound.verified {
        return Err(DispatchError::ValidationError {
            field: "verified".to_string(),
            reason: "unverified webhook payload".to_string(),
        });
    }

    // Idempotency claim in its own transaction, so a crash mid-processing
    // leaves a reclaimable `processing` row.
    let dedup_key = inbound.dedup_key();
    let event_id = {
        let mut tx = state.pool.begin().await.map_err(db_err)?;
        let outcome = webhook_events::try_claim(&mut tx, &dedup_key).await?;
        tx.commit().await.map_err(db_err)?;
        match outcome {
            ClaimOutcome::Claimed { event_id } | ClaimOutcome::Reclaimed { event_id } => event_id,
            ClaimOutcome::Duplicate => {
                info!(message_id = %dedup_key, "duplicate inbound message skipped");
                return Ok(false);
            }
        }
    };

    match handle_claimed(state, &inbound).await {
        Ok(()) => {
            let mut conn = state.pool.acquire().await.map_err(db_err)?;
            webhook_events::mark_processed(&mut conn, event_id).await?;
            Ok(true)
        }
        Err(e) => {
            let mut conn = state.pool.acquire().await.map_err(db_err)?;
            webhook_events::mark_failed(&mut conn, event_id).await?;
            Err(e)
        }
    }
}

async fn handle_claimed(state: &AppState, inbound: &InboundMessage) -> DispatchResult<()> {
    // Upsert the user. Bot users without a phone get the deterministic
    // placeholder; web-chat phones are normalized when they validate.
    let phone = match &inbound.phone {
        Some(p) if validate_phone(p) => normalize_phone(p)?,
        _ => phone_placeholder(&inbound.from_user_id)?,
    };
    let display_name = inbound.display_name.clone().unwrap_or_default();

    let user = {
        let mut conn = state.pool.acquire().await.map_err(db_err)?;
        users::upsert_user(
            &mut conn,
            inbound.platform,
            &inbound.from_user_id,
            &phone,
            &display_name,
        )
        .await?
    };

    // Resolve shortened callback tokens; an expired token becomes a
    // user-visible notice instead of reaching the state machine.
    let mut input = inbound.input().unwrap_or_default().to_string();
    if input.starts_with("cb:") {
        let mut redis = state.redis.clone();
        match dp_06_outbox::callback_store::resolve(&mut redis, &input).await? {
            Some(payload) => input = payload,
            None => {
                warn!(user_id = user.id, "expired callback token");
                enqueue_reply(state, inbound.platform, &inbound.chat_id, BUTTON_EXPIRED).await?;
                return Ok(());
            }
        }
    }

    info!(
        user_id = user.id,
        platform = inbound.platform.as_str(),
        phone = %mask_phone(&user.phone),
        "inbound message dispatched"
    );

    let reply = state
        .engine
        .handle_message(&user, &input, inbound.media.as_ref())
        .await;

    match reply {
        Ok(reply) => {
            let content = shared_types::OutboundContent {
                text: reply.text,
                keyboard: reply.keyboard,
                media: None,
            };
            let mut tx = state.pool.begin().await.map_err(db_err)?;
            outbox::enqueue(
                &mut tx,
                inbound.platform,
                &inbound.chat_id,
                "conversation_reply",
                &content,
                None,
                state.config.outbox_max_retries,
            )
            .await?;
            tx.commit().await.map_err(db_err)?;
            Ok(())
        }
        // Business rejections still deserve a localized reply.
        Err(e) if e.code() < 5000 => {
            warn!(user_id = user.id, code = e.code(), error = %e, "handler rejected input");
            enqueue_reply(state, inbound.platform, &inbound.chat_id, &e.user_message()).await
        }
        Err(e) => Err(e),
    }
}

async fn enqueue_reply(
    state: &AppState,
    platform: Platform,
    chat_id: &str,
    text: &str,
) -> DispatchResult<()> {
    let content = shared_types::OutboundContent {
        text: text.to_string(),
        keyboard: None,
        media: None,
    };
    let mut conn = state.pool.acquire().await.map_err(db_err)?;
    outbox::enqueue(
        &mut conn,
        platform,
        chat_id,
        "conversation_reply",
        &content,
        None,
        state.config.outbox_max_retries,
    )
    .await?;
    Ok(())
}
