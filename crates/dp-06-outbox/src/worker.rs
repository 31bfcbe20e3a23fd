//! The outbox drain worker.
//!
//! A small pool of workers kicked by a periodic tick. Each iteration claims
//! a bounded batch of due rows with `FOR UPDATE SKIP LOCKED`, resolves
//! recipients (broadcast fans out to eligible couriers), sends under the
//! service's circuit breaker, and records the outcome: sent, rescheduled
//! with exponential backoff, or dead-lettered for the operator.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shared_types::{
    DispatchError, DispatchResult, OutboxMessage, Platform, BROADCAST_COURIERS,
};
use sqlx::PgPool;
use tracing::{error, info, warn};

use dispatch_telemetry::{correlation_scope, CorrelationId};
use dp_02_storage::{db_err, outbox, stations, users};

use crate::backoff::next_backoff_secs;
use crate::breaker::breaker_for;
use crate::senders::{PlatformSender, SendError};

/// Worker tuning.
#[derive(Clone)]
pub struct WorkerConfig {
    /// Rows claimed per iteration.
    pub batch_size: i64,
    /// Drain tick period.
    pub tick_interval: Duration,
    /// First-retry backoff base, in seconds.
    pub base_backoff_secs: u64,
    /// Backoff ceiling, in seconds.
    pub max_backoff_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            tick_interval: Duration::from_secs(10),
            base_backoff_secs: 60,
            max_backoff_secs: 3600,
        }
    }
}

/// Drains the outbox against the configured platform senders.
pub struct OutboxWorker {
    pool: PgPool,
    config: WorkerConfig,
    bot: Arc<dyn PlatformSender>,
    webchat: Arc<dyn PlatformSender>,
    /// Separate admin channel, where configured; falls back to the user
    /// channel otherwise.
    webchat_admin: Option<Arc<dyn PlatformSender>>,
}

impl OutboxWorker {
    pub fn new(
        pool: PgPool,
        config: WorkerConfig,
        bot: Arc<dyn PlatformSender>,
        webchat: Arc<dyn PlatformSender>,
        webchat_admin: Option<Arc<dyn PlatformSender>>,
    ) -> Self {
        Self {
            pool,
            config,
            bot,
            webchat,
            webchat_admin,
        }
    }

    /// Runs the drain loop until the task is aborted.
    pub async fn run(self: Arc<Self>) {
        let mut tick = tokio::time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            batch_size = self.config.batch_size,
            tick_secs = self.config.tick_interval.as_secs(),
            "outbox worker started"
        );
        loop {
            tick.tick().await;
            if let Err(e) = self.drain_once().await {
                error!(error = %e, "outbox drain iteration failed");
            }
        }
    }

    /// One drain iteration: claim, process, record. Public so tests and
    /// operator tooling can step the worker deterministically.
    pub async fn drain_once(&self) -> DispatchResult<usize> {
        let claimed = {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            let batch = outbox::claim_batch(&mut tx, self.config.batch_size, Utc::now()).await?;
            tx.commit().await.map_err(db_err)?;
            batch
        };

        let count = claimed.len();
        for message in claimed {
            // Re-enter the scope of the request that enqueued the row, so
            // its logs and outbound calls share the original ID. Rows
            // enqueued outside any request scope get a fresh one.
            let correlation_id = message
                .correlation_id
                .as_deref()
                .and_then(|id| CorrelationId::parse(id).ok())
                .unwrap_or_default();
            correlation_scope(correlation_id, self.process_message(message)).await;
        }
        Ok(count)
    }

    async fn process_message(&self, message: OutboxMessage) {
        let outcome = self.deliver(&message).await;
        if let Err(e) = self.record_outcome(&message, outcome).await {
            error!(message_id = message.id, error = %e, "failed to record outbox outcome");
        }
    }

    /// Resolves recipients and sends. A broadcast aggregates per-recipient
    /// outcomes: any transient failure retries the whole row (recipients
    /// must tolerate duplicates), permanent-only failures dead-letter it.
    async fn deliver(&self, message: &OutboxMessage) -> Result<(), SendError> {
        let recipients = match self.resolve_recipients(message).await {
            Ok(r) => r,
            Err(e) => return Err(SendError::Transient(e.to_string())),
        };
        if recipients.is_empty() {
            info!(message_id = message.id, "broadcast resolved to no recipients");
            return Ok(());
        }

        let mut transient: Option<SendError> = None;
        let mut permanent: Option<SendError> = None;
        for (platform, recipient) in recipients {
            match self.send_one(message, platform, &recipient).await {
                Ok(()) => {}
                Err(e) if e.is_transient() => transient = Some(e),
                Err(e) => permanent = Some(e),
            }
        }
        if let Some(e) = transient {
            return Err(e);
        }
        if let Some(e) = permanent {
            return Err(e);
        }
        Ok(())
    }

    async fn send_one(
        &self,
        message: &OutboxMessage,
        platform: Platform,
        recipient: &str,
    ) -> Result<(), SendError> {
        let sender = self.sender_for(platform, &message.message_type);
        let breaker = breaker_for(sender.service_name());
        match breaker
            .execute(|| sender.send(recipient, &message.content))
            .await
        {
            // Breaker open: short-circuited, retry later.
            Err(DispatchError::ServiceUnavailable { service }) => {
                Err(SendError::Transient(format!("circuit open: {service}")))
            }
            Err(e) => Err(SendError::Transient(e.to_string())),
            Ok(result) => result,
        }
    }

    fn sender_for(&self, platform: Platform, message_type: &str) -> Arc<dyn PlatformSender> {
        match platform {
            Platform::Bot => Arc::clone(&self.bot),
            Platform::WebChat => {
                if message_type.starts_with("admin_") {
                    self.webchat_admin
                        .as_ref()
                        .map(Arc::clone)
                        .unwrap_or_else(|| Arc::clone(&self.webchat))
                } else {
                    Arc::clone(&self.webchat)
                }
            }
        }
    }

    /// Broadcast fan-out: all active approved couriers, excluding the
    /// shipment's station blacklist and group/placeholder identifiers.
    async fn resolve_recipients(
        &self,
        message: &OutboxMessage,
    ) -> DispatchResult<Vec<(Platform, String)>> {
        if message.recipient_id != BROADCAST_COURIERS {
            return Ok(vec![(message.platform, message.recipient_id.clone())]);
        }

        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        let couriers = users::active_approved_couriers(&mut conn).await?;
        let blacklisted = match message.station_id {
            Some(station_id) => stations::blacklisted_couriers(&mut conn, station_id).await?,
            None => Vec::new(),
        };

        Ok(couriers
            .into_iter()
            .filter(|c| !blacklisted.contains(&c.id))
            .filter(|c| !c.chat_id.is_empty() && !c.chat_id.starts_with('-'))
            .map(|c| (c.platform, c.chat_id))
            .collect())
    }

    async fn record_outcome(
        &self,
        message: &OutboxMessage,
        outcome: Result<(), SendError>,
    ) -> DispatchResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        match outcome {
            Ok(()) => outbox::mark_sent(&mut conn, message.id).await,
            Err(e) if e.is_transient() => {
                let retry_count = message.retry_count + 1;
                if retry_count >= message.max_retries {
                    warn!(
                        message_id = message.id,
                        retry_count,
                        error = e.message(),
                        "outbox message dead-lettered after max retries"
                    );
                    outbox::mark_failed(&mut conn, message.id, e.message()).await
                } else {
                    let delay = next_backoff_secs(
                        retry_count,
                        self.config.base_backoff_secs,
                        self.config.max_backoff_secs,
                    );
                    let next_retry_at = Utc::now() + chrono::Duration::seconds(delay as i64);
                    info!(
                        message_id = message.id,
                        retry_count,
                        delay_secs = delay,
                        "outbox send failed; retry scheduled"
                    );
                    outbox::schedule_retry(&mut conn, message.id, retry_count, next_retry_at, e.message())
                        .await
                }
            }
            Err(e) => {
                warn!(
                    message_id = message.id,
                    error = e.message(),
                    "outbox message failed permanently"
                );
                outbox::mark_failed(&mut conn, message.id, e.message()).await
            }
        }
    }
}
