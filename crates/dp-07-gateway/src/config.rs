//! Environment configuration. These are the recognized options; anything
//! else in the environment is ignored.

use std::env;

use shared_types::{DispatchError, DispatchResult};

/// Full runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Redis connection string.
    pub redis_url: String,
    /// Bot platform token; the sender derives its base URL from it.
    pub bot_api_token: String,
    /// Web-chat gateway base URL.
    pub webchat_base_url: String,
    /// Shared key guarding the debug surface.
    pub admin_api_key: String,
    /// JWT signing secret. Mandatory in production.
    pub jwt_secret_key: String,
    /// JWT algorithm (HS256 unless overridden).
    pub jwt_algorithm: String,
    /// Access-token lifetime, minutes.
    pub jwt_access_ttl_min: i64,
    /// OTP lifetime, seconds.
    pub otp_ttl_seconds: u64,
    /// CORS origins, comma-separated.
    pub allowed_origins: Vec<String>,
    /// Outbox retry budget per message.
    pub outbox_max_retries: i32,
    /// Outbox backoff ceiling, seconds.
    pub outbox_max_backoff_seconds: u64,
    /// Rows an outbox worker claims per iteration.
    pub worker_prefetch: i64,
    /// Display timezone for reports.
    pub time_zone: String,
    /// HTTP bind address.
    pub bind_addr: String,
    /// `production` hardens startup checks.
    pub environment: String,
    /// Optional chat id receiving admin notifications.
    pub admin_chat_id: Option<String>,
    /// Interactive web-chat lists (known to drop some identifier forms;
    /// off by default).
    pub webchat_interactive: bool,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    /// Reads configuration from the environment.
    ///
    /// Fails when `DATABASE_URL` is missing, or when running with
    /// `DP_ENV=production` without a JWT secret.
    pub fn from_env() -> DispatchResult<Self> {
        let environment = var_or("DP_ENV", "development");
        let jwt_secret_key = var_or("JWT_SECRET_KEY", "");
        if environment == "production" && jwt_secret_key.is_empty() {
            return Err(DispatchError::Internal(
                "JWT_SECRET_KEY is required in production".to_string(),
            ));
        }
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| DispatchError::Internal("DATABASE_URL is required".to_string()))?;

        Ok(Self {
            database_url,
            redis_url: var_or("REDIS_URL", "redis://127.0.0.1:6379"),
            bot_api_token: var_or("BOT_API_TOKEN", ""),
            webchat_base_url: var_or("WEBCHAT_BASE_URL", "http://127.0.0.1:3000"),
            admin_api_key: var_or("ADMIN_API_KEY", ""),
            jwt_secret_key,
            jwt_algorithm: var_or("JWT_ALGORITHM", "HS256"),
            jwt_access_ttl_min: var_or("JWT_ACCESS_TTL_MIN", "480").parse().unwrap_or(480),
            otp_ttl_seconds: var_or("OTP_TTL_SECONDS", "300").parse().unwrap_or(300),
            allowed_origins: var_or("ALLOWED_ORIGINS", "")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            outbox_max_retries: var_or("OUTBOX_MAX_RETRIES", "5").parse().unwrap_or(5),
            outbox_max_backoff_seconds: var_or("OUTBOX_MAX_BACKOFF_SECONDS", "3600")
                .parse()
                .unwrap_or(3600),
            worker_prefetch: var_or("WORKER_PREFETCH", "1").parse().unwrap_or(1),
            time_zone: var_or("TIME_ZONE", "Asia/Jerusalem"),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8000"),
            environment,
            admin_chat_id: env::var("ADMIN_CHAT_ID").ok(),
            webchat_interactive: var_or("WEBCHAT_INTERACTIVE", "false") == "true",
        })
    }

    /// Bot API base URL carrying the token.
    pub fn bot_base_url(&self) -> String {
        format!("https://api.telegram.org/bot{}", self.bot_api_token)
    }
}
