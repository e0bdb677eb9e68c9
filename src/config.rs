//! Environment configuration. `.env` is loaded by the binary before this runs.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::payment::flouci::{DEFAULT_BASE_URL, DEFAULT_PAY_URL};
use crate::payment::FlouciConfig;

const DEV_JWT_SECRET: &str = "storefront-development-secret";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub upload_dir: PathBuf,
    pub frontend_url: Option<String>,
    pub public_url: String,
    pub request_timeout: Duration,
    pub flouci: FlouciConfig,
    pub pay_url: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub nats_url: Option<String>,
    pub json_logs: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> { Self::from_lookup(|key| std::env::var(key).ok()) }

    /// Reads every setting through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup: &lookup };
        let jwt_secret = env.optional("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });
        Ok(Self {
            port: env.try_load("PORT", "3002")?,
            database_url: env.try_load("DATABASE_URL", "sqlite://storefront.db?mode=rwc")?,
            jwt_secret,
            token_ttl_hours: env.try_load("TOKEN_TTL_HOURS", "24")?,
            upload_dir: env.try_load("UPLOAD_DIR", "./uploads")?,
            frontend_url: env.optional("FRONTEND_URL"),
            public_url: env.try_load("PUBLIC_URL", "http://localhost:5173")?,
            request_timeout: Duration::from_secs(env.try_load("REQUEST_TIMEOUT_SECS", "30")?),
            flouci: FlouciConfig {
                api_key: env.optional("FLOUCI_API_KEY"),
                app_token: env.optional("FLOUCI_APP_TOKEN"),
                app_secret: env.optional("FLOUCI_APP_SECRET"),
                developer_id: env.optional("FLOUCI_DEVELOPER_ID"),
                base_url: env.try_load("FLOUCI_BASE_URL", DEFAULT_BASE_URL)?,
            },
            pay_url: env.try_load("FLOUCI_PAY_URL", DEFAULT_PAY_URL)?,
            admin_email: env.optional("ADMIN_EMAIL"),
            admin_password: env.optional("ADMIN_PASSWORD"),
            nats_url: env.optional("NATS_URL"),
            json_logs: env.optional("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>> { lookup: &'a F }

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn try_load<T: FromStr>(&self, key: &'static str, default: &str) -> Result<T, ConfigError>
    where
        T::Err: Display,
    {
        let value = self.optional(key).unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        });
        value.parse().map_err(|e: T::Err| ConfigError::Invalid { key, reason: e.to_string(), value })
    }
}
