//! Runtime configuration, read from the environment at startup.
//!
//! All settings live here — destination chat, model parameters, and the
//! accepted channel list are explicit configuration, not code. Missing
//! required settings abort startup before any listener registration.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

const DEFAULT_MODEL: &str = "gpt-5-nano";
const DEFAULT_CLASSIFY_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CLASSIFY_MAX_CONCURRENT: usize = 4;
const DEFAULT_DB_PATH: &str = "./data/messages.db";
const DEFAULT_STATUS_PORT: u16 = 8080;

/// Telegram transport identity and routing.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Application identity pair issued by Telegram.
    pub api_id: i32,
    pub api_hash: String,
    /// Phone number the session belongs to.
    pub phone: String,
    /// Session token. Leaks must not reach logs, hence `SecretString`.
    pub session: SecretString,
    /// Channel usernames to listen on, normalized (lowercase, no `@`).
    pub source_channels: Vec<String>,
    /// Destination chat for accepted listings.
    pub target_chat: String,
}

/// Language-model classifier settings.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: SecretString,
    pub model: String,
    /// Hard deadline for one classification call.
    pub timeout: Duration,
    /// Bound on simultaneous in-flight classification calls.
    pub max_concurrent: usize,
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub classifier: ClassifierConfig,
    pub db_path: String,
    pub status_port: u16,
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup function.
    ///
    /// `from_env` is a thin wrapper over this; tests supply a map instead
    /// of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_id_raw = required(&lookup, "API_ID", "Telegram application id")?;
        let api_id: i32 = api_id_raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "API_ID".into(),
            message: format!("expected an integer, got '{api_id_raw}'"),
        })?;

        let api_hash = required(&lookup, "API_HASH", "Telegram application hash")?;
        let phone = required(&lookup, "TG_PHONE", "phone number of the listening account")?;
        let session = required(&lookup, "TG_SESSION", "exported Telegram session token")?;

        let source_channels: Vec<String> = required(
            &lookup,
            "TG_SOURCE_CHANNELS",
            "comma-separated channel usernames to listen on",
        )?
        .split(',')
        .map(normalize_channel)
        .filter(|c| !c.is_empty())
        .collect();
        if source_channels.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "TG_SOURCE_CHANNELS".into(),
                message: "no usable channel usernames".into(),
            });
        }

        let target_chat = required(
            &lookup,
            "TG_TARGET_CHAT",
            "chat that receives accepted listings",
        )?;

        let api_key = required(&lookup, "OPENAI_API_KEY", "language-model API credential")?;
        let model = lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = parse_or_default(
            &lookup,
            "CLASSIFY_TIMEOUT_SECS",
            DEFAULT_CLASSIFY_TIMEOUT_SECS,
        )?;
        let max_concurrent = parse_or_default(
            &lookup,
            "CLASSIFY_MAX_CONCURRENT",
            DEFAULT_CLASSIFY_MAX_CONCURRENT,
        )?;

        let db_path = lookup("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let status_port = parse_or_default(&lookup, "STATUS_PORT", DEFAULT_STATUS_PORT)?;

        Ok(Self {
            telegram: TelegramConfig {
                api_id,
                api_hash,
                phone,
                session: SecretString::from(session),
                source_channels,
                target_chat,
            },
            classifier: ClassifierConfig {
                api_key: SecretString::from(api_key),
                model,
                timeout: Duration::from_secs(timeout_secs),
                max_concurrent,
            },
            db_path,
            status_port,
        })
    }
}

/// Lowercase a channel reference and strip the leading `@`.
/// Telegram usernames are case-insensitive.
pub fn normalize_channel(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

fn required<F>(lookup: &F, key: &str, hint: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingRequired {
            key: key.into(),
            hint: hint.into(),
        }),
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.into(),
            message: format!("cannot parse '{raw}'"),
        }),
    }
}
