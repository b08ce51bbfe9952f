//! Configuration types.
//!
//! Everything is read once from the environment at process start; there is
//! no hot-reload. `from_lookup` takes an arbitrary key lookup so tests don't
//! have to mutate process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::channels::email::MailboxConfig;
use crate::error::ConfigError;
use crate::petitions::UserProfile;

/// Default number of petitions attempted per signing pass.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default cycle interval in minutes.
const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// Default age after which a `claimed` record is handed back to `pending`.
const DEFAULT_STALE_CLAIM_MINUTES: u64 = 15;

/// Largest accepted stale-claim timeout (one week).
const MAX_STALE_CLAIM_MINUTES: u64 = 7 * 24 * 60;

/// Signing stage configuration.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Whether form-fill attempts are made at all.
    pub automation_enabled: bool,
    /// Maximum petitions selected per pass.
    pub batch_size: usize,
    /// Claims older than this are released at the start of a pass.
    pub stale_claim_after: Duration,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            automation_enabled: false,
            batch_size: DEFAULT_BATCH_SIZE,
            stale_claim_after: Duration::from_secs(DEFAULT_STALE_CLAIM_MINUTES * 60),
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// `None` when host, user, or password is missing (mailbox disabled).
    pub mailbox: Option<MailboxConfig>,
    pub profile: UserProfile,
    pub signing: SigningConfig,
    /// Configured cycle interval (the scheduler applies its own floor).
    pub check_interval: Duration,
    /// Optional directory for rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Build settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| env_str(&lookup, key);

        let db_path = get("PETITIONER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/petitioner.db"));

        let profile = UserProfile {
            first_name: get("USER_FIRST_NAME").unwrap_or_default(),
            last_name: get("USER_LAST_NAME").unwrap_or_default(),
            email: get("USER_EMAIL").unwrap_or_default(),
            zip_code: get("USER_ZIP_CODE").unwrap_or_default(),
            phone: get("USER_PHONE").unwrap_or_default(),
            address: get("USER_ADDRESS").unwrap_or_default(),
            city: get("USER_CITY").unwrap_or_default(),
            state: get("USER_STATE").unwrap_or_default(),
        };

        let interval_minutes: u64 = parse_or(
            &lookup,
            "EMAIL_CHECK_INTERVAL_MINUTES",
            DEFAULT_INTERVAL_MINUTES,
        )?;

        let stale_minutes: u64 = parse_or(
            &lookup,
            "SIGNING_STALE_CLAIM_MINUTES",
            DEFAULT_STALE_CLAIM_MINUTES,
        )?;
        let stale_secs = stale_minutes
            .checked_mul(60)
            .filter(|_| stale_minutes <= MAX_STALE_CLAIM_MINUTES)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "SIGNING_STALE_CLAIM_MINUTES".into(),
                message: format!("must be at most {MAX_STALE_CLAIM_MINUTES}"),
            })?;

        let signing = SigningConfig {
            automation_enabled: parse_bool(get("AUTOMATION_ENABLED").as_deref(), false),
            batch_size: parse_or(&lookup, "SIGNING_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            stale_claim_after: Duration::from_secs(stale_secs),
        };

        if signing.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SIGNING_BATCH_SIZE".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            db_path,
            mailbox: MailboxConfig::from_lookup(&lookup)?,
            profile,
            signing,
            check_interval: Duration::from_secs(interval_minutes.saturating_mul(60)),
            log_dir: get("PETITIONER_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Trimmed, non-empty value for `key`.
pub(crate) fn env_str<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse `key` as `T`, falling back to `default` when unset.
pub(crate) fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env_str(lookup, key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

/// `1`, `true`, `yes` (any case) are true; anything else set is false.
pub(crate) fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        None => default,
    }
}
