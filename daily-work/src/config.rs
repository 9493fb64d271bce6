//! Auto-save engine configuration

use std::time::Duration;

/// Quiet period after the last edit before an auto-save fires
pub const DEFAULT_FLUSH_DELAY_MS: u64 = 3_000;
/// How long after a keystroke the user still counts as typing
pub const DEFAULT_TYPING_GRACE_MS: u64 = 5_000;
/// Fixed delay between retries of a failed save
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
/// Retries per save after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Consecutive failures after which auto-save stops
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 3;
/// How long `saved` stays visible before reverting to `idle`
pub const SAVED_STATUS_MS: u64 = 3_000;
/// How long `error` stays visible before reverting to `idle`
pub const ERROR_STATUS_MS: u64 = 5_000;

/// Engine timings and retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSaveConfig {
    pub flush_delay: Duration,
    pub typing_grace: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub max_consecutive_errors: u32,
    pub saved_status: Duration,
    pub error_status: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            flush_delay: Duration::from_millis(DEFAULT_FLUSH_DELAY_MS),
            typing_grace: Duration::from_millis(DEFAULT_TYPING_GRACE_MS),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            saved_status: Duration::from_millis(SAVED_STATUS_MS),
            error_status: Duration::from_millis(ERROR_STATUS_MS),
        }
    }
}

impl AutoSaveConfig {
    /// Read overrides from `DAILY_WORK_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, default: u64| {
            Duration::from_millis(lookup(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default))
        };
        let count = |key: &str, default: u32| {
            lookup(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        };

        Self {
            flush_delay: millis("DAILY_WORK_FLUSH_MS", DEFAULT_FLUSH_DELAY_MS),
            typing_grace: millis("DAILY_WORK_TYPING_MS", DEFAULT_TYPING_GRACE_MS),
            retry_delay: millis("DAILY_WORK_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS),
            max_retries: count("DAILY_WORK_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            max_consecutive_errors: count(
                "DAILY_WORK_MAX_CONSECUTIVE_ERRORS",
                DEFAULT_MAX_CONSECUTIVE_ERRORS,
            )
            .max(1),
            ..Default::default()
        }
    }
}
