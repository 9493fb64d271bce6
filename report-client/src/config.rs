//! Client configuration

use crate::{ClientError, ClientResult};

/// Default table holding daily reports
pub const DEFAULT_TABLE: &str = "cong_viec_viec_hang_ngay";

/// Client configuration for connecting to the hosted report table
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Project base URL (e.g., "https://project.example.co")
    pub base_url: String,

    /// Public API key, sent as the `apikey` header
    pub api_key: String,

    /// Session JWT; the API key is used as bearer token when absent
    pub token: Option<String>,

    /// Table name
    pub table: String,

    /// Request timeout in seconds
    pub timeout: u64,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            token: None,
            table: DEFAULT_TABLE.to_string(),
            timeout: 30,
        }
    }

    /// Read the configuration from `REPORT_STORE_*` environment variables
    pub fn from_env() -> ClientResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (environment, file, test map)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ClientResult<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ClientError::Config(format!("{key} must be set")))
        };

        let mut config = Self::new(required("REPORT_STORE_URL")?, required("REPORT_STORE_KEY")?);
        config.token = lookup("REPORT_STORE_TOKEN").filter(|v| !v.trim().is_empty());
        if let Some(table) = lookup("REPORT_STORE_TABLE").filter(|v| !v.trim().is_empty()) {
            config.table = table;
        }
        config.timeout = lookup("REPORT_STORE_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        Ok(config)
    }

    /// Set the JWT token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Create a REST store from this configuration
    pub fn build_rest_store(&self) -> ClientResult<crate::RestReportStore> {
        crate::RestReportStore::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("REPORT_STORE_URL", "https://db.example.co"),
            ("REPORT_STORE_KEY", "anon"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://db.example.co");
        assert_eq!(config.table, DEFAULT_TABLE);
        assert_eq!(config.timeout, 30);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_from_lookup_overrides_and_bad_timeout() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("REPORT_STORE_URL", "https://db.example.co"),
            ("REPORT_STORE_KEY", "anon"),
            ("REPORT_STORE_TOKEN", "jwt"),
            ("REPORT_STORE_TABLE", "reports"),
            ("REPORT_STORE_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap();
        assert_eq!(config.token.as_deref(), Some("jwt"));
        assert_eq!(config.table, "reports");
        assert_eq!(config.timeout, 30);
    }

    #[test]
    fn test_missing_required_value_is_config_error() {
        let err = ClientConfig::from_lookup(lookup(&[("REPORT_STORE_URL", "https://db")]))
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(msg) if msg.contains("REPORT_STORE_KEY")));
    }
}
