/// Background coordinator configuration
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoordinatorConfig {
    /// Wait after a frame finishes loading before injecting (redirects settle)
    pub settle_delay_ms: u64,
    /// Wait before the single retry of an access-denied injection
    pub retry_backoff_ms: u64,
    /// chrome.storage.local key holding the workspace document
    pub storage_key: String,
    /// Extension page shown when one of our pages fails to load
    pub fallback_page: String,
    /// Extension page opened by the toolbar action
    pub dashboard_path: String,
    pub log_level: String,
}

impl CoordinatorConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Parsed log level, `Info` when unrecognized
    pub fn level(&self) -> log::Level {
        self.log_level.parse().unwrap_or(log::Level::Info)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            settle_delay_ms: 500,
            retry_backoff_ms: 1000,
            storage_key: "workspaces".to_string(),
            fallback_page: "404.html".to_string(),
            dashboard_path: "dist/browser/index.html".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();

        assert_eq!(config.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.retry_backoff(), Duration::from_millis(1000));
        assert_eq!(config.storage_key, "workspaces");
        assert_eq!(config.level(), log::Level::Info);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{"settleDelayMs": 250, "logLevel": "debug"}"#).unwrap();

        assert_eq!(config.settle_delay_ms, 250);
        assert_eq!(config.retry_backoff_ms, 1000);
        assert_eq!(config.level(), log::Level::Debug);
        assert_eq!(config.fallback_page, "404.html");
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let config = CoordinatorConfig {
            log_level: "chatty".to_string(),
            ..CoordinatorConfig::default()
        };

        assert_eq!(config.level(), log::Level::Info);
    }
}
