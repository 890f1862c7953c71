use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty console output, plain-text files.
    Pretty,
    /// JSON lines everywhere.
    Json,
}

/// Logging settings derived from `ENVIRONMENT`, `LOG_LEVEL` and `LOG_DIR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub environment: String,
    pub level: String,
    pub directory: String,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var("ENVIRONMENT").ok(),
            std::env::var("LOG_LEVEL").ok(),
            std::env::var("LOG_DIR").ok(),
        )
    }

    fn resolve(environment: Option<String>, level: Option<String>, directory: Option<String>) -> Self {
        let environment = environment.unwrap_or_else(|| "development".to_string());
        let is_production = environment == "production";

        Self {
            level: level.unwrap_or_else(|| if is_production { "info" } else { "debug" }.to_string()),
            directory: directory.unwrap_or_else(|| "logs".to_string()),
            format: if is_production {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            environment,
        }
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn default_filter(&self) -> String {
        format!(
            "review_cms={},tower_http=debug,axum=debug,sqlx=warn",
            self.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_defaults() {
        let config = LogConfig::resolve(None, None, None);
        assert_eq!(config.environment, "development");
        assert_eq!(config.level, "debug");
        assert_eq!(config.directory, "logs");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_production_uses_json_and_info() {
        let config = LogConfig::resolve(Some("production".into()), None, Some("/var/log/cms".into()));
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.directory, "/var/log/cms");
        assert!(config.default_filter().starts_with("review_cms=info"));
    }

    #[test]
    fn test_explicit_level_wins() {
        let config = LogConfig::resolve(Some("production".into()), Some("trace".into()), None);
        assert_eq!(config.level, "trace");
    }
}
