use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Where and how verbosely to log
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub production: bool,
    pub level: LogLevel,
    pub dir: String,
}

impl LogSettings {
    /// `ENVIRONMENT`, `LOG_LEVEL` and `LOG_DIR`. Production defaults to
    /// `info`, everything else to `debug`.
    pub fn from_env() -> Self {
        let production = std::env::var("ENVIRONMENT").is_ok_and(|e| e == "production");
        let default_level = if production {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };
        let level = std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default_level);

        Self {
            production,
            level,
            dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        }
    }

    /// Directive used when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> String {
        format!(
            "cms_backend={},tower_http=debug,axum=debug,sqlx=warn",
            self.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_default_directive_targets_crate() {
        let settings = LogSettings {
            production: false,
            level: LogLevel::Info,
            dir: "logs".to_string(),
        };
        assert!(settings.default_directive().starts_with("cms_backend=info"));
    }
}
