//! Tracing subscriber setup driven by `AVRO_FORMAT_LOG_LEVEL`

use crate::{AvroFormatError, Result};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the default log level
pub const LOG_LEVEL_ENV: &str = "AVRO_FORMAT_LOG_LEVEL";

/// Severity levels accepted in `AVRO_FORMAT_LOG_LEVEL`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = AvroFormatError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => {
                return Err(AvroFormatError::invalid_argument(format!(
                    "Invalid log level: {}",
                    s
                )))
            }
        })
    }
}

impl LogLevel {
    /// Level from the environment; unset or unparseable values give `Warn`
    pub fn from_env() -> Self {
        std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Install a fmt subscriber at the environment's level.
///
/// `RUST_LOG` directives take precedence when set. Calling this more than
/// once, or after another subscriber was installed, is a no-op.
pub fn init() {
    let level = LogLevel::from_env();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level.as_filter().into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
