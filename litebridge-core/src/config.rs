//! Bridge configuration
//!
//! Passed once at load time as a JSON object. Every field is optional.
//!
//! ```rust
//! use litebridge_core::BridgeConfig;
//!
//! let config = BridgeConfig::from_json(r#"{"log_level": "debug", "critical_pinning": true}"#).unwrap();
//! assert!(config.critical_pinning);
//! assert_eq!(config.thread_name_prefix, "LiteBridge");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::logging::LogLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Diagnostic level for the bridge's own stderr output
    pub log_level: String,
    /// Threads attached by the bridge are named `<prefix>-<label>`
    pub thread_name_prefix: String,
    /// Use the critical (no other runtime calls) path when pinning byte arrays
    pub critical_pinning: bool,
    /// Track handles and poison them on release
    pub poison_handles: bool,
    /// Must stay `true`: a subsystem either resolves completely or not at all
    pub strict_symbols: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warn.as_str().to_string(),
            thread_name_prefix: "LiteBridge".to_string(),
            critical_pinning: false,
            poison_handles: cfg!(debug_assertions),
            strict_symbols: true,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_level().is_none() {
            return Err(BridgeError::Config(format!(
                "invalid log_level '{}'. Must be one of: ERROR, WARN, INFO, DEBUG, TRACE",
                self.log_level
            )));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(BridgeError::Config("thread_name_prefix must not be empty".into()));
        }
        if !self.strict_symbols {
            return Err(BridgeError::Config(
                "strict_symbols=false is not supported: partial symbol resolution is never allowed".into(),
            ));
        }
        Ok(())
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        LogLevel::from_str(&self.log_level)
    }

    pub fn thread_name(&self, label: &str) -> String {
        format!("{}-{}", self.thread_name_prefix, label)
    }
}
