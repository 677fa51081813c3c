use serde::{Deserialize, Serialize};
use std::io::IsTerminal;

use crate::logger::{
    error::LoggerResult,
    object::{LoggerFormat, LoggerLevel, LoggerTimeZone},
};

/// Environment variable holding the filter expression.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Environment variable selecting `text`, `json` or `journald`.
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
/// Environment variable selecting `utc` or `local` timestamps.
pub const ENV_LOG_TZ: &str = "LOG_TZ";
/// Any non-empty value disables colors (<https://no-color.org>).
pub const ENV_NO_COLOR: &str = "NO_COLOR";

/// Logger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Output format.
    pub format: LoggerFormat,
    /// Filter expression (e.g. `"info"`, `"sbx_core=debug,info"`).
    pub level: LoggerLevel,
    /// Zone for timestamps.
    pub tz: LoggerTimeZone,
    /// Include module/target names in output.
    pub with_targets: bool,
    /// Colored output; only honored on a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Load from `LOG_LEVEL`, `LOG_FORMAT`, `LOG_TZ` and `NO_COLOR`.
    pub fn from_env() -> LoggerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup; blank values are ignored.
    pub fn from_lookup<F>(lookup: F) -> LoggerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(level) = get(ENV_LOG_LEVEL) {
            cfg.level = level.parse()?;
        }
        if let Some(format) = get(ENV_LOG_FORMAT) {
            cfg.format = format.parse()?;
        }
        if let Some(tz) = get(ENV_LOG_TZ) {
            cfg.tz = tz.parse()?;
        }
        if get(ENV_NO_COLOR).is_some() {
            cfg.use_color = false;
        }
        Ok(cfg)
    }

    /// Color is used only when enabled and stdout is a terminal.
    ///
    /// Evaluated at logger initialization, not at config parsing.
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}
