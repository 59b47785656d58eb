use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_IDLE_MESSAGE: &str = "Welcome";
pub const DEFAULT_REJECTION_HOLD: Duration = Duration::from_secs(5);
pub const DEFAULT_BLINK_ON: Duration = Duration::from_secs(5);
pub const DEFAULT_BLINK_OFF: Duration = Duration::from_secs(10);

/// Runtime settings of the controller and its idle blinker.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Shown when no credit is left.
    pub idle_message: String,
    /// How long "Invalid coin!" stays before the credit is shown again.
    /// Zero shows the credit immediately.
    pub rejection_hold: Duration,
    pub blink_enabled: bool,
    pub blink_on: Duration,
    pub blink_off: Duration,
    pub event_log: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            idle_message: DEFAULT_IDLE_MESSAGE.to_string(),
            rejection_hold: DEFAULT_REJECTION_HOLD,
            blink_enabled: true,
            blink_on: DEFAULT_BLINK_ON,
            blink_off: DEFAULT_BLINK_OFF,
            event_log: None,
        }
    }
}

impl ControllerConfig {
    /// Defaults overridden by `VEND_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(ms) = parse::<u64>(&lookup, "VEND_REJECTION_HOLD_MS") {
            config.rejection_hold = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "VEND_BLINK_ON_MS") {
            config.blink_on = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&lookup, "VEND_BLINK_OFF_MS") {
            config.blink_off = Duration::from_millis(ms);
        }
        if let Some(flag) = parse::<u8>(&lookup, "VEND_BLINK") {
            config.blink_enabled = flag != 0;
        }
        if let Some(message) = lookup("VEND_IDLE_MESSAGE") {
            config.idle_message = message;
        }
        config.event_log = lookup("VEND_EVENT_LOG").map(PathBuf::from);
        config
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ControllerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let config = config_from(&[]);
        assert_eq!(config.idle_message, "Welcome");
        assert_eq!(config.rejection_hold, Duration::from_secs(5));
        assert!(config.blink_enabled);
        assert!(config.event_log.is_none());
    }

    #[test]
    fn env_overrides() {
        let config = config_from(&[
            ("VEND_REJECTION_HOLD_MS", "0"),
            ("VEND_BLINK", "0"),
            ("VEND_BLINK_ON_MS", "250"),
            ("VEND_IDLE_MESSAGE", "Hi"),
            ("VEND_EVENT_LOG", "/tmp/vend.log"),
        ]);
        assert_eq!(config.rejection_hold, Duration::ZERO);
        assert!(!config.blink_enabled);
        assert_eq!(config.blink_on, Duration::from_millis(250));
        assert_eq!(config.idle_message, "Hi");
        assert_eq!(config.event_log, Some(PathBuf::from("/tmp/vend.log")));
    }

    #[test]
    fn unparseable_values_keep_defaults() {
        let config = config_from(&[("VEND_REJECTION_HOLD_MS", "soon")]);
        assert_eq!(config.rejection_hold, DEFAULT_REJECTION_HOLD);
    }
}
