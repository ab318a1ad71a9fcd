use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_SLOT_CAPACITY: u32 = 1;
pub const DEFAULT_DURATION_MINUTES: u32 = 60;
pub const DEFAULT_OVERBOOK_MARKER: &str = "[EXCEDENTE]";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration error: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Capacity used when no weekly window covers the requested interval
    pub default_slot_capacity: u32,
    /// Duration assumed for appointments stored without one
    pub default_duration_minutes: u32,
    /// Note marker flagging an appointment as a deliberate overbooking
    pub overbook_marker: String,
    /// Whether the capacity check runs on drop at all
    pub capacity_checks_enabled: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            default_slot_capacity: DEFAULT_SLOT_CAPACITY,
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
            overbook_marker: DEFAULT_OVERBOOK_MARKER.to_string(),
            capacity_checks_enabled: true,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            default_slot_capacity: parse_var("SCHEDULE_DEFAULT_SLOT_CAPACITY")
                .unwrap_or_else(|| {
                    warn!("SCHEDULE_DEFAULT_SLOT_CAPACITY not set, using {}", defaults.default_slot_capacity);
                    defaults.default_slot_capacity
                }),
            default_duration_minutes: parse_var("SCHEDULE_DEFAULT_DURATION_MINUTES")
                .unwrap_or_else(|| {
                    warn!("SCHEDULE_DEFAULT_DURATION_MINUTES not set, using {}", defaults.default_duration_minutes);
                    defaults.default_duration_minutes
                }),
            overbook_marker: env::var("SCHEDULE_OVERBOOK_MARKER")
                .ok()
                .filter(|marker| !marker.trim().is_empty())
                .unwrap_or_else(|| defaults.overbook_marker.clone()),
            capacity_checks_enabled: parse_var("SCHEDULE_CAPACITY_CHECKS")
                .unwrap_or(defaults.capacity_checks_enabled),
        };

        if let Err(e) = config.validate() {
            warn!("Scheduling configuration invalid ({}), falling back to defaults", e);
            return defaults;
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_slot_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SCHEDULE_DEFAULT_SLOT_CAPACITY".to_string(),
                value: "0".to_string(),
            });
        }
        if self.default_duration_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SCHEDULE_DEFAULT_DURATION_MINUTES".to_string(),
                value: "0".to_string(),
            });
        }
        if self.overbook_marker.trim().is_empty() {
            return Err(ConfigError::Invalid("overbook marker must not be blank".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{} has unparseable value '{}'", key, raw);
            None
        }
    }
}
