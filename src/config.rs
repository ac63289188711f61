use std::env;
use std::time::Duration;

use crate::engine::lifecycle::LifecycleSettings;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub collaborator_timeout_ms: u64,
    pub default_booking_duration_minutes: u32,
    pub notification_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            collaborator_timeout_ms: parse_or_default("COLLABORATOR_TIMEOUT_MS", 5000)?,
            default_booking_duration_minutes: parse_or_default(
                "DEFAULT_BOOKING_DURATION_MINUTES",
                120,
            )?,
            notification_buffer_size: parse_or_default("NOTIFICATION_BUFFER_SIZE", 1024)?,
        };

        if config.collaborator_timeout_ms == 0 {
            return Err(AppError::Internal(
                "invalid COLLABORATOR_TIMEOUT_MS: must be > 0".to_string(),
            ));
        }
        if config.default_booking_duration_minutes == 0 {
            return Err(AppError::Internal(
                "invalid DEFAULT_BOOKING_DURATION_MINUTES: must be > 0".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            call_timeout: Duration::from_millis(self.collaborator_timeout_ms),
            default_duration_minutes: self.default_booking_duration_minutes,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
