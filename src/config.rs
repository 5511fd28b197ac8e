use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::models::courier::GeoPoint;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// Base URL of the delivery API. `None` runs against the in-memory backend.
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub event_buffer_size: usize,
    pub map: MapConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct MapConfig {
    pub center: GeoPoint,
    pub jitter_degrees: f64,
    pub fit_padding_px: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: GeoPoint {
                lat: 40.4168,
                lng: -3.7038,
            },
            jitter_degrees: 0.05,
            fit_padding_px: 50,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let map_defaults = MapConfig::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_base_url: non_empty("API_BASE_URL"),
            api_token: non_empty("API_TOKEN"),
            request_timeout: Duration::from_millis(parse_or_default("REQUEST_TIMEOUT_MS", 10_000)?),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            map: MapConfig {
                center: GeoPoint {
                    lat: parse_or_default("MAP_CENTER_LAT", map_defaults.center.lat)?,
                    lng: parse_or_default("MAP_CENTER_LNG", map_defaults.center.lng)?,
                },
                jitter_degrees: parse_or_default(
                    "MAP_JITTER_DEGREES",
                    map_defaults.jitter_degrees,
                )?,
                fit_padding_px: parse_or_default(
                    "MAP_FIT_PADDING_PX",
                    map_defaults.fit_padding_px,
                )?,
            },
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
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
