//! Runtime configuration loaded from environment variables.
//!
//! The config is read once at startup and handed to `AppState`; handlers read it
//! from there rather than from the environment.

use std::env;

pub const DEFAULT_CHECKIN_BASE_URL: &str = "http://your-attendance-server.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_filter: String,
    pub checkin_base_url: String,
    pub session_ttl_minutes: i64,
    pub enforce_session_expiry: bool,
    pub sample_roster: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "attendd=info".to_string(),
            checkin_base_url: DEFAULT_CHECKIN_BASE_URL.to_string(),
            session_ttl_minutes: 60,
            enforce_session_expiry: false,
            sample_roster: true,
        }
    }
}

impl AppConfig {
    /// Reads `ATTENDD_*` variables. Missing or unparsable values keep their default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_filter: env::var("ATTENDD_LOG").unwrap_or(defaults.log_filter),
            checkin_base_url: env::var("ATTENDD_CHECKIN_BASE_URL")
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.checkin_base_url),
            session_ttl_minutes: env::var("ATTENDD_SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| (1..=i64::from(i32::MAX)).contains(v))
                .unwrap_or(defaults.session_ttl_minutes),
            enforce_session_expiry: env::var("ATTENDD_ENFORCE_SESSION_EXPIRY")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.enforce_session_expiry),
            sample_roster: env::var("ATTENDD_SAMPLE_ROSTER")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.sample_roster),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
