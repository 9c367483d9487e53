use chrono::Duration;
use rusqlite::Connection;
use serde::Deserialize;

use crate::config::AppConfig;
use crate::sessions::SessionRegistry;
use crate::{db, roster};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything one instructor works with during a run. Handlers get it by `&mut`.
pub struct AppState {
    pub config: AppConfig,
    pub db: Connection,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db = db::open_db()?;
        if config.sample_roster {
            roster::ensure_sample(&db)?;
        }
        let sessions = SessionRegistry::new(
            Duration::minutes(config.session_ttl_minutes),
            config.enforce_session_expiry,
        );
        Ok(Self {
            config,
            db,
            sessions,
        })
    }
}
