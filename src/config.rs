use crate::temporal::{self, DEFAULT_UTC_OFFSET_HOURS};
use anyhow::{Context, Result};
use chrono::FixedOffset;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Reference time zone, hours east of UTC
    pub utc_offset_hours: i32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("RENTAL_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("RENTAL_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("RENTAL_PORT must be a valid u16")?;

        let db_path = PathBuf::from(
            env::var("RENTAL_DB_PATH").unwrap_or_else(|_| "rental.db".to_string()),
        );

        let utc_offset_hours = env::var("RENTAL_UTC_OFFSET_HOURS")
            .unwrap_or_else(|_| DEFAULT_UTC_OFFSET_HOURS.to_string())
            .parse::<i32>()
            .context("RENTAL_UTC_OFFSET_HOURS must be a whole number of hours")?;
        if temporal::reference_zone(utc_offset_hours).is_none() {
            anyhow::bail!("RENTAL_UTC_OFFSET_HOURS must be between -23 and 23");
        }

        Ok(Self {
            host,
            port,
            db_path,
            utc_offset_hours,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn zone(&self) -> FixedOffset {
        temporal::reference_zone(self.utc_offset_hours).unwrap_or_else(temporal::default_zone)
    }
}
