// src/config.rs

use std::env;
use dotenvy::dotenv;

use crate::engine::policy::UnlockMode;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub port: u16,
    /// Shared secret expected in the `X-Admin-API-Key` header.
    pub admin_api_key: String,
    pub unlock_mode: UnlockMode,
    /// Minimum `correct / total` ratio a completion needs before it unlocks anything.
    /// `None` unlocks unconditionally.
    pub unlock_min_accuracy: Option<f64>,
    pub max_prerequisites: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/paths.db".to_string());

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(37123);

        let admin_api_key = env::var("ADMIN_API_KEY")
            .expect("ADMIN_API_KEY must be set");

        let unlock_mode = env::var("UNLOCK_MODE")
            .map(|mode| mode.parse().expect("UNLOCK_MODE must be 'explicit' or 'derived'"))
            .unwrap_or_default();

        let unlock_min_accuracy = env::var("UNLOCK_MIN_ACCURACY").ok().map(|raw| {
            let ratio: f64 = raw
                .parse()
                .expect("UNLOCK_MIN_ACCURACY must be a number between 0 and 1");
            assert!(
                (0.0..=1.0).contains(&ratio),
                "UNLOCK_MIN_ACCURACY must be between 0 and 1"
            );
            ratio
        });

        let max_prerequisites = env::var("MAX_PREREQUISITES")
            .ok()
            .and_then(|n| n.parse().ok())
            .unwrap_or(1);

        Self {
            database_url,
            rust_log,
            port,
            admin_api_key,
            unlock_mode,
            unlock_min_accuracy,
            max_prerequisites,
        }
    }
}
