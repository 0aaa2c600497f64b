//! Environment-driven runtime settings. Every value has a default so the
//! server starts with no configuration at all.

use std::time::Duration;

use tracing::warn;
use url::Url;

use super::deadline::{DEFAULT_WARNING_HORIZON_DAYS, UrgentRank};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub warning_horizon_days: i64,
    pub overdue_sweep_interval: Duration,
    pub upcoming_sweep_interval: Duration,
    pub mail_gateway_url: Option<Url>,
    pub urgent_rank: UrgentRank,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:girder.db".to_string(),
            bind_addr: "127.0.0.1:3001".to_string(),
            warning_horizon_days: DEFAULT_WARNING_HORIZON_DAYS,
            overdue_sweep_interval: Duration::from_secs(60 * 60),
            upcoming_sweep_interval: Duration::from_secs(6 * 60 * 60),
            mail_gateway_url: None,
            urgent_rank: UrgentRank::AboveHigh,
        }
    }
}

impl Config {
    /// Read settings from the environment. Unparseable values fall back to
    /// the default with a warning rather than failing startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("GIRDER_DATABASE_URL") {
            config.database_url = value;
        }
        if let Ok(value) = std::env::var("GIRDER_BIND_ADDR") {
            config.bind_addr = value;
        }
        if let Some(days) = parse_env::<i64>("GIRDER_WARNING_HORIZON_DAYS") {
            config.warning_horizon_days = days;
        }
        if let Some(secs) = parse_env::<u64>("GIRDER_OVERDUE_SWEEP_SECS") {
            config.overdue_sweep_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env::<u64>("GIRDER_UPCOMING_SWEEP_SECS") {
            config.upcoming_sweep_interval = Duration::from_secs(secs);
        }
        if let Ok(value) = std::env::var("GIRDER_MAIL_GATEWAY_URL") {
            match value.parse::<Url>() {
                Ok(url) => config.mail_gateway_url = Some(url),
                Err(_) => warn!("invalid GIRDER_MAIL_GATEWAY_URL '{}', mail disabled", value),
            }
        }
        if let Ok(value) = std::env::var("GIRDER_URGENT_RANKS_WITH_HIGH") {
            if value == "1" || value.eq_ignore_ascii_case("true") {
                config.urgent_rank = UrgentRank::WithHigh;
            }
        }

        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("invalid {} '{}', using default", name, value);
            None
        }
    }
}
