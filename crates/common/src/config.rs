use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Lookback, PollInterval, Result};

/// All configuration loaded from environment variables at startup.
/// Only the lookback and poll interval are validated; the rest is opaque.
#[derive(Debug, Clone)]
pub struct Config {
    // Monitoring
    pub symbols: Vec<String>,
    pub poll_interval: PollInterval,
    pub lookback: Lookback,

    // Market data
    pub intraday_window_days: i64,
    pub daily_window_days: i64,
    pub fetch_timeout: Duration,

    // Telegram
    pub telegram_token: Option<String>,
    pub telegram_chat_ids: Vec<i64>,
    pub notifications_enabled: bool,
    pub notify_timeout: Duration,

    // Start gate
    pub autostart: bool,

    // Dashboard
    pub dashboard_port: u16,
    pub dashboard_token: Option<String>,

    // Pairings file path; built-in pairings when unset
    pub pairings_path: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_source<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let symbols: Vec<String> = get("SYMBOLS")
            .unwrap_or_else(|| "BTCUSDT".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return Err(Error::Config("SYMBOLS must name at least one symbol".into()));
        }

        let poll_secs: u64 = parse_or(&get, "POLL_INTERVAL_SECS", 10)?;
        let poll_interval = PollInterval::new(Duration::from_secs(poll_secs))
            .map_err(|_| Error::Config("POLL_INTERVAL_SECS must be > 0".into()))?;

        let lookback: usize = parse_or(&get, "STRUCTURE_LOOKBACK", 3)?;
        let lookback = Lookback::new(lookback)
            .map_err(|_| Error::Config("STRUCTURE_LOOKBACK must be >= 1".into()))?;

        let telegram_token = get("TELEGRAM_TOKEN").filter(|t| !t.trim().is_empty());

        let telegram_chat_ids = match get("TELEGRAM_CHAT_IDS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i64>().map_err(|_| {
                        Error::Config(format!("TELEGRAM_CHAT_IDS contains non-numeric ID: '{s}'"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let notifications_enabled =
            parse_or(&get, "NOTIFICATIONS_ENABLED", telegram_token.is_some())?;

        Ok(Config {
            symbols,
            poll_interval,
            lookback,
            intraday_window_days: parse_or(&get, "INTRADAY_WINDOW_DAYS", 5)?,
            daily_window_days: parse_or(&get, "DAILY_WINDOW_DAYS", 365)?,
            fetch_timeout: Duration::from_secs(parse_or(&get, "FETCH_TIMEOUT_SECS", 10)?),
            telegram_token,
            telegram_chat_ids,
            notifications_enabled,
            notify_timeout: Duration::from_secs(parse_or(&get, "NOTIFY_TIMEOUT_SECS", 5)?),
            autostart: parse_or(&get, "AUTOSTART", true)?,
            dashboard_port: parse_or(&get, "DASHBOARD_PORT", 8080)?,
            dashboard_token: get("DASHBOARD_TOKEN").filter(|t| !t.trim().is_empty()),
            pairings_path: get("PAIRINGS_PATH").filter(|p| !p.trim().is_empty()),
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{raw}'"))),
        None => Ok(default),
    }
}
