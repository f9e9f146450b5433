use std::{env, ops::Range, str::FromStr, time::Duration};

use crate::error::{Result, ServiceError};

/// Simulated latency windows for the two scan depths
#[derive(Debug, Clone, PartialEq)]
pub struct ScanDelays {
    pub fast: Range<Duration>,
    pub full: Range<Duration>,
}

impl Default for ScanDelays {
    fn default() -> Self {
        Self {
            fast: Duration::from_millis(5_000)..Duration::from_millis(10_000),
            full: Duration::from_millis(60_000)..Duration::from_millis(120_000),
        }
    }
}

impl ScanDelays {
    /// No waiting at all; used by tests and local demos.
    pub fn none() -> Self {
        Self {
            fast: Duration::ZERO..Duration::ZERO,
            full: Duration::ZERO..Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub scan_delays: ScanDelays,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ScanDelays::default();

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "PORT", 8084u16)?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let fast = delay_window(&lookup, "FAST_SCAN", &defaults.fast)?;
        let full = delay_window(&lookup, "FULL_SCAN", &defaults.full)?;

        Ok(Self {
            host,
            port,
            database_url,
            scan_delays: ScanDelays { fast, full },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ServiceError::Config(format!("{key} has invalid value '{raw}'"))),
        None => Ok(default),
    }
}

fn delay_window<F>(lookup: &F, prefix: &str, default: &Range<Duration>) -> Result<Range<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    let min_key = format!("{prefix}_MIN_MS");
    let max_key = format!("{prefix}_MAX_MS");
    let min = parse_or(lookup, &min_key, default.start.as_millis() as u64)?;
    let max = parse_or(lookup, &max_key, default.end.as_millis() as u64)?;

    if max < min {
        return Err(ServiceError::Config(format!(
            "{max_key} ({max}) must not be below {min_key} ({min})"
        )));
    }

    Ok(Duration::from_millis(min)..Duration::from_millis(max))
}
