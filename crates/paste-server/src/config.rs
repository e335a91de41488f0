use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub db_pool_size: usize,
    pub db_busy_timeout: Duration,
    pub public_url: Option<String>,
    pub max_body_bytes: usize,
    /// Zero disables the sweep.
    pub cleanup_interval_secs: u64,
    pub test_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: get("PASTE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&lookup, "PASTE_PORT", 5000)?,
            db_path: get("PASTE_DB_PATH").unwrap_or_else(|| "pastes.db".into()).into(),
            db_pool_size: parse(&lookup, "PASTE_DB_POOL_SIZE", 4)?,
            db_busy_timeout: Duration::from_millis(parse(&lookup, "PASTE_DB_BUSY_TIMEOUT_MS", 5000)?),
            public_url: get("PASTE_PUBLIC_URL"),
            max_body_bytes: parse(&lookup, "PASTE_MAX_BODY_BYTES", 1024 * 1024)?,
            cleanup_interval_secs: parse(&lookup, "PASTE_CLEANUP_INTERVAL_SECS", 3600)?,
            test_mode: get("TEST_MODE").is_some_and(|v| v.trim() == "1"),
        })
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}
