//! Process configuration, read from the environment once at startup.

use std::env;
use std::time::Duration;

use crate::error::BazaarError;

/// Broker and result backend share one Redis by default, same as the
/// deployment this replaces.
const DEFAULT_REDIS_URL: &str = "redis://redis:6379/0";

const DEFAULT_WORKER_COUNT: usize = 4;

/// Retry budget for the startup readiness gate.
#[derive(Debug, Clone)]
pub struct ReadinessSettings {
    /// Total attempts before startup aborts.
    pub max_attempts: u32,

    /// Fixed sleep between attempts.
    pub backoff: Duration,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Everything the process needs from its environment. Built once, then
/// shared read-only through the runtime context.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub broker_url: String,
    pub result_backend_url: String,
    pub secret_key: String,
    pub worker_count: usize,
    pub readiness: ReadinessSettings,
}

impl Settings {
    /// Read settings from the environment.
    ///
    /// `DATABASE_URI` and `SECRET_KEY` are required; the rest fall back to
    /// the defaults above.
    pub fn from_env() -> Result<Self, BazaarError> {
        let database_url = required("DATABASE_URI")?;
        let secret_key = required("SECRET_KEY")?;
        let broker_url =
            env::var("BROKER_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());
        let result_backend_url =
            env::var("RESULT_BACKEND_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());
        let worker_count = parsed("WORKER_COUNT", DEFAULT_WORKER_COUNT)?;

        let defaults = ReadinessSettings::default();
        let readiness = ReadinessSettings {
            max_attempts: parsed("READINESS_MAX_ATTEMPTS", defaults.max_attempts)?,
            backoff: Duration::from_secs(parsed(
                "READINESS_BACKOFF_SECS",
                defaults.backoff.as_secs(),
            )?),
        };

        Ok(Self {
            database_url,
            broker_url,
            result_backend_url,
            secret_key,
            worker_count,
            readiness,
        })
    }

    /// Canned settings for local demos and tests: no environment required,
    /// no real endpoints implied.
    pub fn local() -> Self {
        Self {
            database_url: "postgres://localhost/bazaar".to_string(),
            broker_url: DEFAULT_REDIS_URL.to_string(),
            result_backend_url: DEFAULT_REDIS_URL.to_string(),
            secret_key: "local-dev-secret".to_string(),
            worker_count: 2,
            readiness: ReadinessSettings {
                max_attempts: 3,
                backoff: Duration::from_millis(100),
            },
        }
    }
}

fn required(key: &str) -> Result<String, BazaarError> {
    env::var(key).map_err(|_| BazaarError::Config(format!("{key} must be set")))
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, BazaarError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| BazaarError::Config(format!("{key} must be an integer, got '{raw}'"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_settings_carry_sane_defaults() {
        let settings = Settings::local();
        assert_eq!(settings.worker_count, 2);
        assert_eq!(settings.readiness.max_attempts, 3);
        assert_eq!(settings.broker_url, settings.result_backend_url);
    }

    #[test]
    fn readiness_defaults_match_deployment() {
        let readiness = ReadinessSettings::default();
        assert_eq!(readiness.max_attempts, 5);
        assert_eq!(readiness.backoff, Duration::from_secs(5));
    }
}
