//! Process settings loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Daemon settings. Everything about sensors themselves lives in the JSON
/// configuration files these settings point at.
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub default_config_path: PathBuf,
    pub sensors_config_path: PathBuf,
    /// Overrides `database.url` from the defaults file.
    pub database_url: Option<String>,
    /// Time between reconciliation cycle starts.
    pub reconcile_interval: Duration,
    /// How often config file modification times are checked.
    pub config_poll_interval: Duration,
    /// Upper bound on one sensor's forecast; `None` disables the bound.
    pub forecast_fit_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
}

impl DaemonSettings {
    /// Load settings from environment variables with defaults.
    ///
    /// | Env Var                     | Default                |
    /// |-----------------------------|------------------------|
    /// | `DEFAULT_CONFIG_PATH`       | `default_config.json`  |
    /// | `SENSORS_CONFIG_PATH`       | `sensors_config.json`  |
    /// | `DATABASE_URL`              | unset                  |
    /// | `RECONCILE_INTERVAL_SECS`   | `1`                    |
    /// | `CONFIG_POLL_INTERVAL_MS`   | `500`                  |
    /// | `FORECAST_FIT_TIMEOUT_SECS` | `300` (`0` = no bound) |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `10`                   |
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |var: &str, default: &str| PathBuf::from(lookup(var).unwrap_or_else(|| default.into()));
        let number = |var: &'static str, default: u64| -> Result<u64, SettingsError> {
            match lookup(var) {
                None => Ok(default),
                Some(value) => value.trim().parse().map_err(|e: std::num::ParseIntError| {
                    SettingsError::Invalid {
                        var,
                        value,
                        reason: e.to_string(),
                    }
                }),
            }
        };

        let reconcile_secs = number("RECONCILE_INTERVAL_SECS", 1)?;
        if reconcile_secs == 0 {
            return Err(SettingsError::Invalid {
                var: "RECONCILE_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        let poll_ms = number("CONFIG_POLL_INTERVAL_MS", 500)?.max(10);
        let fit_timeout_secs = number("FORECAST_FIT_TIMEOUT_SECS", 300)?;

        Ok(Self {
            default_config_path: path("DEFAULT_CONFIG_PATH", "default_config.json"),
            sensors_config_path: path("SENSORS_CONFIG_PATH", "sensors_config.json"),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            reconcile_interval: Duration::from_secs(reconcile_secs),
            config_poll_interval: Duration::from_millis(poll_ms),
            forecast_fit_timeout: (fit_timeout_secs > 0).then(|| Duration::from_secs(fit_timeout_secs)),
            shutdown_timeout: Duration::from_secs(number("SHUTDOWN_TIMEOUT_SECS", 10)?),
        })
    }
}
