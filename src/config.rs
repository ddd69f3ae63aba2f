use crate::domain::value_objects::NotFoundRedirect;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Status endpoint
    pub status_addr: String,
    /// Publish the full sorted route-rate list, not just the top ten
    pub expose_all_apps: bool,

    // Request routing
    pub notfound_redirect: Option<String>,

    // Active-app tracking
    pub enable_nonprod_apps: bool,
    pub flush_apps_interval_secs: u64,

    // Sweepers
    pub max_age_stale_secs: u64,
    pub check_interval_secs: u64,
    pub rps_interval_secs: u64,

    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            status_addr: "0.0.0.0:8082".to_string(),
            expose_all_apps: false,
            notfound_redirect: None,
            enable_nonprod_apps: false,
            flush_apps_interval_secs: 30,
            max_age_stale_secs: 120,
            check_interval_secs: 30,
            rps_interval_secs: 10,
            debug: false,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("404 redirect target must not be empty")]
    EmptyRedirect,
}

impl Config {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("flush_apps_interval_secs", self.flush_apps_interval_secs),
            ("max_age_stale_secs", self.max_age_stale_secs),
            ("check_interval_secs", self.check_interval_secs),
            ("rps_interval_secs", self.rps_interval_secs),
        ];
        for (name, secs) in durations {
            if secs == 0 {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        if matches!(self.notfound_redirect.as_deref(), Some(url) if url.trim().is_empty()) {
            return Err(ConfigError::EmptyRedirect);
        }
        Ok(())
    }

    /// The fixed 404 redirect response, if one is configured.
    pub fn notfound_redirect(&self) -> Option<NotFoundRedirect> {
        self.notfound_redirect.as_deref().map(NotFoundRedirect::new)
    }

    pub fn flush_apps_interval(&self) -> Duration {
        Duration::from_secs(self.flush_apps_interval_secs)
    }

    pub fn max_age_stale(&self) -> Duration {
        Duration::from_secs(self.max_age_stale_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn rps_interval(&self) -> Duration {
        Duration::from_secs(self.rps_interval_secs)
    }
}

/// Load configuration from the process environment.
pub fn load_config() -> anyhow::Result<Config> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_config_from<F>(var: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let flag = |key: &str| {
        var(key)
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false)
    };
    let secs = |key: &str, default: u64| {
        var(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    };

    let status_addr = var("ROUTER_STATUS_ADDR").unwrap_or(defaults.status_addr);

    let expose_all_apps = flag("ROUTER_STATUS_EXPOSE_ALL_APPS");

    let notfound_redirect = var("ROUTER_404_REDIRECT");

    let enable_nonprod_apps = flag("ROUTER_ENABLE_NONPROD_APPS");

    let flush_apps_interval_secs = secs(
        "ROUTER_FLUSH_APPS_INTERVAL_SECS",
        defaults.flush_apps_interval_secs,
    );

    let max_age_stale_secs = secs("ROUTER_MAX_AGE_STALE_SECS", defaults.max_age_stale_secs);

    let check_interval_secs = secs("ROUTER_CHECK_INTERVAL_SECS", defaults.check_interval_secs);

    let rps_interval_secs = secs("ROUTER_RPS_INTERVAL_SECS", defaults.rps_interval_secs);

    let debug = var("DEBUG").is_some();

    let cfg = Config {
        status_addr,
        expose_all_apps,
        notfound_redirect,
        enable_nonprod_apps,
        flush_apps_interval_secs,
        max_age_stale_secs,
        check_interval_secs,
        rps_interval_secs,
        debug,
    };
    cfg.validate()?;
    Ok(cfg)
}
