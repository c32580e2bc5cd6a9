use crate::services::install::PollerSettings;
use anyhow::{Context, Result};
use std::{env, str::FromStr, sync::OnceLock, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Feeder backend API configuration
    pub api: ApiConfig,

    /// Reverse geocoding configuration
    pub geocoder: GeocoderConfig,

    /// Tailscale install polling configuration
    pub install: PollerSettings,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct GeocoderConfig {
    pub url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// Returns a reference to the cached configuration. On first call, it loads
    /// and validates all configuration from environment variables.
    ///
    /// # Panics
    /// Panics if configuration loading fails. The client cannot do anything
    /// useful without a valid configuration.
    pub fn get() -> &'static Self {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        APP_CONFIG.get_or_init(|| Self::load().expect("failed to load application configuration"))
    }

    /// Load all configuration from environment variables
    pub fn load() -> Result<Self> {
        Ok(Self {
            api: ApiConfig::load()?,
            geocoder: GeocoderConfig::load()?,
            install: load_poller_settings()?,
        })
    }
}

impl ApiConfig {
    fn load() -> Result<Self> {
        let base_url =
            env::var("FEEDER_API_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
        let timeout = Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 30)?);

        Ok(Self { base_url, timeout })
    }
}

impl GeocoderConfig {
    fn load() -> Result<Self> {
        let url = env::var("GEOCODER_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org/reverse".to_string());
        let timeout = Duration::from_secs(parse_env("GEOCODER_TIMEOUT_SECS", 10)?);
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

        Ok(Self {
            url,
            timeout,
            user_agent,
        })
    }
}

fn load_poller_settings() -> Result<PollerSettings> {
    let defaults = PollerSettings::default();

    poller_settings(
        parse_env(
            "INSTALL_POLL_INTERVAL_MS",
            defaults.interval.as_millis() as u64,
        )?,
        parse_env("INSTALL_MAX_ATTEMPTS", defaults.max_attempts)?,
        parse_env(
            "INSTALL_COMPLETION_GRACE_MS",
            defaults.completion_grace.as_millis() as u64,
        )?,
    )
}

fn poller_settings(
    interval_ms: u64,
    max_attempts: u32,
    completion_grace_ms: u64,
) -> Result<PollerSettings> {
    let settings = PollerSettings {
        interval: Duration::from_millis(interval_ms),
        max_attempts,
        completion_grace: Duration::from_millis(completion_grace_ms),
    };
    settings
        .validate()
        .context("invalid install poller configuration")?;

    Ok(settings)
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .context(format!("failed to parse {name}: invalid format")),
        Err(_) => Ok(default),
    }
}
