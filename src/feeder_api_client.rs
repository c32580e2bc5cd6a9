use crate::{
    config::ApiConfig,
    http_client::{handle_http_response, http_client},
    services::setup::FeederConfiguration,
};
use anyhow::{Context, Result};
use log::{debug, info};
#[cfg(feature = "mock")]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::{collections::BTreeMap, fmt::Debug};
use trait_variant::make;

/// Connectivity probe result of `/api/network-status`
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct NetworkStatus {
    #[serde(default)]
    pub internet: bool,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

/// Service and feed status of `/api/status`
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct FeederStatus {
    /// Container name to `docker ps` status text, e.g. `"Up 3 hours"`
    #[serde(default)]
    pub docker: BTreeMap<String, String>,
    #[serde(default)]
    pub feeds: Vec<String>,
    #[serde(default)]
    pub configured: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
pub struct TailscaleInstallRequest {
    #[validate(min_length = 1)]
    pub auth_key: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct InstallAccepted {
    #[serde(default)]
    pub message: Option<String>,
}

/// Install state reported by the backend
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Downloading,
    Installing,
    Connecting,
    Completed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl InstallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallStatus::Completed | InstallStatus::Failed)
    }
}

/// One sample of `/api/tailscale/progress`
///
/// Progress values are not guaranteed to be monotonic or in range; use the
/// clamped accessors.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct InstallProgress {
    #[serde(default)]
    pub status: InstallStatus,
    #[serde(default)]
    pub download_progress: Option<f64>,
    #[serde(default)]
    pub install_progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl InstallProgress {
    pub fn download_percent(&self) -> Option<u8> {
        self.download_progress.map(clamp_percent)
    }

    pub fn install_percent(&self) -> Option<u8> {
        self.install_progress.map(clamp_percent)
    }

    /// Failure text, preferring `message` over `error`
    pub fn failure_text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .filter(|m| !m.is_empty())
    }
}

fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 100.0) as u8
    }
}

#[derive(Clone)]
pub struct FeederApiClient {
    client: Client,
    base_url: String,
}

#[make(Send)]
#[cfg_attr(feature = "mock", automock)]
pub trait FeederApi {
    async fn network_status(&self) -> Result<NetworkStatus>;
    async fn status(&self) -> Result<FeederStatus>;
    async fn config(&self) -> Result<BTreeMap<String, String>>;
    async fn save_config(&self, config: FeederConfiguration) -> Result<()>;
    async fn update_config(&self, patch: BTreeMap<String, String>) -> Result<()>;
    async fn restart_service(&self) -> Result<()>;
    async fn install_tailscale(&self, request: TailscaleInstallRequest)
    -> Result<InstallAccepted>;
    async fn tailscale_progress(&self) -> Result<InstallProgress>;
}

impl FeederApiClient {
    // API endpoint constants
    const NETWORK_STATUS_ENDPOINT: &str = "/api/network-status";
    const STATUS_ENDPOINT: &str = "/api/status";
    const CONFIG_ENDPOINT: &str = "/api/config";
    const CONFIG_UPDATE_ENDPOINT: &str = "/api/config/update";
    const SERVICE_RESTART_ENDPOINT: &str = "/api/service/restart";
    const TAILSCALE_INSTALL_ENDPOINT: &str = "/api/tailscale/install";
    const TAILSCALE_PROGRESS_ENDPOINT: &str = "/api/tailscale/progress";

    pub fn new(config: &ApiConfig) -> Result<Self> {
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        let client = http_client(config.timeout, &user_agent)?;

        Ok(FeederApiClient {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn build_url(&self, path: &str) -> String {
        // Normalize to exactly one "/" between base and path
        let base = self.base_url.trim_end_matches('/');
        let normalized_path = path.trim_start_matches('/');
        format!("{base}/{normalized_path}")
    }

    /// GET request to the feeder API
    async fn get(&self, path: &str) -> Result<String> {
        let url = self.build_url(path);
        debug!("GET {url}");

        let res = self
            .client
            .get(&url)
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .context(format!("failed to send GET request to {url}"))?;

        handle_http_response(res, &format!("GET {path}")).await
    }

    /// POST request to the feeder API (empty body)
    async fn post(&self, path: &str) -> Result<String> {
        let url = self.build_url(path);
        info!("POST {url}");

        let res = self
            .client
            .post(&url)
            .send()
            .await
            .context(format!("failed to send POST request to {url}"))?;

        handle_http_response(res, &format!("POST {path}")).await
    }

    /// POST request to the feeder API with JSON body
    ///
    /// The body is not logged since it may carry credentials.
    async fn post_json(&self, path: &str, body: impl Serialize) -> Result<String> {
        let url = self.build_url(path);
        info!("POST {url}");

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context(format!("failed to send POST request to {url}"))?;

        handle_http_response(res, &format!("POST {path}")).await
    }
}

impl FeederApi for FeederApiClient {
    async fn network_status(&self) -> Result<NetworkStatus> {
        let body = self.get(Self::NETWORK_STATUS_ENDPOINT).await?;
        serde_json::from_str(&body).context("failed to parse network status")
    }

    async fn status(&self) -> Result<FeederStatus> {
        let body = self.get(Self::STATUS_ENDPOINT).await?;
        serde_json::from_str(&body).context("failed to parse feeder status")
    }

    async fn config(&self) -> Result<BTreeMap<String, String>> {
        let body = self.get(Self::CONFIG_ENDPOINT).await?;
        serde_json::from_str(&body).context("failed to parse feeder config")
    }

    async fn save_config(&self, config: FeederConfiguration) -> Result<()> {
        config
            .validate()
            .context("configuration validation failed")?;
        self.post_json(Self::CONFIG_ENDPOINT, config).await?;
        Ok(())
    }

    async fn update_config(&self, patch: BTreeMap<String, String>) -> Result<()> {
        self.post_json(Self::CONFIG_UPDATE_ENDPOINT, patch).await?;
        Ok(())
    }

    async fn restart_service(&self) -> Result<()> {
        self.post(Self::SERVICE_RESTART_ENDPOINT).await?;
        Ok(())
    }

    async fn install_tailscale(
        &self,
        request: TailscaleInstallRequest,
    ) -> Result<InstallAccepted> {
        request
            .validate()
            .context("tailscale install request validation failed")?;
        let body = self
            .post_json(Self::TAILSCALE_INSTALL_ENDPOINT, request)
            .await?;

        // The body is optional; an empty or non-JSON success still counts as accepted
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    async fn tailscale_progress(&self) -> Result<InstallProgress> {
        let body = self.get(Self::TAILSCALE_PROGRESS_ENDPOINT).await?;
        serde_json::from_str(&body).context("failed to parse tailscale progress")
    }
}
