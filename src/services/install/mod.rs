pub mod poller;
pub mod progress;

pub use poller::{
    CancellationToken, InstallOutcome, InstallPoller, PollerSettings, ProgressRenderer,
};
pub use progress::{InstallChoice, InstallView, LogEntry, Tone};

use crate::feeder_api_client::FeederApi;
use log::{info, warn};
use std::collections::BTreeMap;

/// Service for the optional VPN step of the wizard
pub struct TailscaleService;

impl TailscaleService {
    /// Continue without VPN
    ///
    /// Disabling is best effort: the wizard moves on even if the backend
    /// could not store the flag.
    pub async fn skip<T>(service_client: &T)
    where
        T: FeederApi,
    {
        let patch = BTreeMap::from([("TAILSCALE_ENABLED".to_string(), "false".to_string())]);

        match service_client.update_config(patch).await {
            Ok(()) => info!("continuing without tailscale"),
            Err(e) => warn!("failed to disable tailscale: {e:#}"),
        }
    }
}
