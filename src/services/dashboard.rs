use crate::{feeder_api_client::FeederApi, services::install::CancellationToken};
use anyhow::{Context, Result, ensure};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval, sleep};

/// `docker ps` reports running containers as `Up <duration>`
const RUNNING_MARKER: &str = "Up";

/// Dashboard refresh cadence
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Time the containers get to come back before the status is read again
pub const RESTART_SETTLE: Duration = Duration::from_secs(3);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerState {
    pub name: String,
    pub status: String,
    pub running: bool,
}

/// Connectivity part of the dashboard; `None` if the probe failed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectivityState {
    pub internet: Option<bool>,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub connectivity: ConnectivityState,
    /// Empty if the service status could not be loaded
    pub containers: Vec<ContainerState>,
    pub feeds: Vec<String>,
    /// `false` if `/api/status` failed and the lists above are unknown
    pub status_known: bool,
}

pub struct DashboardService;

impl DashboardService {
    /// Collect service and network status
    ///
    /// Never fails; each part degrades to "unknown" on its own.
    pub async fn snapshot<T>(service_client: &T) -> DashboardSnapshot
    where
        T: FeederApi,
    {
        let (status, network) =
            tokio::join!(service_client.status(), service_client.network_status());

        let connectivity = match network {
            Ok(network) => ConnectivityState {
                internet: Some(network.internet),
                ip_address: network.ip_address,
                hostname: network.hostname,
            },
            Err(e) => {
                warn!("failed to get network status: {e:#}");
                ConnectivityState::default()
            }
        };

        match status {
            Ok(status) => DashboardSnapshot {
                connectivity,
                containers: status
                    .docker
                    .into_iter()
                    .map(|(name, status)| ContainerState {
                        running: status.contains(RUNNING_MARKER),
                        name,
                        status,
                    })
                    .collect(),
                feeds: status.feeds,
                status_known: true,
            },
            Err(e) => {
                warn!("failed to get feeder status: {e:#}");
                DashboardSnapshot {
                    connectivity,
                    ..Default::default()
                }
            }
        }
    }

    /// Restart the feeder service
    pub async fn restart<T>(service_client: &T) -> Result<()>
    where
        T: FeederApi,
    {
        service_client
            .restart_service()
            .await
            .context("failed to restart service")?;

        info!("service restarted");
        Ok(())
    }

    /// Restart, wait `settle`, then read the status again
    pub async fn restart_and_refresh<T>(
        service_client: &T,
        settle: Duration,
    ) -> Result<DashboardSnapshot>
    where
        T: FeederApi,
    {
        Self::restart(service_client).await?;

        debug!("reading status again in {}ms", settle.as_millis());
        sleep(settle).await;

        Ok(Self::snapshot(service_client).await)
    }

    /// Take a snapshot right away and then every `every` until cancelled
    ///
    /// A failing `on_snapshot` ends the loop with its error.
    pub async fn watch<T, F>(
        service_client: &T,
        every: Duration,
        cancel: &CancellationToken,
        mut on_snapshot: F,
    ) -> Result<()>
    where
        T: FeederApi,
        F: FnMut(&DashboardSnapshot) -> Result<()>,
    {
        ensure!(!every.is_zero(), "refresh interval must be greater than zero");

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if cancel.run_until_cancelled(ticker.tick()).await.is_none() {
                break;
            }

            let Some(snapshot) = cancel
                .run_until_cancelled(Self::snapshot(service_client))
                .await
            else {
                break;
            };
            on_snapshot(&snapshot)?;
        }

        info!("dashboard refresh stopped");
        Ok(())
    }
}
