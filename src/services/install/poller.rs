use crate::{
    feeder_api_client::{FeederApi, InstallStatus, TailscaleInstallRequest},
    services::install::progress::InstallView,
};
use anyhow::{Result, ensure};
use log::{debug, info, warn};
use std::{collections::BTreeMap, future::Future, sync::Arc, time::Duration};
use time::OffsetDateTime;
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior, interval_at, sleep},
};

/// Cooperative cancellation shared between the poller and whoever owns the dialog
#[derive(Clone, Debug)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) was called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives as long as self, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `fut` unless cancelled first
    ///
    /// Returns `None` if cancellation won; `fut` is dropped without being
    /// polled again, so its result can never be observed.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollerSettings {
    /// Delay between two progress samples
    pub interval: Duration,
    /// Samples taken before giving up, including failed ones
    pub max_attempts: u32,
    /// Pause after `completed` before advancing to the next step
    pub completion_grace: Duration,
}

impl PollerSettings {
    /// Reject settings the poller cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.interval.is_zero(),
            "install poll interval must be greater than zero"
        );
        ensure!(
            self.max_attempts > 0,
            "install max attempts must be greater than zero"
        );
        Ok(())
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 120,
            completion_grace: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Install finished; the wizard advanced to the next step
    Completed,
    /// The backend reported `failed`
    Failed(Option<String>),
    /// Attempt budget exhausted without a terminal status
    TimedOut,
    /// The backend refused to start the install
    Rejected(String),
    /// The dialog was closed while the install was running
    Cancelled,
}

impl InstallOutcome {
    /// Whether the user has to decide how to go on
    pub fn needs_user_choice(&self) -> bool {
        matches!(
            self,
            InstallOutcome::Failed(_) | InstallOutcome::TimedOut | InstallOutcome::Rejected(_)
        )
    }
}

/// Rendering side of the install dialog
pub trait ProgressRenderer {
    /// Called after every change of the view
    fn render(&mut self, view: &InstallView);

    /// Called exactly once after a successful install, when the wizard moves on
    fn advance(&mut self);
}

/// Drives one Tailscale install: trigger, sample, map into the view
pub struct InstallPoller<'a, T, R>
where
    T: FeederApi,
    R: ProgressRenderer,
{
    service_client: &'a T,
    renderer: &'a mut R,
    settings: PollerSettings,
    cancel: CancellationToken,
    view: InstallView,
}

impl<'a, T, R> InstallPoller<'a, T, R>
where
    T: FeederApi,
    R: ProgressRenderer,
{
    pub fn new(
        service_client: &'a T,
        renderer: &'a mut R,
        settings: PollerSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service_client,
            renderer,
            settings,
            cancel,
            view: InstallView::default(),
        }
    }

    /// Current view, e.g. to show the offered choices after `run`
    pub fn view(&self) -> &InstallView {
        &self.view
    }

    /// Start the install and poll until a terminal outcome
    pub async fn run(&mut self, auth_key: &str) -> InstallOutcome {
        let cancel = self.cancel.clone();
        let service_client = self.service_client;

        self.view.open(now());
        self.render();

        let request = TailscaleInstallRequest {
            auth_key: auth_key.to_string(),
        };
        let Some(accepted) = cancel
            .run_until_cancelled(service_client.install_tailscale(request))
            .await
        else {
            return self.cancelled();
        };

        match accepted {
            Ok(accepted) => {
                info!(
                    "tailscale install accepted{}",
                    accepted
                        .message
                        .map(|m| format!(": {m}"))
                        .unwrap_or_default()
                );
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!("failed to start tailscale install: {message}");
                self.view.apply_install_rejected(&message);
                self.render();
                return InstallOutcome::Rejected(message);
            }
        }

        let patch = BTreeMap::from([
            ("TAILSCALE_ENABLED".to_string(), "true".to_string()),
            ("TAILSCALE_AUTH_KEY".to_string(), auth_key.to_string()),
        ]);
        match cancel
            .run_until_cancelled(service_client.update_config(patch))
            .await
        {
            None => return self.cancelled(),
            Some(Err(e)) => warn!("failed to save tailscale key: {e:#}"),
            Some(Ok(())) => debug!("tailscale key saved"),
        }

        self.poll().await
    }

    async fn poll(&mut self) -> InstallOutcome {
        let cancel = self.cancel.clone();
        let service_client = self.service_client;
        let max_attempts = self.settings.max_attempts;

        let mut ticker = interval_at(
            Instant::now() + self.settings.interval,
            self.settings.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts = 0;
        loop {
            if cancel.run_until_cancelled(ticker.tick()).await.is_none() {
                return self.cancelled();
            }

            attempts += 1;
            debug!("tailscale progress attempt {attempts}/{max_attempts}");

            let Some(sample) = cancel
                .run_until_cancelled(service_client.tailscale_progress())
                .await
            else {
                return self.cancelled();
            };
            // the next sample starts one full interval after this one answered
            ticker.reset();

            let last_sample_failed = match sample {
                Ok(progress) => {
                    self.view.apply_sample(&progress, now());
                    self.render();

                    match progress.status {
                        InstallStatus::Completed => return self.complete().await,
                        InstallStatus::Failed => {
                            let message = progress.failure_text().map(str::to_string);
                            warn!(
                                "tailscale install failed: {}",
                                message.as_deref().unwrap_or("no reason given")
                            );
                            return InstallOutcome::Failed(message);
                        }
                        _ => false,
                    }
                }
                Err(e) => {
                    warn!("failed to get tailscale progress: {e:#}");
                    true
                }
            };

            if attempts >= max_attempts {
                warn!("tailscale install timed out after {attempts} attempts");
                self.view.apply_timeout(last_sample_failed);
                self.render();
                return InstallOutcome::TimedOut;
            }
        }
    }

    async fn complete(&mut self) -> InstallOutcome {
        info!(
            "tailscale connected, continuing in {}ms",
            self.settings.completion_grace.as_millis()
        );

        let cancel = self.cancel.clone();
        if cancel
            .run_until_cancelled(sleep(self.settings.completion_grace))
            .await
            .is_none()
        {
            return self.cancelled();
        }

        self.view.close();
        self.render();
        self.renderer.advance();
        InstallOutcome::Completed
    }

    fn cancelled(&mut self) -> InstallOutcome {
        info!("tailscale install dialog closed");
        self.view.close();
        self.render();
        InstallOutcome::Cancelled
    }

    fn render(&mut self) {
        self.renderer.render(&self.view);
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
