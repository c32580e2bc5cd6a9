//! View model of the Tailscale install progress dialog
//!
//! Pure state: the poller feeds samples in, a renderer reads the result.

use crate::feeder_api_client::{InstallProgress, InstallStatus};
use time::{OffsetDateTime, macros::format_description};

const INITIAL_STATUS_TEXT: &str = "Initializing...";
const CONNECTING_INSTALL_PERCENT: u8 = 75;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tone {
    #[default]
    Neutral,
    Success,
    Warning,
    Error,
}

/// Actions offered to the user once polling has stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallChoice {
    /// Close the dialog and stay on the current step
    Close,
    /// Close the dialog and keep waiting on the current step
    StayHere,
    /// Go to the next step with a working VPN
    Continue,
    /// Go to the next step without VPN
    ContinueWithoutVpn,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub at: OffsetDateTime,
    pub text: String,
}

impl LogEntry {
    /// `[HH:MM:SS] text`
    pub fn to_line(&self) -> String {
        let format = format_description!("[hour]:[minute]:[second]");
        let at = self
            .at
            .format(format)
            .unwrap_or_else(|_| "--:--:--".to_string());
        format!("[{at}] {}", self.text)
    }
}

/// Install progress dialog state
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallView {
    visible: bool,
    status_text: String,
    tone: Tone,
    download_percent: u8,
    install_percent: u8,
    log: Vec<LogEntry>,
    error_detail: Option<String>,
    choices: Vec<InstallChoice>,
}

impl Default for InstallView {
    fn default() -> Self {
        Self {
            visible: false,
            status_text: INITIAL_STATUS_TEXT.to_string(),
            tone: Tone::Neutral,
            download_percent: 0,
            install_percent: 0,
            log: Vec::new(),
            error_detail: None,
            choices: Vec::new(),
        }
    }
}

impl InstallView {
    /// Show the dialog for a fresh install attempt
    pub fn open(&mut self, at: OffsetDateTime) {
        *self = Self::default();
        self.visible = true;
        self.status_text = "Starting Tailscale installation...".to_string();
        self.push_log(at, INITIAL_STATUS_TEXT);
    }

    /// Apply one progress sample
    pub fn apply_sample(&mut self, sample: &InstallProgress, at: OffsetDateTime) {
        match sample.status {
            InstallStatus::Downloading => {
                self.set_status("Downloading Tailscale...", Tone::Neutral);
                self.download_percent = sample.download_percent().unwrap_or(0);
                self.install_percent = 0;
            }
            InstallStatus::Installing => {
                self.set_status("Installing Tailscale...", Tone::Neutral);
                self.download_percent = 100;
                self.install_percent = sample.install_percent().unwrap_or(0);
            }
            InstallStatus::Connecting => {
                self.set_status("Connecting to Tailscale network...", Tone::Neutral);
                self.download_percent = 100;
                self.install_percent = sample
                    .install_percent()
                    .filter(|p| *p > 0)
                    .unwrap_or(CONNECTING_INSTALL_PERCENT);
            }
            InstallStatus::Completed => {
                self.set_status("Tailscale connected successfully!", Tone::Success);
                self.download_percent = 100;
                self.install_percent = 100;
                self.choices = vec![InstallChoice::Continue];
            }
            InstallStatus::Failed => {
                self.set_status("Connection Failed", Tone::Error);
                if self.error_detail.is_none() {
                    self.error_detail = sample.failure_text().map(str::to_string);
                }
                self.choices = vec![InstallChoice::Close, InstallChoice::ContinueWithoutVpn];
            }
            InstallStatus::Unknown => {}
        }

        if let Some(message) = sample.message.as_deref().filter(|m| !m.is_empty()) {
            self.push_log(at, message);
        }
    }

    /// The attempt budget ran out before a terminal status was seen
    ///
    /// `last_sample_failed` tells whether the final attempt could not even
    /// reach the backend.
    pub fn apply_timeout(&mut self, last_sample_failed: bool) {
        if last_sample_failed {
            self.set_status("Connection timeout - check status in Settings", Tone::Warning);
            self.choices = vec![InstallChoice::Close, InstallChoice::ContinueWithoutVpn];
        } else {
            self.set_status("Connection taking longer than expected...", Tone::Warning);
            self.choices = vec![InstallChoice::StayHere, InstallChoice::ContinueWithoutVpn];
        }
    }

    /// The backend refused to start the install
    pub fn apply_install_rejected(&mut self, message: &str) {
        self.set_status(&format!("Error: {message}"), Tone::Error);
        self.choices = vec![InstallChoice::Close, InstallChoice::ContinueWithoutVpn];
    }

    /// Hide the dialog and reset every field to its initial value
    pub fn close(&mut self) {
        *self = Self::default();
    }

    fn set_status(&mut self, text: &str, tone: Tone) {
        self.status_text = text.to_string();
        self.tone = tone;
    }

    fn push_log(&mut self, at: OffsetDateTime, text: &str) {
        self.log.push(LogEntry {
            at,
            text: text.to_string(),
        });
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn download_percent(&self) -> u8 {
        self.download_percent
    }

    pub fn install_percent(&self) -> u8 {
        self.install_percent
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn choices(&self) -> &[InstallChoice] {
        &self.choices
    }
}
