//! Plain text output of the command line client

use crate::services::{
    dashboard::DashboardSnapshot,
    install::{InstallChoice, InstallOutcome, InstallView, ProgressRenderer, Tone},
    setup::{PostalSource, SetupOutcome},
};
use log::debug;
use std::{
    collections::BTreeMap,
    io::{self, Write},
};

const MASKED: &str = "********";

/// Prints the install dialog incrementally: only what changed since the last frame
pub struct TerminalRenderer<W: Write> {
    out: W,
    status_text: Option<String>,
    percents: Option<(u8, u8)>,
    printed_log_lines: usize,
    error_detail_printed: bool,
    advanced: bool,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            status_text: None,
            percents: None,
            printed_log_lines: 0,
            error_detail_printed: false,
            advanced: false,
        }
    }

    pub fn has_advanced(&self) -> bool {
        self.advanced
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn frame(&mut self, view: &InstallView) -> io::Result<()> {
        if !view.is_visible() {
            self.status_text = None;
            self.percents = None;
            self.printed_log_lines = 0;
            self.error_detail_printed = false;
            return Ok(());
        }

        for entry in view.log().iter().skip(self.printed_log_lines) {
            writeln!(self.out, "  {}", entry.to_line())?;
        }
        self.printed_log_lines = view.log().len();

        if self.status_text.as_deref() != Some(view.status_text()) {
            writeln!(
                self.out,
                "{}{}",
                tone_prefix(view.tone()),
                view.status_text()
            )?;
            self.status_text = Some(view.status_text().to_string());
        }

        let percents = (view.download_percent(), view.install_percent());
        if percents != (0, 0) && self.percents != Some(percents) {
            writeln!(
                self.out,
                "  download {:>3}%  install {:>3}%",
                percents.0, percents.1
            )?;
        }
        self.percents = Some(percents);

        if let Some(detail) = view.error_detail().filter(|_| !self.error_detail_printed) {
            writeln!(self.out, "  {detail}")?;
            self.error_detail_printed = true;
        }

        self.out.flush()
    }
}

impl<W: Write> ProgressRenderer for TerminalRenderer<W> {
    fn render(&mut self, view: &InstallView) {
        if let Err(e) = self.frame(view) {
            debug!("failed to render install progress: {e}");
        }
    }

    fn advance(&mut self) {
        self.advanced = true;
        if let Err(e) = writeln!(self.out, "Continuing with the next step.") {
            debug!("failed to render install progress: {e}");
        }
    }
}

fn tone_prefix(tone: Tone) -> &'static str {
    match tone {
        Tone::Neutral => "",
        Tone::Success => "[ok] ",
        Tone::Warning => "[warning] ",
        Tone::Error => "[error] ",
    }
}

fn choice_label(choice: InstallChoice) -> &'static str {
    match choice {
        InstallChoice::Close => "close and stay on this step",
        InstallChoice::StayHere => "stay here and check again later",
        InstallChoice::Continue => "continue",
        InstallChoice::ContinueWithoutVpn => {
            "continue without VPN (run `feeder-setup tailscale skip`)"
        }
    }
}

/// Summary line of a finished install plus the choices left to the user
pub fn print_install_outcome(
    out: &mut impl Write,
    outcome: &InstallOutcome,
    choices: &[InstallChoice],
) -> io::Result<()> {
    match outcome {
        InstallOutcome::Completed => writeln!(out, "Tailscale installed and connected.")?,
        InstallOutcome::Failed(Some(message)) => {
            writeln!(out, "Tailscale installation failed: {message}")?
        }
        InstallOutcome::Failed(None) => writeln!(out, "Tailscale installation failed.")?,
        InstallOutcome::TimedOut => writeln!(out, "Tailscale installation did not finish in time.")?,
        InstallOutcome::Rejected(message) => {
            writeln!(out, "Tailscale installation could not be started: {message}")?
        }
        InstallOutcome::Cancelled => writeln!(out, "Tailscale installation cancelled.")?,
    }

    if outcome.needs_user_choice() && !choices.is_empty() {
        writeln!(out, "Options:")?;
        for choice in choices {
            writeln!(out, "  - {}", choice_label(*choice))?;
        }
    }

    Ok(())
}

pub fn print_snapshot(out: &mut impl Write, snapshot: &DashboardSnapshot) -> io::Result<()> {
    let connectivity = &snapshot.connectivity;
    let internet = match connectivity.internet {
        Some(true) => "connected",
        Some(false) => "disconnected",
        None => "unknown",
    };
    writeln!(out, "Internet:  {internet}")?;
    writeln!(
        out,
        "IP:        {}",
        connectivity.ip_address.as_deref().unwrap_or("unknown")
    )?;
    writeln!(
        out,
        "Hostname:  {}",
        connectivity.hostname.as_deref().unwrap_or("unknown")
    )?;

    writeln!(out, "Containers:")?;
    if !snapshot.status_known {
        writeln!(out, "  unknown")?;
    } else if snapshot.containers.is_empty() {
        writeln!(out, "  none")?;
    }
    for container in &snapshot.containers {
        let marker = if container.running { "*" } else { "-" };
        writeln!(out, "  {marker} {}: {}", container.name, container.status)?;
    }

    writeln!(out, "Active feeds:")?;
    if snapshot.feeds.is_empty() {
        writeln!(out, "  none")?;
    }
    for feed in &snapshot.feeds {
        writeln!(out, "  * {feed}")?;
    }

    Ok(())
}

pub fn print_setup_outcome(out: &mut impl Write, outcome: &SetupOutcome) -> io::Result<()> {
    let configuration = &outcome.configuration;
    writeln!(out, "Configuration saved.")?;
    writeln!(out, "Site name: {}", configuration.site_name)?;
    match outcome.postal_source {
        PostalSource::User => {}
        PostalSource::Geocoded => {
            writeln!(out, "Postal code {} found for the location.", configuration.zip_code)?
        }
        PostalSource::Fallback => writeln!(
            out,
            "No postal code found for the location, using a placeholder prefix."
        )?,
    }
    writeln!(out, "The feeder is starting, this may take a few minutes.")
}

/// Print a flat configuration, hiding credentials
pub fn print_config(out: &mut impl Write, config: &BTreeMap<String, String>) -> io::Result<()> {
    for (key, value) in config {
        let value = if is_secret(key) && !value.is_empty() {
            MASKED
        } else {
            value
        };
        writeln!(out, "{key}={value}")?;
    }
    Ok(())
}

fn is_secret(key: &str) -> bool {
    key.ends_with("_KEY") || key.ends_with("_UUID") || key.ends_with("_SHARECODE")
}
