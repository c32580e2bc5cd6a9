//! Command-line argument definitions.

use crate::services::{
    aggregator::{Aggregator, AggregatorInput},
    dashboard::REFRESH_INTERVAL,
    validation::SetupForm,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::collections::BTreeMap;

/// Setup and status client for ADS-B feeder appliances
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Base URL of the feeder backend
    #[arg(long, value_name = "URL", env = "FEEDER_API_URL", global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show service, feed and network status
    Status(StatusArgs),
    /// Validate and save the feeder configuration, then start the feeder
    Setup(SetupArgs),
    /// Manage the optional Tailscale VPN
    #[command(subcommand)]
    Tailscale(TailscaleCommand),
    /// Restart the feeder service
    Restart,
    /// Show or change the stored configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(ClapArgs, Debug)]
pub struct StatusArgs {
    /// Keep refreshing until interrupted
    #[arg(long)]
    pub watch: bool,
    /// Seconds between two refreshes with --watch
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = REFRESH_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..),
        requires = "watch"
    )]
    pub interval: u64,
}

#[derive(Subcommand, Debug)]
pub enum TailscaleCommand {
    /// Install Tailscale and follow the progress
    Install {
        /// Tailscale auth key (tskey-...)
        #[arg(long, env = "TAILSCALE_AUTH_KEY", hide_env_values = true)]
        auth_key: String,
    },
    /// Continue without VPN
    Skip,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the stored configuration with credentials hidden
    Show,
    /// Update single configuration keys
    Set {
        /// KEY=VALUE pairs
        #[arg(required = true, value_parser = parse_key_value)]
        pairs: Vec<(String, String)>,
    },
}

#[derive(ClapArgs, Debug, Default)]
pub struct SetupArgs {
    /// Latitude in decimal degrees, e.g. 33.55390
    #[arg(long, allow_hyphen_values = true)]
    pub lat: String,
    /// Longitude in decimal degrees, e.g. -117.21390
    #[arg(long, allow_hyphen_values = true)]
    pub lon: String,
    /// Antenna altitude in whole meters
    #[arg(long)]
    pub alt: String,
    /// Timezone, e.g. America/Los_Angeles
    #[arg(long)]
    pub tz: String,
    /// Site name, prefixed with the postal code when saved
    #[arg(long)]
    pub site_name: String,
    /// Postal code; looked up from the coordinates if omitted
    #[arg(long)]
    pub zip: Option<String>,
    /// Tailscale auth key to enable the VPN
    #[arg(long)]
    pub tailscale_key: Option<String>,

    /// FlightRadar24 sharing key
    #[arg(long)]
    pub fr24_key: Option<String>,
    /// ADS-B Exchange UUID
    #[arg(long)]
    pub adsbx_uuid: Option<String>,
    /// Airplanes.Live UUID
    #[arg(long)]
    pub airplaneslive_uuid: Option<String>,
    /// RadarBox sharing key
    #[arg(long)]
    pub radarbox_key: Option<String>,
    /// PlaneFinder share code
    #[arg(long)]
    pub planefinder_sharecode: Option<String>,
    /// OpenSky Network username
    #[arg(long, requires = "opensky_serial")]
    pub opensky_username: Option<String>,
    /// OpenSky Network receiver serial
    #[arg(long, requires = "opensky_username")]
    pub opensky_serial: Option<String>,
}

impl SetupArgs {
    /// Form as the wizard would have filled it in
    pub fn to_form(&self) -> SetupForm {
        let mut aggregators = BTreeMap::new();
        for aggregator in Aggregator::ALL {
            if let Some(credentials) = self.credentials(aggregator) {
                aggregators.insert(
                    aggregator,
                    AggregatorInput {
                        enabled: true,
                        credentials,
                    },
                );
            }
        }

        SetupForm {
            latitude: self.lat.clone(),
            longitude: self.lon.clone(),
            altitude: self.alt.clone(),
            timezone: self.tz.clone(),
            site_name: self.site_name.clone(),
            zip_code: self.zip.clone().unwrap_or_default(),
            tailscale_key: self.tailscale_key.clone().unwrap_or_default(),
            aggregators,
        }
    }

    fn credentials(&self, aggregator: Aggregator) -> Option<Vec<String>> {
        let single = |value: &Option<String>| value.clone().map(|v| vec![v]);

        match aggregator {
            Aggregator::FlightRadar24 => single(&self.fr24_key),
            Aggregator::AdsbExchange => single(&self.adsbx_uuid),
            Aggregator::AirplanesLive => single(&self.airplaneslive_uuid),
            Aggregator::RadarBox => single(&self.radarbox_key),
            Aggregator::PlaneFinder => single(&self.planefinder_sharecode),
            Aggregator::OpenSkyNetwork => {
                match (&self.opensky_username, &self.opensky_serial) {
                    (Some(username), Some(serial)) => {
                        Some(vec![username.clone(), serial.clone()])
                    }
                    _ => None,
                }
            }
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{s}`"));
    }

    Ok((key.to_string(), value.to_string()))
}
