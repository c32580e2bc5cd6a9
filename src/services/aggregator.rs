use std::fmt;

/// Third-party flight tracking networks the feeder can share data with
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Aggregator {
    FlightRadar24,
    AdsbExchange,
    AirplanesLive,
    RadarBox,
    PlaneFinder,
    OpenSkyNetwork,
}

impl Aggregator {
    pub const ALL: [Aggregator; 6] = [
        Aggregator::FlightRadar24,
        Aggregator::AdsbExchange,
        Aggregator::AirplanesLive,
        Aggregator::RadarBox,
        Aggregator::PlaneFinder,
        Aggregator::OpenSkyNetwork,
    ];

    /// Configuration key of the enabled flag
    pub fn enabled_key(&self) -> &'static str {
        match self {
            Aggregator::FlightRadar24 => "FR24_ENABLED",
            Aggregator::AdsbExchange => "ADSBX_ENABLED",
            Aggregator::AirplanesLive => "AIRPLANESLIVE_ENABLED",
            Aggregator::RadarBox => "RADARBOX_ENABLED",
            Aggregator::PlaneFinder => "PLANEFINDER_ENABLED",
            Aggregator::OpenSkyNetwork => "OPENSKYNETWORK_ENABLED",
        }
    }

    /// Configuration keys of the credentials, all of which must be set
    pub fn credential_keys(&self) -> &'static [&'static str] {
        match self {
            Aggregator::FlightRadar24 => &["FR24_SHARING_KEY"],
            Aggregator::AdsbExchange => &["ADSBX_UUID"],
            Aggregator::AirplanesLive => &["AIRPLANESLIVE_UUID"],
            Aggregator::RadarBox => &["RADARBOX_SHARING_KEY"],
            Aggregator::PlaneFinder => &["PLANEFINDER_SHARECODE"],
            Aggregator::OpenSkyNetwork => &["OPENSKYNETWORK_USERNAME", "OPENSKYNETWORK_SERIAL"],
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregator::FlightRadar24 => "FlightRadar24",
            Aggregator::AdsbExchange => "ADS-B Exchange",
            Aggregator::AirplanesLive => "Airplanes.Live",
            Aggregator::RadarBox => "RadarBox",
            Aggregator::PlaneFinder => "PlaneFinder",
            Aggregator::OpenSkyNetwork => "OpenSky Network",
        };
        write!(f, "{name}")
    }
}

/// User input for one aggregator
///
/// `credentials` are positional and match [`Aggregator::credential_keys`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregatorInput {
    pub enabled: bool,
    pub credentials: Vec<String>,
}

impl AggregatorInput {
    pub fn enabled(credentials: &[&str]) -> Self {
        Self {
            enabled: true,
            credentials: credentials.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Trimmed credentials if the aggregator is enabled and every credential is present
    pub fn usable_credentials(&self, aggregator: Aggregator) -> Option<Vec<String>> {
        if !self.enabled {
            return None;
        }

        let expected = aggregator.credential_keys().len();
        let credentials: Vec<String> = self
            .credentials
            .iter()
            .map(|c| c.trim().to_string())
            .collect();

        (credentials.len() == expected && credentials.iter().all(|c| !c.is_empty()))
            .then_some(credentials)
    }
}
