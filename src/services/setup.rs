//! Feeder setup service
//!
//! Assembles the flat feeder configuration from a validated form and submits
//! it to the backend exactly once per user action.

use crate::{
    feeder_api_client::FeederApi,
    geocoding::{FALLBACK_POSTAL_CODE, PostalCodeLookup, lookup_postal_code},
    services::{
        aggregator::Aggregator,
        validation::{ConnectivityMode, SetupForm, ValidatedSetup, ValidationError, validate},
    },
};
use log::{debug, info, warn};
use serde::{Serialize, Serializer};
use serde_valid::Validate;
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;

fn serialize_flag<S>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(if *flag { "true" } else { "false" })
}

/// Flat feeder configuration as persisted by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Validate)]
pub struct FeederConfiguration {
    #[serde(rename = "FEEDER_LAT")]
    #[validate(pattern = r"^-?[0-9]+\.[0-9]+$")]
    pub latitude: String,
    #[serde(rename = "FEEDER_LONG")]
    #[validate(pattern = r"^-?[0-9]+\.[0-9]+$")]
    pub longitude: String,
    #[serde(rename = "FEEDER_ALT_M")]
    #[validate(pattern = r"^[0-9]+$")]
    pub altitude: String,
    #[serde(rename = "FEEDER_TZ")]
    #[validate(min_length = 1)]
    pub timezone: String,
    #[serde(rename = "MLAT_SITE_NAME")]
    #[validate(min_length = 1)]
    pub site_name: String,
    #[serde(rename = "ZIP_CODE")]
    pub zip_code: String,
    #[serde(rename = "TAILSCALE_ENABLED", serialize_with = "serialize_flag")]
    pub tailscale_enabled: bool,
    #[serde(rename = "TAILSCALE_AUTH_KEY")]
    pub tailscale_auth_key: String,
    /// `<AGG>_ENABLED` flags and credential keys of every aggregator
    #[serde(flatten)]
    pub aggregators: BTreeMap<String, String>,
}

/// Where the site name prefix came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostalSource {
    User,
    Geocoded,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostalPrefix {
    pub code: String,
    pub source: PostalSource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetupOutcome {
    pub configuration: FeederConfiguration,
    pub postal_source: PostalSource,
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0:#}")]
    Save(anyhow::Error),
}

/// Service for assembling and saving the feeder configuration
pub struct SetupService;

impl SetupService {
    /// Probe the backend once for internet access
    ///
    /// Any failure counts as offline; the wizard then only asks for the
    /// location and site name.
    pub async fn resolve_connectivity<T>(service_client: &T) -> ConnectivityMode
    where
        T: FeederApi,
    {
        match service_client.network_status().await {
            Ok(status) if status.internet => ConnectivityMode::Online,
            Ok(_) => ConnectivityMode::Offline,
            Err(e) => {
                warn!("failed to check internet connection: {e:#}");
                ConnectivityMode::Offline
            }
        }
    }

    /// Resolve the site name prefix
    ///
    /// A postal code entered by the user wins. Otherwise the coordinates are
    /// reverse geocoded once; any failure falls back to `00000`.
    pub async fn site_name_prefix<L>(
        lookup: &L,
        validated: &ValidatedSetup,
        lookup_timeout: Duration,
    ) -> PostalPrefix
    where
        L: PostalCodeLookup,
    {
        if let Some(zip_code) = &validated.zip_code {
            return PostalPrefix {
                code: zip_code.clone(),
                source: PostalSource::User,
            };
        }

        let location = &validated.location;
        match lookup_postal_code(lookup, &location.latitude, &location.longitude, lookup_timeout)
            .await
        {
            Some(code) => PostalPrefix {
                code,
                source: PostalSource::Geocoded,
            },
            None => PostalPrefix {
                code: FALLBACK_POSTAL_CODE.to_string(),
                source: PostalSource::Fallback,
            },
        }
    }

    /// Build the configuration payload
    ///
    /// Every aggregator is emitted; the ones not enabled in `validated` are
    /// disabled with empty credentials.
    pub fn assemble(validated: &ValidatedSetup, prefix: &PostalPrefix) -> FeederConfiguration {
        let mut aggregators = BTreeMap::new();
        for aggregator in Aggregator::ALL {
            let credentials = validated.aggregators.get(&aggregator);
            aggregators.insert(
                aggregator.enabled_key().to_string(),
                credentials.is_some().to_string(),
            );
            for (i, key) in aggregator.credential_keys().iter().enumerate() {
                let value = credentials
                    .and_then(|c| c.get(i))
                    .cloned()
                    .unwrap_or_default();
                aggregators.insert(key.to_string(), value);
            }
        }

        let zip_code = match prefix.source {
            PostalSource::Fallback => validated.zip_code.clone().unwrap_or_default(),
            PostalSource::User | PostalSource::Geocoded => prefix.code.clone(),
        };

        FeederConfiguration {
            latitude: validated.location.latitude.clone(),
            longitude: validated.location.longitude.clone(),
            altitude: validated.location.altitude.clone(),
            timezone: validated.location.timezone.clone(),
            site_name: format!("{}-{}", prefix.code, validated.site_name),
            zip_code,
            tailscale_enabled: validated.tailscale_key.is_some(),
            tailscale_auth_key: validated.tailscale_key.clone().unwrap_or_default(),
            aggregators,
        }
    }

    /// Validate, assemble and save the configuration
    ///
    /// Validation errors never reach the network. The save is attempted once;
    /// a failure is returned verbatim and retrying is up to the user.
    pub async fn save_and_start<T, L>(
        service_client: &T,
        lookup: &L,
        form: &SetupForm,
        mode: ConnectivityMode,
        lookup_timeout: Duration,
    ) -> Result<SetupOutcome, SetupError>
    where
        T: FeederApi,
        L: PostalCodeLookup,
    {
        let validated = validate(form, mode)?;
        debug!("setup form valid ({mode:?})");

        let prefix = Self::site_name_prefix(lookup, &validated, lookup_timeout).await;
        let configuration = Self::assemble(&validated, &prefix);
        info!("saving configuration for site {}", configuration.site_name);

        service_client
            .save_config(configuration.clone())
            .await
            .map_err(SetupError::Save)?;

        Ok(SetupOutcome {
            configuration,
            postal_source: prefix.source,
        })
    }
}
