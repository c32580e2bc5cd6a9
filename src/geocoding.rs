use crate::{config::GeocoderConfig, http_client::http_client};
use anyhow::{Context, Result};
use log::{debug, warn};
#[cfg(feature = "mock")]
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use trait_variant::make;
use url::Url;

/// Site name prefix used whenever no postal code can be determined
pub const FALLBACK_POSTAL_CODE: &str = "00000";

#[derive(Debug, Default, Deserialize)]
struct ReverseResponse {
    address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    postcode: Option<String>,
    postal_code: Option<String>,
}

#[make(Send)]
#[cfg_attr(feature = "mock", automock)]
pub trait PostalCodeLookup {
    /// Postal code at the given coordinates, `None` if the service knows none
    async fn postal_code(&self, latitude: &str, longitude: &str) -> Result<Option<String>>;
}

/// Reverse geocoding against an OpenStreetMap Nominatim instance
#[derive(Clone)]
pub struct NominatimClient {
    client: Client,
    url: Url,
}

impl NominatimClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = http_client(config.timeout, &config.user_agent)?;
        let url = Url::parse(&config.url).context("failed to parse geocoder url")?;

        Ok(Self { client, url })
    }

    fn reverse_url(&self, latitude: &str, longitude: &str) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("lat", latitude)
            .append_pair("lon", longitude)
            .append_pair("zoom", "18")
            .append_pair("addressdetails", "1");
        url
    }
}

impl PostalCodeLookup for NominatimClient {
    async fn postal_code(&self, latitude: &str, longitude: &str) -> Result<Option<String>> {
        let url = self.reverse_url(latitude, longitude);
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("failed to send reverse geocoding request")?
            .error_for_status()
            .context("reverse geocoding failed")?
            .json::<ReverseResponse>()
            .await
            .context("failed to parse reverse geocoding response")?;

        Ok(postal_code_from(response))
    }
}

fn postal_code_from(response: ReverseResponse) -> Option<String> {
    let address = response.address?;
    address
        .postcode
        .or(address.postal_code)
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
}

/// Best-effort postal code lookup
///
/// Never fails and never waits longer than `timeout`: errors, timeouts and
/// responses without a postal code all yield `None`.
pub async fn lookup_postal_code<L>(
    lookup: &L,
    latitude: &str,
    longitude: &str,
    timeout: Duration,
) -> Option<String>
where
    L: PostalCodeLookup,
{
    match tokio::time::timeout(timeout, lookup.postal_code(latitude, longitude)).await {
        Ok(Ok(Some(code))) if !code.trim().is_empty() => Some(code.trim().to_string()),
        Ok(Ok(_)) => {
            debug!("no postal code known for {latitude},{longitude}");
            None
        }
        Ok(Err(e)) => {
            warn!("failed to get postal code: {e:#}");
            None
        }
        Err(_) => {
            warn!("postal code lookup timed out after {}s", timeout.as_secs());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup(Result<Option<String>, String>);

    impl PostalCodeLookup for FixedLookup {
        async fn postal_code(&self, _latitude: &str, _longitude: &str) -> Result<Option<String>> {
            self.0.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    struct StalledLookup;

    impl PostalCodeLookup for StalledLookup {
        async fn postal_code(&self, _latitude: &str, _longitude: &str) -> Result<Option<String>> {
            std::future::pending().await
        }
    }

    #[test]
    fn reverse_url_contains_query() {
        let client = NominatimClient {
            client: Client::new(),
            url: Url::parse("https://nominatim.openstreetmap.org/reverse").unwrap(),
        };
        assert_eq!(
            client.reverse_url("33.55390", "-117.21390").as_str(),
            "https://nominatim.openstreetmap.org/reverse?format=json&lat=33.55390&lon=-117.21390&zoom=18&addressdetails=1"
        );
    }

    #[test]
    fn postal_code_prefers_postcode() {
        let response: ReverseResponse = serde_json::from_str(
            r#"{"address": {"postcode": "92101", "postal_code": "99999", "city": "San Diego"}}"#,
        )
        .unwrap();
        assert_eq!(postal_code_from(response).as_deref(), Some("92101"));
    }

    #[test]
    fn postal_code_falls_back_to_postal_code_field() {
        let response: ReverseResponse =
            serde_json::from_str(r#"{"address": {"postal_code": "10115"}}"#).unwrap();
        assert_eq!(postal_code_from(response).as_deref(), Some("10115"));
    }

    #[test]
    fn postal_code_missing() {
        let response: ReverseResponse =
            serde_json::from_str(r#"{"address": {"city": "Nowhere"}}"#).unwrap();
        assert_eq!(postal_code_from(response), None);

        let response: ReverseResponse =
            serde_json::from_str(r#"{"error": "Unable to geocode"}"#).unwrap();
        assert_eq!(postal_code_from(response), None);
    }

    #[tokio::test]
    async fn lookup_returns_found_code() {
        let lookup = FixedLookup(Ok(Some("92101".to_string())));
        let code = lookup_postal_code(&lookup, "32.7", "-117.1", Duration::from_secs(1)).await;
        assert_eq!(code.as_deref(), Some("92101"));
    }

    #[tokio::test]
    async fn lookup_swallows_errors() {
        let lookup = FixedLookup(Err("connection refused".to_string()));
        let code = lookup_postal_code(&lookup, "32.7", "-117.1", Duration::from_secs(1)).await;
        assert_eq!(code, None);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_gives_up_after_timeout() {
        let code =
            lookup_postal_code(&StalledLookup, "32.7", "-117.1", Duration::from_secs(10)).await;
        assert_eq!(code, None);
    }
}
