use std::fmt::Debug;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::GeocodingConfig;

/// One ZIP code and the city the provider reports for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipPlace {
    pub zip: String,
    pub city: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GeocodingError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed geocoding response: {0}")]
    Payload(String),
    #[error("geocoding backend rejected the request: {0}")]
    Backend(String),
}

/// The two read-only endpoints the resolver needs from a geocoding provider.
pub trait GeocodingGateway: Debug {
    fn zips_in_radius(&self, anchor_zip: &str, radius: u32) -> Result<Vec<String>, GeocodingError>;

    /// Places come back in the provider's payload order.
    fn cities_for_zips(&self, zips: &[String]) -> Result<Vec<ZipPlace>, GeocodingError>;
}

/// Blocking Zipcodebase client. The API key travels as the `apikey` query parameter.
pub struct ZipcodebaseClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ZipcodebaseClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, api_key)
    }

    pub fn with_client(
        http: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// `None` when no credential is configured.
    pub fn from_config(config: &GeocodingConfig) -> Option<Self> {
        config
            .api_key
            .as_deref()
            .map(|key| Self::new(config.base_url.clone(), key))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl Debug for ZipcodebaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipcodebaseClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeocodingGateway for ZipcodebaseClient {
    fn zips_in_radius(&self, anchor_zip: &str, radius: u32) -> Result<Vec<String>, GeocodingError> {
        let radius = radius.to_string();
        let response = self
            .http
            .get(self.endpoint("radius"))
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("code", anchor_zip),
                ("radius", radius.as_str()),
                ("country", "us"),
            ])
            .send()?;

        Ok(read_json::<RadiusResponse>(response)?.zip_codes())
    }

    fn cities_for_zips(&self, zips: &[String]) -> Result<Vec<ZipPlace>, GeocodingError> {
        let codes = zips.join(",");
        let response = self
            .http
            .get(self.endpoint("search"))
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("codes", codes.as_str()),
                ("country", "us"),
            ])
            .send()?;

        read_json::<SearchResponse>(response)?.places()
    }
}

/// A non-success status becomes `Backend`, carrying the provider's message body.
fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GeocodingError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(GeocodingError::Backend(format!("{status}: {}", body.trim())));
    }
    Ok(response.json()?)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RadiusResponse {
    #[serde(default)]
    results: Vec<RadiusEntry>,
}

#[derive(Debug, Deserialize)]
struct RadiusEntry {
    code: String,
}

impl RadiusResponse {
    pub(crate) fn zip_codes(self) -> Vec<String> {
        self.results.into_iter().map(|entry| entry.code).collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    results: SearchResults,
}

/// Zipcodebase answers `"results": []` instead of an empty object when no code matched.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResults {
    ByZip(Map<String, Value>),
    Empty(Vec<Value>),
}

impl Default for SearchResults {
    fn default() -> Self {
        Self::Empty(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct PlaceInfo {
    #[serde(default)]
    city: Option<String>,
}

impl SearchResponse {
    pub(crate) fn places(self) -> Result<Vec<ZipPlace>, GeocodingError> {
        let by_zip = match self.results {
            SearchResults::ByZip(by_zip) => by_zip,
            SearchResults::Empty(_) => return Ok(Vec::new()),
        };

        by_zip
            .into_iter()
            .map(|(zip, entries)| {
                let infos: Vec<PlaceInfo> = serde_json::from_value(entries)
                    .map_err(|err| GeocodingError::Payload(format!("zip {zip}: {err}")))?;
                let city = infos.into_iter().next().and_then(|info| info.city);
                Ok(ZipPlace { zip, city })
            })
            .collect()
    }
}
