mod gateway;
#[cfg(test)]
mod stub_server;

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::{CleaningConfig, GeocodingConfig};

pub use gateway::{GeocodingError, GeocodingGateway, ZipPlace, ZipcodebaseClient};

/// ZIP codes are resolved to cities this many at a time.
pub const SEARCH_BATCH_SIZE: usize = 10;

/// Center and radius of the area whose cities are resolvable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchArea {
    pub anchor_zip: String,
    pub radius: u32,
}

impl SearchArea {
    pub fn from_config(config: &GeocodingConfig) -> Self {
        Self {
            anchor_zip: config.anchor_zip.clone(),
            radius: config.radius,
        }
    }
}

/// Lowercase city name to a single ZIP code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityZipMap {
    entries: HashMap<String, String>,
}

impl CityZipMap {
    /// Queries the radius endpoint, then resolves the ZIPs in batches. When several
    /// ZIPs report the same city the last one seen wins.
    pub fn build(
        gateway: &dyn GeocodingGateway,
        area: &SearchArea,
    ) -> Result<Self, GeocodingError> {
        let zips = gateway.zips_in_radius(&area.anchor_zip, area.radius)?;
        info!(
            zip_count = zips.len(),
            anchor = %area.anchor_zip,
            radius = area.radius,
            "found ZIP codes in radius"
        );

        let mut map = Self::default();
        for batch in zips.chunks(SEARCH_BATCH_SIZE) {
            for place in gateway.cities_for_zips(batch)? {
                if let Some(city) = place.city {
                    map.insert(&city, place.zip);
                }
            }
        }

        Ok(map)
    }

    pub fn insert(&mut self, city: &str, zip: impl Into<String>) {
        let zip = zip.into();
        if city.is_empty() || zip.is_empty() {
            return;
        }
        self.entries.insert(city.to_lowercase(), zip);
    }

    pub fn get(&self, city: &str) -> Option<&str> {
        self.entries.get(&city.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C, Z> FromIterator<(C, Z)> for CityZipMap
where
    C: AsRef<str>,
    Z: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (C, Z)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (city, zip) in iter {
            map.insert(city.as_ref(), zip);
        }
        map
    }
}

/// Caps how many rows a single run may fill from the city map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupBudget {
    used: usize,
    limit: usize,
}

impl LookupBudget {
    pub fn new(limit: usize) -> Self {
        Self { used: 0, limit }
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used)
    }

    fn consume(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.used += 1;
        true
    }
}

/// Serves city to ZIP answers out of a map built once, up to a fixed budget.
#[derive(Debug, Clone)]
pub struct ZipResolver {
    map: CityZipMap,
    budget: LookupBudget,
}

impl ZipResolver {
    pub fn new(map: CityZipMap, budget: LookupBudget) -> Self {
        Self { map, budget }
    }

    /// Never fails: a geocoding error is logged and leaves the map empty.
    pub fn build(
        gateway: &dyn GeocodingGateway,
        area: &SearchArea,
        budget: LookupBudget,
    ) -> Self {
        info!(
            anchor = %area.anchor_zip,
            radius = area.radius,
            "building city to ZIP map"
        );
        let map = match CityZipMap::build(gateway, area) {
            Ok(map) => map,
            Err(err) => {
                warn!(error = %err, "failed to build city to ZIP map; lookups disabled");
                CityZipMap::default()
            }
        };
        info!(entries = map.len(), "city to ZIP map built");
        Self::new(map, budget)
    }

    /// Builds against Zipcodebase when a key is configured, otherwise starts empty.
    pub fn from_config(geocoding: &GeocodingConfig, cleaning: &CleaningConfig) -> Self {
        let budget = LookupBudget::new(cleaning.lookup_budget);
        match ZipcodebaseClient::from_config(geocoding) {
            Some(client) => Self::build(&client, &SearchArea::from_config(geocoding), budget),
            None => {
                warn!("ZIPCODEBASE_API_KEY is not set; ZIP lookups disabled");
                Self::offline(budget)
            }
        }
    }

    pub fn offline(budget: LookupBudget) -> Self {
        Self::new(CityZipMap::default(), budget)
    }

    /// `state` is accepted for call-site clarity but cities match across all states.
    pub fn lookup_zip(&mut self, city: &str, state: &str) -> Option<String> {
        if city.is_empty() || self.budget.is_exhausted() {
            return None;
        }

        let zip = self.map.get(city)?.to_string();
        if !self.budget.consume() {
            return None;
        }
        debug!(city, state, zip = %zip, used = self.budget.used(), "resolved ZIP from city map");
        Some(zip)
    }

    pub fn budget(&self) -> &LookupBudget {
        &self.budget
    }

    pub fn map(&self) -> &CityZipMap {
        &self.map
    }
}
