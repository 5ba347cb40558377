pub mod worker;

use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::city::model::City;

pub const DEFAULT_SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_TIMEZONE_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_USER_AGENT: &str = concat!("worldclock/", env!("CARGO_PKG_VERSION"));

/// External place and timezone resolution. Failures never escape: a failed
/// search is an empty list and a failed timezone lookup is `None`.
pub trait LocationLookup: Send + Sync {
    fn search(&self, query: &str) -> Vec<City>;
    fn timezone(&self, lat: &str, lon: &str) -> Option<String>;
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("response carried no timezone")]
    MissingTimezone,
}

#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub search_url: String,
    pub timezone_url: String,
    pub user_agent: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            timezone_url: DEFAULT_TIMEZONE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub struct HttpLocationLookup {
    client: Client,
    config: LookupConfig,
}

impl HttpLocationLookup {
    pub fn new(config: LookupConfig) -> anyhow::Result<Self> {
        // Lookups are allowed to hang; only the action that issued them waits.
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(None::<Duration>)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn try_search(&self, query: &str) -> Result<Vec<City>, LookupError> {
        let response = self
            .client
            .get(&self.config.search_url)
            .query(&[("q", query), ("format", "json"), ("addressdetails", "1")])
            .send()?;
        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }
        let places = response.json::<Vec<SearchPlace>>()?;
        Ok(places.into_iter().map(SearchPlace::into_city).collect())
    }

    pub fn try_timezone(&self, lat: &str, lon: &str) -> Result<String, LookupError> {
        let response = self
            .client
            .get(&self.config.timezone_url)
            .query(&[
                ("latitude", lat),
                ("longitude", lon),
                ("current", "temperature_2m"),
                ("timezone", "auto"),
            ])
            .send()?;
        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }
        response
            .json::<ForecastResponse>()?
            .timezone
            .filter(|tz| !tz.trim().is_empty())
            .ok_or(LookupError::MissingTimezone)
    }
}

impl LocationLookup for HttpLocationLookup {
    fn search(&self, query: &str) -> Vec<City> {
        match self.try_search(query) {
            Ok(cities) => {
                log::debug!("search {query:?} returned {} place(s)", cities.len());
                cities
            }
            Err(err) => {
                log::warn!("city search for {query:?} failed: {err}");
                Vec::new()
            }
        }
    }

    fn timezone(&self, lat: &str, lon: &str) -> Option<String> {
        match self.try_timezone(lat, lon) {
            Ok(tz) => Some(tz),
            Err(err) => {
                log::warn!("timezone lookup for ({lat}, {lon}) failed: {err}");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPlace {
    #[serde(default)]
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default)]
    address: SearchAddress,
}

#[derive(Debug, Default, Deserialize)]
struct SearchAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    country: Option<String>,
}

impl SearchPlace {
    fn into_city(self) -> City {
        let SearchAddress {
            city,
            town,
            village,
            country,
        } = self.address;
        let name = city.or(town).or(village).unwrap_or(self.display_name);
        City {
            name,
            country: country.unwrap_or_default(),
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    timezone: Option<String>,
}
