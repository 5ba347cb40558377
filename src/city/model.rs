use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A place as returned by the geocoder. Coordinates stay in their textual
/// form so they survive storage without precision drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub country: String,
    pub lat: String,
    pub lon: String,
}

impl City {
    pub fn new(
        name: impl Into<String>,
        country: impl Into<String>,
        lat: impl Into<String>,
        lon: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
            lat: lat.into(),
            lon: lon.into(),
        }
    }

    pub fn key(&self) -> CityKey {
        CityKey {
            name: self.name.trim().to_lowercase(),
            lat: self.lat.trim().to_string(),
        }
    }

    /// Name up to the first comma; geocoder fallbacks can be full addresses.
    pub fn display_name(&self) -> &str {
        self.name.split(',').next().unwrap_or_default().trim()
    }

    pub fn has_valid_coordinates(&self) -> bool {
        let lat = parse_coordinate(&self.lat);
        let lon = parse_coordinate(&self.lon);
        matches!((lat, lon), (Some(lat), Some(lon))
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon))
    }
}

fn parse_coordinate(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Dedupe identity: trimmed lowercase name plus latitude text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CityKey {
    name: String,
    lat: String,
}

/// Join key assigned when a city enters the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(String);

impl CityId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardEntry {
    pub id: CityId,
    #[serde(flatten)]
    pub city: City,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// A record as found in storage, before the directory cleans it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCity {
    pub id: Option<CityId>,
    pub city: City,
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoredCityRecord {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    lat: Value,
    #[serde(default)]
    lon: Value,
    #[serde(default)]
    timezone: Option<String>,
}

/// Decodes each record on its own; a malformed record is dropped instead of
/// poisoning the whole list.
pub fn decode_stored_cities(records: Vec<Value>) -> Vec<StoredCity> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<StoredCityRecord>(record) {
            Ok(raw) => Some(StoredCity {
                id: raw
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .map(|id| CityId::from(id.as_str())),
                city: City {
                    name: raw.name,
                    country: raw.country,
                    lat: coordinate_text(&raw.lat),
                    lon: coordinate_text(&raw.lon),
                },
                timezone: raw.timezone.filter(|tz| !tz.trim().is_empty()),
            }),
            Err(err) => {
                log::warn!("dropping malformed stored city: {err}");
                None
            }
        })
        .collect()
}

fn coordinate_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockStyle {
    #[default]
    Digital,
    Analog,
}

impl ClockStyle {
    pub fn label(self) -> &'static str {
        match self {
            ClockStyle::Digital => "digital",
            ClockStyle::Analog => "analog",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    #[default]
    Blue,
    Red,
    Green,
}

impl Palette {
    pub const ALL: [Palette; 3] = [Palette::Blue, Palette::Red, Palette::Green];

    pub fn label(self) -> &'static str {
        match self {
            Palette::Blue => "blue",
            Palette::Red => "red",
            Palette::Green => "green",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn key_ignores_case_and_padding() {
        let a = City::new("  Paris ", "France", "48.85", "2.35");
        let b = City::new("paris", "France", "48.85", "9.99");
        let c = City::new("Paris", "France", "33.66", "-95.55");
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn display_name_stops_at_first_comma() {
        let city = City::new("Paris, Île-de-France, France", "France", "48.85", "2.35");
        assert_eq!(city.display_name(), "Paris");
    }

    #[test]
    fn coordinate_validation() {
        assert!(City::new("A", "", "-34.6", "-58.4").has_valid_coordinates());
        assert!(!City::new("A", "", "", "-58.4").has_valid_coordinates());
        assert!(!City::new("A", "", "91", "0").has_valid_coordinates());
        assert!(!City::new("A", "", "10", "NaN").has_valid_coordinates());
        assert!(!City::new("A", "", "north", "0").has_valid_coordinates());
    }

    #[test]
    fn entry_serializes_flat_without_missing_timezone() {
        let entry = DashboardEntry {
            id: CityId::from("id-1"),
            city: City::new("Lima", "Peru", "-12.0464", "-77.0428"),
            timezone: None,
        };
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(
            value,
            json!({"id": "id-1", "name": "Lima", "country": "Peru", "lat": "-12.0464", "lon": "-77.0428"})
        );
    }

    #[test]
    fn legacy_records_decode_leniently() {
        let records = vec![
            json!({"name": "Tokyo", "country": "Japan", "lat": "35.68", "lon": "139.69"}),
            json!({"name": "Oslo", "lat": 59.91, "lon": 10.75, "id": ""}),
            json!({"country": "Nowhere"}),
            json!({"name": "Quito", "lat": null, "lon": "-78.5", "timezone": ""}),
        ];
        let decoded = decode_stored_cities(records);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].id, None);
        assert_eq!(decoded[1].city.lat, "59.91");
        assert_eq!(decoded[1].city.country, "");
        assert_eq!(decoded[1].id, None);
        assert_eq!(decoded[2].city.lat, "");
        assert_eq!(decoded[2].timezone, None);
    }

    #[test]
    fn preferences_use_lowercase_names() {
        assert_eq!(serde_json::to_string(&ClockStyle::Analog).expect("ser"), "\"analog\"");
        assert_eq!(serde_json::to_string(&Palette::Red).expect("ser"), "\"red\"");
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }
}
