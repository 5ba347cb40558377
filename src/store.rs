use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::city::model::{
    ClockStyle, DashboardEntry, Palette, StoredCity, Theme, decode_stored_cities,
};

pub const STORED_CITIES_KEY: &str = "storedCities";
pub const CLOCK_STYLE_KEY: &str = "clockType";
pub const PALETTE_KEY: &str = "colorPalette";
pub const THEME_KEY: &str = "theme";

const STORE_FILE_VERSION: u32 = 1;

/// String-keyed store of JSON text values, the way a browser's local storage
/// holds them.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// File-backed store. Every write rewrites the whole file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no dashboard state at {}, starting empty", path.display());
            return Ok(Self {
                path: path.to_path_buf(),
                values: BTreeMap::new(),
            });
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("unable to read dashboard state {}", path.display()))?;
        let values = parse_store_text(&content)?;
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let payload = StoreFile {
            version: STORE_FILE_VERSION,
            values: self.values.clone(),
        };
        let text = serde_json::to_string_pretty(&payload)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("unable to create {}", parent.display()))?;
        }
        fs::write(&self.path, format!("{text}\n"))
            .with_context(|| format!("unable to write dashboard state {}", self.path.display()))?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}

fn parse_store_text(content: &str) -> Result<BTreeMap<String, String>> {
    let raw = serde_json::from_str::<StoreFile>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if raw.version != STORE_FILE_VERSION {
        bail!(
            "unsupported dashboard state version {}; expected version {STORE_FILE_VERSION}",
            raw.version
        );
    }
    Ok(raw.values)
}

/// Typed view over the four persisted dashboard keys.
#[derive(Debug)]
pub struct DashboardState<S> {
    store: S,
}

impl<S: KeyValueStore> DashboardState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stored_cities(&self) -> Vec<StoredCity> {
        let Some(text) = self.store.get(STORED_CITIES_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<Value>>(&text) {
            Ok(records) => decode_stored_cities(records),
            Err(err) => {
                log::warn!("discarding unreadable {STORED_CITIES_KEY} value: {err}");
                Vec::new()
            }
        }
    }

    pub fn save_cities(&mut self, entries: &[DashboardEntry]) -> Result<()> {
        let text = serde_json::to_string(entries)?;
        self.store.set(STORED_CITIES_KEY, text)
    }

    pub fn clock_style(&self) -> ClockStyle {
        self.scalar(CLOCK_STYLE_KEY).unwrap_or_default()
    }

    pub fn set_clock_style(&mut self, style: ClockStyle) -> Result<()> {
        self.set_scalar(CLOCK_STYLE_KEY, &style)
    }

    pub fn palette(&self) -> Palette {
        self.scalar(PALETTE_KEY).unwrap_or_default()
    }

    pub fn set_palette(&mut self, palette: Palette) -> Result<()> {
        self.set_scalar(PALETTE_KEY, &palette)
    }

    pub fn theme(&self) -> Theme {
        self.scalar(THEME_KEY).unwrap_or_default()
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.set_scalar(THEME_KEY, &theme)
    }

    fn scalar<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = self.store.get(key)?;
        // browsers stored these as bare words, not JSON strings
        let parsed = serde_json::from_str(&text)
            .or_else(|_| serde_json::from_value(Value::String(text.clone())));
        match parsed {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("ignoring unreadable {key} value {text:?}: {err}");
                None
            }
        }
    }

    fn set_scalar<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.store.set(key, text)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::city::model::{City, CityId};

    fn entry(id: &str, name: &str, lat: &str) -> DashboardEntry {
        DashboardEntry {
            id: CityId::from(id),
            city: City::new(name, "Somewhere", lat, "2.3522"),
            timezone: Some("Europe/Paris".to_string()),
        }
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempdir().expect("tempdir");
        let store = JsonFileStore::open(&dir.path().join("none.json")).expect("open");
        assert!(store.get(STORED_CITIES_KEY).is_none());
    }

    #[test]
    fn file_store_round_trips_values_across_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("dashboard.json");
        let mut store = JsonFileStore::open(&path).expect("open");
        store.set(THEME_KEY, "\"dark\"".to_string()).expect("set");

        let reopened = JsonFileStore::open(&path).expect("reopen");
        assert_eq!(reopened.get(THEME_KEY).as_deref(), Some("\"dark\""));
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn malformed_file_reports_position() {
        let err = parse_store_text("{ not-json").expect_err("should fail");
        assert!(err.to_string().contains("invalid JSON at line 1"));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let err = parse_store_text(r#"{"version": 7, "values": {}}"#).expect_err("should fail");
        assert!(err.to_string().contains("unsupported dashboard state version 7"));
    }

    #[test]
    fn preferences_default_when_absent_or_garbled() {
        let mut store = MemoryStore::new();
        store.set(PALETTE_KEY, "purple".to_string()).expect("set");
        let state = DashboardState::new(store);
        assert_eq!(state.clock_style(), ClockStyle::Digital);
        assert_eq!(state.palette(), Palette::Blue);
        assert_eq!(state.theme(), Theme::Light);
    }

    #[test]
    fn bare_word_preferences_are_accepted() {
        let mut store = MemoryStore::new();
        store.set(THEME_KEY, "dark".to_string()).expect("set");
        store.set(CLOCK_STYLE_KEY, "analog".to_string()).expect("set");
        let state = DashboardState::new(store);
        assert_eq!(state.theme(), Theme::Dark);
        assert_eq!(state.clock_style(), ClockStyle::Analog);
    }

    #[test]
    fn preferences_persist_as_json_strings() {
        let mut state = DashboardState::new(MemoryStore::new());
        state.set_clock_style(ClockStyle::Analog).expect("style");
        state.set_palette(Palette::Green).expect("palette");
        state.set_theme(Theme::Dark).expect("theme");

        assert_eq!(state.store().get(CLOCK_STYLE_KEY).as_deref(), Some("\"analog\""));
        assert_eq!(state.clock_style(), ClockStyle::Analog);
        assert_eq!(state.palette(), Palette::Green);
        assert_eq!(state.theme(), Theme::Dark);
    }

    #[test]
    fn coordinates_stay_strings_in_storage() {
        let mut state = DashboardState::new(MemoryStore::new());
        state
            .save_cities(&[entry("a", "Paris", "48.8588897")])
            .expect("save");

        let text = state.store().get(STORED_CITIES_KEY).expect("stored");
        assert!(text.contains("\"lat\":\"48.8588897\""));
        let back = state.stored_cities();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].id, Some(CityId::from("a")));
        assert_eq!(back[0].city, City::new("Paris", "Somewhere", "48.8588897", "2.3522"));
        assert_eq!(back[0].timezone.as_deref(), Some("Europe/Paris"));
    }

    #[test]
    fn garbled_city_list_reads_as_empty() {
        let mut store = MemoryStore::new();
        store.set(STORED_CITIES_KEY, "{oops".to_string()).expect("set");
        let state = DashboardState::new(store);
        assert!(state.stored_cities().is_empty());
    }
}
