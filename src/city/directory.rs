use std::collections::HashSet;

use chrono_tz::Tz;
use thiserror::Error;

use crate::city::model::{City, CityId, CityKey, DashboardEntry};
use crate::lookup::LocationLookup;
use crate::store::{DashboardState, KeyValueStore};

pub const MAX_CITIES: usize = 8;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("'{name}' is already on the dashboard")]
    Duplicate { name: String },
    #[error("limit of {max} clocks reached")]
    CapacityExceeded { max: usize },
    #[error("could not resolve a timezone for '{name}'")]
    TimezoneUnresolved { name: String },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Ordered, deduplicated list of added cities. Every mutation rewrites the
/// whole persisted sequence.
#[derive(Debug)]
pub struct CityDirectory<S> {
    state: DashboardState<S>,
    entries: Vec<DashboardEntry>,
}

impl<S: KeyValueStore> CityDirectory<S> {
    pub fn new(state: DashboardState<S>) -> Self {
        Self {
            state,
            entries: Vec::new(),
        }
    }

    pub fn state(&self) -> &DashboardState<S> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DashboardState<S> {
        &mut self.state
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[DashboardEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load(&mut self) -> Result<Vec<DashboardEntry>, DirectoryError> {
        let stored = self.state.stored_cities();
        let stored_count = stored.len();
        let mut seen_keys = HashSet::new();
        let mut seen_ids = HashSet::new();
        let mut cleaned = Vec::with_capacity(stored_count);

        for record in stored {
            if !record.city.has_valid_coordinates() {
                log::debug!("dropping '{}' without valid coordinates", record.city.name);
                continue;
            }
            if !seen_keys.insert(record.city.key()) {
                log::debug!("dropping duplicate '{}'", record.city.name);
                continue;
            }
            let id = record
                .id
                .filter(|id| !seen_ids.contains(id))
                .unwrap_or_else(CityId::generate);
            seen_ids.insert(id.clone());
            cleaned.push(DashboardEntry {
                id,
                city: record.city,
                timezone: record.timezone,
            });
        }

        if cleaned.len() > MAX_CITIES {
            log::warn!(
                "stored dashboard holds {} cities, keeping the first {MAX_CITIES}",
                cleaned.len()
            );
            cleaned.truncate(MAX_CITIES);
        }
        if cleaned.len() != stored_count {
            log::info!(
                "cleaned stored dashboard from {stored_count} to {} cities",
                cleaned.len()
            );
        }

        self.state.save_cities(&cleaned)?;
        self.entries = cleaned.clone();
        Ok(cleaned)
    }

    /// Fails if `candidate` would duplicate a present or in-flight city, or
    /// if the dashboard (counting in-flight adds) is full.
    pub fn check_admission(
        &self,
        candidate: &City,
        in_flight: &[CityKey],
    ) -> Result<(), DirectoryError> {
        let key = candidate.key();
        let duplicate = self.entries.iter().any(|entry| entry.city.key() == key)
            || in_flight.contains(&key);
        if duplicate {
            return Err(DirectoryError::Duplicate {
                name: candidate.display_name().to_string(),
            });
        }
        if self.entries.len() + in_flight.len() >= MAX_CITIES {
            return Err(DirectoryError::CapacityExceeded { max: MAX_CITIES });
        }
        Ok(())
    }

    pub fn commit(
        &mut self,
        candidate: City,
        timezone: String,
    ) -> Result<DashboardEntry, DirectoryError> {
        self.check_admission(&candidate, &[])?;
        if timezone.parse::<Tz>().is_err() {
            log::warn!("unknown timezone {timezone:?} for '{}'", candidate.name);
            return Err(DirectoryError::TimezoneUnresolved {
                name: candidate.display_name().to_string(),
            });
        }

        let entry = DashboardEntry {
            id: CityId::generate(),
            city: candidate,
            timezone: Some(timezone),
        };
        self.entries.push(entry.clone());
        if let Err(err) = self.state.save_cities(&self.entries) {
            self.entries.pop();
            return Err(err.into());
        }
        log::info!(
            "added '{}' ({}) as {}",
            entry.city.name,
            entry.timezone.as_deref().unwrap_or_default(),
            entry.id
        );
        Ok(entry)
    }

    /// Admission check, timezone resolution and commit in one blocking call.
    pub fn add<L>(&mut self, candidate: City, lookup: &L) -> Result<DashboardEntry, DirectoryError>
    where
        L: LocationLookup + ?Sized,
    {
        self.check_admission(&candidate, &[])?;
        let Some(timezone) = lookup.timezone(&candidate.lat, &candidate.lon) else {
            return Err(DirectoryError::TimezoneUnresolved {
                name: candidate.display_name().to_string(),
            });
        };
        self.commit(candidate, timezone)
    }

    pub fn remove(&mut self, id: &CityId) -> Result<Option<DashboardEntry>, DirectoryError> {
        let removed = self
            .entries
            .iter()
            .position(|entry| &entry.id == id)
            .map(|index| self.entries.remove(index));
        self.state.save_cities(&self.entries)?;
        if let Some(entry) = &removed {
            log::info!("removed '{}' ({})", entry.city.name, entry.id);
        }
        Ok(removed)
    }

    /// Rewrites the order to follow `ids`. Entries missing from `ids` are
    /// dropped; unknown ids are ignored.
    pub fn reorder(&mut self, ids: &[CityId]) -> Result<(), DirectoryError> {
        let mut remaining = std::mem::take(&mut self.entries);
        let mut reordered = Vec::with_capacity(remaining.len());
        for id in ids {
            if let Some(index) = remaining.iter().position(|entry| &entry.id == id) {
                reordered.push(remaining.remove(index));
            }
        }
        for dropped in &remaining {
            log::warn!(
                "'{}' had no card during reorder and was dropped",
                dropped.city.name
            );
        }
        self.entries = reordered;
        self.state.save_cities(&self.entries)?;
        Ok(())
    }

    pub fn set_timezone(&mut self, id: &CityId, timezone: String) -> Result<bool, DirectoryError> {
        let Some(entry) = self.entries.iter_mut().find(|entry| &entry.id == id) else {
            return Ok(false);
        };
        entry.timezone = Some(timezone);
        self.state.save_cities(&self.entries)?;
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::store::{MemoryStore, STORED_CITIES_KEY};

    /// Lookup answering from a fixed table, counting timezone requests.
    pub(crate) struct TableLookup {
        pub timezone: Option<&'static str>,
        pub timezone_calls: Mutex<usize>,
    }

    impl TableLookup {
        pub(crate) fn resolving(timezone: &'static str) -> Self {
            Self {
                timezone: Some(timezone),
                timezone_calls: Mutex::new(0),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                timezone: None,
                timezone_calls: Mutex::new(0),
            }
        }
    }

    impl LocationLookup for TableLookup {
        fn search(&self, _query: &str) -> Vec<City> {
            Vec::new()
        }

        fn timezone(&self, _lat: &str, _lon: &str) -> Option<String> {
            *self.timezone_calls.lock().expect("lock") += 1;
            self.timezone.map(str::to_string)
        }
    }

    pub(crate) fn city(n: usize) -> City {
        City::new(format!("City {n}"), "Testland", format!("{n}.5"), "10.25")
    }

    fn directory_with(stored: serde_json::Value) -> CityDirectory<MemoryStore> {
        let mut store = MemoryStore::new();
        store
            .set(STORED_CITIES_KEY, stored.to_string())
            .expect("seed");
        CityDirectory::new(DashboardState::new(store))
    }

    fn empty_directory() -> CityDirectory<MemoryStore> {
        CityDirectory::new(DashboardState::new(MemoryStore::new()))
    }

    fn names(directory: &CityDirectory<MemoryStore>) -> Vec<String> {
        directory
            .entries()
            .iter()
            .map(|entry| entry.city.name.clone())
            .collect()
    }

    #[test]
    fn load_drops_invalid_and_duplicate_records() {
        let mut directory = directory_with(json!([
            {"name": "Paris", "country": "France", "lat": "48.85", "lon": "2.35"},
            {"name": "Nowhere", "country": "", "lat": "", "lon": "1"},
            {"name": " paris ", "country": "France", "lat": "48.85", "lon": "2.35"},
            {"name": "Paris", "country": "United States", "lat": "33.66", "lon": "-95.55"},
            {"name": "Lima", "country": "Peru", "lat": "-12.04", "lon": "-77.04", "timezone": "America/Lima"}
        ]));

        let loaded = directory.load().expect("load");

        let loaded_names: Vec<_> = loaded.iter().map(|e| e.city.country.as_str()).collect();
        assert_eq!(loaded_names, vec!["France", "United States", "Peru"]);
        assert_eq!(loaded[2].timezone.as_deref(), Some("America/Lima"));
        assert_eq!(directory.state().stored_cities().len(), 3);
    }

    #[test]
    fn load_is_idempotent() {
        let mut directory = directory_with(json!([
            {"name": "Oslo", "country": "Norway", "lat": "59.91", "lon": "10.75"},
            {"name": "Oslo", "country": "Norway", "lat": "59.91", "lon": "10.75"},
            {"name": "Cairo", "country": "Egypt", "lat": "30.04", "lon": "31.23"}
        ]));

        let first = directory.load().expect("first load");
        let persisted_after_first = directory.state().store().get(STORED_CITIES_KEY);
        let second = directory.load().expect("second load");
        let persisted_after_second = directory.state().store().get(STORED_CITIES_KEY);

        assert_eq!(first, second);
        assert_eq!(persisted_after_first, persisted_after_second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn load_keeps_at_most_the_capacity() {
        let records: Vec<_> = (0..10)
            .map(|n| json!({"name": format!("C{n}"), "lat": format!("{n}"), "lon": "0"}))
            .collect();
        let mut directory = directory_with(serde_json::Value::Array(records));
        assert_eq!(directory.load().expect("load").len(), MAX_CITIES);
    }

    #[test]
    fn load_replaces_colliding_ids() {
        let mut directory = directory_with(json!([
            {"id": "same", "name": "A", "lat": "1", "lon": "1"},
            {"id": "same", "name": "B", "lat": "2", "lon": "2"}
        ]));
        let loaded = directory.load().expect("load");
        assert_eq!(loaded[0].id, CityId::from("same"));
        assert_ne!(loaded[1].id, CityId::from("same"));
    }

    #[test]
    fn ninth_add_exceeds_capacity_and_changes_nothing() {
        let mut directory = empty_directory();
        let lookup = TableLookup::resolving("Europe/Paris");
        for n in 0..MAX_CITIES {
            directory.add(city(n), &lookup).expect("add within capacity");
        }
        let before = directory.entries().to_vec();

        let err = directory.add(city(99), &lookup).expect_err("ninth add");

        assert!(matches!(err, DirectoryError::CapacityExceeded { max: 8 }));
        assert_eq!(directory.entries(), before.as_slice());
        assert_eq!(directory.state().stored_cities().len(), MAX_CITIES);
        assert_eq!(*lookup.timezone_calls.lock().expect("lock"), MAX_CITIES);
    }

    #[test]
    fn duplicate_add_is_rejected_before_lookup() {
        let mut directory = empty_directory();
        let lookup = TableLookup::resolving("Asia/Tokyo");
        directory
            .add(City::new("Tokyo", "Japan", "35.68", "139.69"), &lookup)
            .expect("first add");

        let err = directory
            .add(City::new("  TOKYO", "Japan", "35.68", "139.00"), &lookup)
            .expect_err("duplicate");

        assert!(matches!(err, DirectoryError::Duplicate { ref name } if name == "TOKYO"));
        assert_eq!(directory.len(), 1);
        assert_eq!(*lookup.timezone_calls.lock().expect("lock"), 1);
    }

    #[test]
    fn add_returns_resolved_timezone_and_persists() {
        let mut directory = empty_directory();
        let entry = directory
            .add(city(1), &TableLookup::resolving("America/Argentina/Buenos_Aires"))
            .expect("add");

        assert_eq!(entry.timezone.as_deref(), Some("America/Argentina/Buenos_Aires"));
        let stored = directory.state().stored_cities();
        assert_eq!(stored[0].id.as_ref(), Some(&entry.id));
    }

    #[test]
    fn unresolved_or_unknown_timezone_aborts_add() {
        let mut directory = empty_directory();
        let err = directory
            .add(city(1), &TableLookup::failing())
            .expect_err("no timezone");
        assert!(matches!(err, DirectoryError::TimezoneUnresolved { .. }));

        let err = directory
            .add(city(1), &TableLookup::resolving("Mars/Olympus_Mons"))
            .expect_err("unknown timezone");
        assert!(matches!(err, DirectoryError::TimezoneUnresolved { .. }));
        assert!(directory.is_empty());
    }

    #[test]
    fn in_flight_adds_count_toward_admission() {
        let mut directory = empty_directory();
        let lookup = TableLookup::resolving("UTC");
        for n in 0..6 {
            directory.add(city(n), &lookup).expect("add");
        }
        let pending = vec![city(50).key(), city(51).key()];

        assert!(matches!(
            directory.check_admission(&city(52), &pending),
            Err(DirectoryError::CapacityExceeded { .. })
        ));
        assert!(matches!(
            directory.check_admission(&city(50), &pending[..1]),
            Err(DirectoryError::Duplicate { .. })
        ));
        assert!(directory.check_admission(&city(52), &pending[..1]).is_ok());
    }

    #[test]
    fn remove_mid_list_survives_reload_in_order() {
        let mut directory = empty_directory();
        let lookup = TableLookup::resolving("UTC");
        let ids: Vec<_> = (0..4)
            .map(|n| directory.add(city(n), &lookup).expect("add").id)
            .collect();

        directory.remove(&ids[1]).expect("remove");
        directory.remove(&CityId::from("missing")).expect("absent remove is a no-op");

        let mut reloaded = CityDirectory::new(DashboardState::new(
            directory.state().store().clone(),
        ));
        reloaded.load().expect("reload");
        assert_eq!(names(&reloaded), vec!["City 0", "City 2", "City 3"]);
    }

    #[test]
    fn reorder_follows_ids_and_drops_unmatched() {
        let mut directory = empty_directory();
        let lookup = TableLookup::resolving("UTC");
        let ids: Vec<_> = (0..3)
            .map(|n| directory.add(city(n), &lookup).expect("add").id)
            .collect();

        directory
            .reorder(&[ids[2].clone(), CityId::from("ghost"), ids[0].clone()])
            .expect("reorder");

        assert_eq!(names(&directory), vec!["City 2", "City 0"]);
        assert_eq!(directory.state().stored_cities().len(), 2);
    }

    #[test]
    fn set_timezone_updates_known_entries_only() {
        let mut directory = directory_with(json!([
            {"id": "x", "name": "Quito", "lat": "-0.18", "lon": "-78.47"}
        ]));
        directory.load().expect("load");

        assert!(directory
            .set_timezone(&CityId::from("x"), "America/Guayaquil".to_string())
            .expect("set"));
        assert!(!directory
            .set_timezone(&CityId::from("y"), "UTC".to_string())
            .expect("set"));
        assert_eq!(
            directory.state().stored_cities()[0].timezone.as_deref(),
            Some("America/Guayaquil")
        );
    }
}
