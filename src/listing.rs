use std::fmt::Write as _;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::city::directory::{CityDirectory, MAX_CITIES};
use crate::city::model::DashboardEntry;
use crate::clock::reading::read_clock;
use crate::lookup::LocationLookup;
use crate::store::KeyValueStore;

fn describe_time(entry: &DashboardEntry, now: DateTime<Utc>) -> String {
    match entry.timezone.as_deref().map(|name| (name, name.parse::<Tz>())) {
        Some((name, Ok(tz))) => format!("{name} {}", read_clock(tz, now).digital),
        Some((name, Err(_))) => format!("{name} (unknown timezone)"),
        None => "timezone unresolved".to_string(),
    }
}

fn describe_city(entry: &DashboardEntry) -> String {
    let name = entry.city.display_name();
    if entry.city.country.is_empty() {
        name.to_string()
    } else {
        format!("{name} ({})", entry.city.country)
    }
}

/// Loads (and cleans) the dashboard and renders it as text.
pub fn render_listing<S: KeyValueStore>(
    directory: &mut CityDirectory<S>,
    now: DateTime<Utc>,
) -> Result<String> {
    let entries = directory.load()?;
    let state = directory.state();
    let mut out = String::new();
    writeln!(out, "World clock dashboard")?;
    writeln!(out, "Clock style: {}", state.clock_style().label())?;
    writeln!(out, "Palette: {}", state.palette().label())?;
    writeln!(out, "Theme: {}", state.theme().label())?;
    writeln!(out, "Cities: {}/{MAX_CITIES}", entries.len())?;
    for (index, entry) in entries.iter().enumerate() {
        writeln!(
            out,
            "  {}. {} {}",
            index + 1,
            describe_city(entry),
            describe_time(entry, now)
        )?;
    }
    Ok(out)
}

pub fn run_list<S: KeyValueStore>(directory: &mut CityDirectory<S>) -> Result<()> {
    print!("{}", render_listing(directory, Utc::now())?);
    Ok(())
}

/// Adds the first search hit for `query`. Returns the confirmation line.
pub fn add_first_match<S, L>(
    directory: &mut CityDirectory<S>,
    lookup: &L,
    query: &str,
    now: DateTime<Utc>,
) -> Result<String>
where
    S: KeyValueStore,
    L: LocationLookup + ?Sized,
{
    let query = query.trim();
    if query.chars().count() < crate::search::MIN_QUERY_CHARS {
        bail!(
            "search query must be at least {} characters",
            crate::search::MIN_QUERY_CHARS
        );
    }
    directory.load()?;
    let Some(candidate) = lookup.search(query).into_iter().next() else {
        bail!("no city found for '{query}'");
    };
    let entry = directory.add(candidate, lookup)?;
    Ok(format!(
        "Added {}: {} [{}/{MAX_CITIES}]",
        describe_city(&entry),
        describe_time(&entry, now),
        directory.len()
    ))
}

pub fn run_add<S, L>(directory: &mut CityDirectory<S>, lookup: &L, query: &str) -> Result<()>
where
    S: KeyValueStore,
    L: LocationLookup + ?Sized,
{
    println!("{}", add_first_match(directory, lookup, query, Utc::now())?);
    Ok(())
}
