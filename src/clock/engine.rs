use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::city::model::CityId;
use crate::clock::reading::{ClockReading, read_clock};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct ClockTick {
    timezone: Tz,
    next_due: Instant,
    reading: ClockReading,
}

/// One repeating one-second tick per card. Ticks are independent; each runs
/// on the grid set by its own start moment.
#[derive(Debug, Default)]
pub struct ClockEngine {
    ticks: HashMap<CityId, ClockTick>,
}

impl ClockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders immediately and schedules the next update one period out.
    /// Restarting a card replaces its tick.
    pub fn start(&mut self, card: CityId, timezone: Tz, now: Instant, now_utc: DateTime<Utc>) {
        let tick = ClockTick {
            timezone,
            next_due: now + TICK_PERIOD,
            reading: read_clock(timezone, now_utc),
        };
        if self.ticks.insert(card.clone(), tick).is_some() {
            log::debug!("restarted clock tick for {card}");
        }
    }

    pub fn stop(&mut self, card: &CityId) -> bool {
        self.ticks.remove(card).is_some()
    }

    /// Fires every due tick once and returns how many fired.
    pub fn poll(&mut self, now: Instant, now_utc: DateTime<Utc>) -> usize {
        let mut fired = 0;
        for tick in self.ticks.values_mut() {
            if now < tick.next_due {
                continue;
            }
            tick.reading = read_clock(tick.timezone, now_utc);
            while tick.next_due <= now {
                tick.next_due += TICK_PERIOD;
            }
            fired += 1;
        }
        fired
    }

    pub fn reading(&self, card: &CityId) -> Option<&ClockReading> {
        self.ticks.get(card).map(|tick| &tick.reading)
    }

    pub fn live_ticks(&self) -> usize {
        self.ticks.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.ticks.values().map(|tick| tick.next_due).min()
    }
}
