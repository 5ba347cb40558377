use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::city::directory::{CityDirectory, DirectoryError};
use crate::city::model::{City, CityId, CityKey, ClockStyle, DashboardEntry, Palette, Theme};
use crate::clock::engine::ClockEngine;
use crate::clock::reading::ClockReading;
use crate::lookup::worker::Ticket;
use crate::store::{DashboardState, KeyValueStore};

pub const NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    expires_at: Instant,
}

/// Single banner slot; a new notice replaces the current one.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<Notice>,
}

impl NoticeBoard {
    pub fn post(&mut self, kind: NoticeKind, text: impl Into<String>, now: Instant) {
        let text = text.into();
        log::debug!("notice: {text}");
        self.current = Some(Notice {
            kind,
            text,
            expires_at: now + NOTICE_TTL,
        });
    }

    pub fn expire(&mut self, now: Instant) {
        if self
            .current
            .as_ref()
            .is_some_and(|notice| now >= notice.expires_at)
        {
            self.current = None;
        }
    }

    pub fn current(&self) -> Option<&Notice> {
        self.current.as_ref()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|notice| notice.expires_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardState {
    Resolving,
    /// Restored entry whose timezone lookup failed. No tick runs.
    Unavailable,
    Live { timezone: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockCard {
    pub id: CityId,
    pub name: String,
    pub country: String,
    pub state: CardState,
}

impl ClockCard {
    fn from_entry(entry: &DashboardEntry, state: CardState) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.city.display_name().to_string(),
            country: entry.city.country.clone(),
            state,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, CardState::Live { .. })
    }
}

/// Timezone lookup the caller must run and answer through
/// [`Dashboard::complete_timezone`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimezoneRequest {
    pub ticket: Ticket,
    pub lat: String,
    pub lon: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(CityId),
    Restored(CityId),
    Failed,
    /// The ticket no longer matches anything, e.g. its card was removed.
    Stale,
}

#[derive(Debug)]
enum PendingOrigin {
    User(City),
    Restore(CityId),
}

#[derive(Debug)]
struct PendingLookup {
    ticket: Ticket,
    origin: PendingOrigin,
}

/// Everything the dashboard window shows, owned by the app. Cards and ticks
/// are only created and destroyed together here.
#[derive(Debug)]
pub struct Dashboard<S> {
    directory: CityDirectory<S>,
    engine: ClockEngine,
    cards: Vec<ClockCard>,
    pending: Vec<PendingLookup>,
    next_ticket: Ticket,
    notices: NoticeBoard,
    dragging: Option<CityId>,
    clock_style: ClockStyle,
    palette: Palette,
    theme: Theme,
}

impl<S: KeyValueStore> Dashboard<S> {
    pub fn new(state: DashboardState<S>) -> Self {
        let clock_style = state.clock_style();
        let palette = state.palette();
        let theme = state.theme();
        Self {
            directory: CityDirectory::new(state),
            engine: ClockEngine::new(),
            cards: Vec::new(),
            pending: Vec::new(),
            next_ticket: 0,
            notices: NoticeBoard::default(),
            dragging: None,
            clock_style,
            palette,
            theme,
        }
    }

    /// Rebuilds every card from the persisted dashboard. Entries with a
    /// stored timezone go live at once; the rest become placeholders whose
    /// requests are returned.
    pub fn restore(
        &mut self,
        now: Instant,
        now_utc: DateTime<Utc>,
    ) -> Result<Vec<TimezoneRequest>, DirectoryError> {
        for card in self.cards.drain(..) {
            self.engine.stop(&card.id);
        }
        self.pending.clear();
        self.dragging = None;

        let entries = self.directory.load()?;
        let mut requests = Vec::new();
        for entry in &entries {
            let known = entry
                .timezone
                .as_deref()
                .and_then(|name| name.parse::<Tz>().ok().map(|tz| (name, tz)));
            match known {
                Some((name, tz)) => {
                    self.cards.push(ClockCard::from_entry(
                        entry,
                        CardState::Live {
                            timezone: name.to_string(),
                        },
                    ));
                    self.engine.start(entry.id.clone(), tz, now, now_utc);
                }
                None => {
                    self.cards
                        .push(ClockCard::from_entry(entry, CardState::Resolving));
                    let ticket = self.issue(PendingOrigin::Restore(entry.id.clone()));
                    requests.push(TimezoneRequest {
                        ticket,
                        lat: entry.city.lat.clone(),
                        lon: entry.city.lon.clone(),
                    });
                }
            }
        }
        log::info!(
            "restored {} card(s), {} waiting on a timezone",
            self.cards.len(),
            requests.len()
        );
        Ok(requests)
    }

    pub fn request_add(&mut self, city: City, now: Instant) -> Option<TimezoneRequest> {
        let in_flight = self.in_flight_keys();
        if let Err(err) = self.directory.check_admission(&city, &in_flight) {
            self.notices.post(NoticeKind::Error, err.to_string(), now);
            return None;
        }
        let (lat, lon) = (city.lat.clone(), city.lon.clone());
        let ticket = self.issue(PendingOrigin::User(city));
        Some(TimezoneRequest { ticket, lat, lon })
    }

    pub fn complete_timezone(
        &mut self,
        ticket: Ticket,
        timezone: Option<String>,
        now: Instant,
        now_utc: DateTime<Utc>,
    ) -> AddOutcome {
        let Some(index) = self.pending.iter().position(|p| p.ticket == ticket) else {
            log::debug!("ignoring timezone for unknown ticket {ticket}");
            return AddOutcome::Stale;
        };
        match self.pending.remove(index).origin {
            PendingOrigin::User(city) => self.finish_add(city, timezone, now, now_utc),
            PendingOrigin::Restore(id) => self.finish_restore(id, timezone, now, now_utc),
        }
    }

    fn finish_add(
        &mut self,
        city: City,
        timezone: Option<String>,
        now: Instant,
        now_utc: DateTime<Utc>,
    ) -> AddOutcome {
        let result = match timezone {
            Some(timezone) => self.directory.commit(city, timezone),
            None => Err(DirectoryError::TimezoneUnresolved {
                name: city.display_name().to_string(),
            }),
        };
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                self.notices.post(NoticeKind::Error, err.to_string(), now);
                return AddOutcome::Failed;
            }
        };
        let Some(tz) = entry.timezone.as_deref().and_then(|t| t.parse::<Tz>().ok()) else {
            return AddOutcome::Failed;
        };
        self.cards.push(ClockCard::from_entry(
            &entry,
            CardState::Live {
                timezone: tz.name().to_string(),
            },
        ));
        self.engine.start(entry.id.clone(), tz, now, now_utc);
        self.notices.post(
            NoticeKind::Info,
            format!("added {}", entry.city.display_name()),
            now,
        );
        AddOutcome::Added(entry.id)
    }

    fn finish_restore(
        &mut self,
        id: CityId,
        timezone: Option<String>,
        now: Instant,
        now_utc: DateTime<Utc>,
    ) -> AddOutcome {
        let Some(index) = self.cards.iter().position(|card| card.id == id) else {
            return AddOutcome::Stale;
        };
        let resolved = timezone.and_then(|name| name.parse::<Tz>().ok().map(|tz| (name, tz)));
        let Some((name, tz)) = resolved else {
            let card = &mut self.cards[index];
            card.state = CardState::Unavailable;
            log::warn!("no timezone for restored '{}'", card.name);
            let err = DirectoryError::TimezoneUnresolved {
                name: card.name.clone(),
            };
            self.notices.post(NoticeKind::Error, err.to_string(), now);
            return AddOutcome::Failed;
        };

        if let Err(err) = self.directory.set_timezone(&id, name.clone()) {
            log::warn!("could not persist timezone for {id}: {err:#}");
        }
        self.cards[index].state = CardState::Live { timezone: name };
        self.engine.start(id.clone(), tz, now, now_utc);
        AddOutcome::Restored(id)
    }

    pub fn remove(&mut self, id: &CityId) -> Result<bool, DirectoryError> {
        self.engine.stop(id);
        self.cards.retain(|card| &card.id != id);
        self.pending
            .retain(|p| !matches!(&p.origin, PendingOrigin::Restore(card) if card == id));
        if self.dragging.as_ref() == Some(id) {
            self.dragging = None;
        }
        Ok(self.directory.remove(id)?.is_some())
    }

    pub fn begin_drag(&mut self, id: &CityId) {
        if self.cards.iter().any(|card| &card.id == id) {
            self.dragging = Some(id.clone());
        }
    }

    /// Moves the dragged card next to `target`: before it when the pointer is
    /// above the target's vertical midpoint, after it otherwise. Returns
    /// whether the visible order changed.
    pub fn drag_over(&mut self, target: &CityId, pointer_y: f32, top: f32, height: f32) -> bool {
        let Some(dragged) = self.dragging.clone() else {
            return false;
        };
        if &dragged == target {
            return false;
        }
        let Some(from) = self.cards.iter().position(|card| card.id == dragged) else {
            return false;
        };
        let before: Vec<CityId> = self.cards.iter().map(|card| card.id.clone()).collect();

        let card = self.cards.remove(from);
        let Some(target_index) = self.cards.iter().position(|c| &c.id == target) else {
            self.cards.insert(from, card);
            return false;
        };
        let insert_at = if pointer_y < top + height / 2.0 {
            target_index
        } else {
            target_index + 1
        };
        self.cards.insert(insert_at, card);

        self.cards
            .iter()
            .map(|card| &card.id)
            .ne(before.iter())
    }

    pub fn end_drag(&mut self) -> Result<(), DirectoryError> {
        if self.dragging.take().is_none() {
            return Ok(());
        }
        let order: Vec<CityId> = self.cards.iter().map(|card| card.id.clone()).collect();
        self.directory.reorder(&order)
    }

    pub fn dragging(&self) -> Option<&CityId> {
        self.dragging.as_ref()
    }

    pub fn set_clock_style(&mut self, style: ClockStyle) -> anyhow::Result<()> {
        self.clock_style = style;
        self.directory.state_mut().set_clock_style(style)
    }

    pub fn set_palette(&mut self, palette: Palette) -> anyhow::Result<()> {
        self.palette = palette;
        self.directory.state_mut().set_palette(palette)
    }

    pub fn set_theme(&mut self, theme: Theme) -> anyhow::Result<()> {
        self.theme = theme;
        self.directory.state_mut().set_theme(theme)
    }

    pub fn clock_style(&self) -> ClockStyle {
        self.clock_style
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn tick(&mut self, now: Instant, now_utc: DateTime<Utc>) -> usize {
        debug_assert_eq!(self.live_ticks(), self.live_cards());
        self.notices.expire(now);
        self.engine.poll(now, now_utc)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [self.engine.next_deadline(), self.notices.next_deadline()]
            .into_iter()
            .flatten()
            .min()
    }

    pub fn notify(&mut self, kind: NoticeKind, text: impl Into<String>, now: Instant) {
        self.notices.post(kind, text, now);
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notices.current()
    }

    pub fn cards(&self) -> &[ClockCard] {
        &self.cards
    }

    pub fn reading(&self, id: &CityId) -> Option<&ClockReading> {
        self.engine.reading(id)
    }

    pub fn live_cards(&self) -> usize {
        self.cards.iter().filter(|card| card.is_live()).count()
    }

    pub fn live_ticks(&self) -> usize {
        self.engine.live_ticks()
    }

    pub fn pending_adds(&self) -> usize {
        self.in_flight_keys().len()
    }

    pub fn directory(&self) -> &CityDirectory<S> {
        &self.directory
    }

    fn in_flight_keys(&self) -> Vec<CityKey> {
        self.pending
            .iter()
            .filter_map(|p| match &p.origin {
                PendingOrigin::User(city) => Some(city.key()),
                PendingOrigin::Restore(_) => None,
            })
            .collect()
    }

    fn issue(&mut self, origin: PendingOrigin) -> Ticket {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.pending.push(PendingLookup { ticket, origin });
        ticket
    }
}
