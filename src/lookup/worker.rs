use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use crate::city::model::City;
use crate::lookup::LocationLookup;

/// Identifies one pending timezone resolution.
pub type Ticket = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupEvent {
    SearchCompleted { query: String, results: Vec<City> },
    TimezoneResolved { ticket: Ticket, timezone: Option<String> },
}

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Runs each lookup on its own thread and queues the completion for the UI
/// thread. Nothing is ever cancelled; late completions are still delivered.
pub struct LookupWorker {
    lookup: Arc<dyn LocationLookup>,
    events_tx: Sender<LookupEvent>,
    events_rx: Receiver<LookupEvent>,
    waker: Option<Waker>,
}

impl LookupWorker {
    pub fn new(lookup: Arc<dyn LocationLookup>) -> Self {
        let (events_tx, events_rx) = channel();
        Self {
            lookup,
            events_tx,
            events_rx,
            waker: None,
        }
    }

    /// Called after every completion, typically to request a repaint.
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Some(Arc::new(waker));
        self
    }

    pub fn search(&self, query: String) {
        let lookup = Arc::clone(&self.lookup);
        let tx = self.events_tx.clone();
        let waker = self.waker.clone();
        thread::spawn(move || {
            let results = lookup.search(&query);
            let _ = tx.send(LookupEvent::SearchCompleted { query, results });
            if let Some(wake) = waker {
                wake();
            }
        });
    }

    pub fn resolve_timezone(&self, ticket: Ticket, lat: String, lon: String) {
        let lookup = Arc::clone(&self.lookup);
        let tx = self.events_tx.clone();
        let waker = self.waker.clone();
        thread::spawn(move || {
            let timezone = lookup.timezone(&lat, &lon);
            let _ = tx.send(LookupEvent::TimezoneResolved { ticket, timezone });
            if let Some(wake) = waker {
                wake();
            }
        });
    }

    pub fn drain(&self) -> Vec<LookupEvent> {
        self.events_rx.try_iter().collect()
    }
}
