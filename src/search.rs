use std::time::{Duration, Instant};

use crate::city::model::City;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const MIN_QUERY_CHARS: usize = 3;

/// Search box state: debounced input, result list visibility and selection.
/// It never performs lookups itself; callers issue the queries it hands out.
#[derive(Debug)]
pub struct SearchBox {
    query: String,
    debounce: Duration,
    fire_at: Option<Instant>,
    results: Vec<City>,
    results_visible: bool,
}

impl SearchBox {
    pub fn new(debounce: Duration) -> Self {
        Self {
            query: String::new(),
            debounce,
            fire_at: None,
            results: Vec::new(),
            results_visible: false,
        }
    }

    #[cfg(test)]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Mutable access for text widgets; follow every edit with `on_input`.
    pub fn query_mut(&mut self) -> &mut String {
        &mut self.query
    }

    pub fn results(&self) -> &[City] {
        &self.results
    }

    pub fn results_visible(&self) -> bool {
        self.results_visible && !self.results.is_empty()
    }

    pub fn on_input(&mut self, now: Instant) {
        self.fire_at = Some(now + self.debounce);
    }

    /// Returns the query to look up once the quiet period has passed. Short
    /// queries hide the result list instead.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        let fire_at = self.fire_at?;
        if now < fire_at {
            return None;
        }
        self.fire_at = None;
        self.qualifying_query()
    }

    pub fn on_focus(&mut self) -> Option<String> {
        self.fire_at = None;
        self.qualifying_query()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.fire_at
    }

    /// Shows a completed search. Completions are never discarded, even when
    /// the query has moved on.
    pub fn show_results(&mut self, query: &str, results: Vec<City>) {
        log::debug!("showing {} result(s) for {query:?}", results.len());
        self.results_visible = !results.is_empty();
        self.results = results;
    }

    pub fn dismiss(&mut self) {
        self.results_visible = false;
    }

    pub fn select(&mut self, index: usize) -> Option<City> {
        let city = self.results.get(index).cloned()?;
        self.results_visible = false;
        Some(city)
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.fire_at = None;
        self.results_visible = false;
    }

    fn qualifying_query(&mut self) -> Option<String> {
        if self.query.chars().count() < MIN_QUERY_CHARS {
            self.results_visible = false;
            return None;
        }
        Some(self.query.clone())
    }
}

impl Default for SearchBox {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn type_text(search: &mut SearchBox, text: &str, now: Instant) {
        *search.query_mut() = text.to_string();
        search.on_input(now);
    }

    fn paris() -> City {
        City::new("Paris", "France", "48.85", "2.35")
    }

    #[test]
    fn short_query_never_reaches_lookup() {
        let t0 = Instant::now();
        let mut search = SearchBox::default();
        search.show_results("paris", vec![paris()]);
        type_text(&mut search, "pa", t0);

        assert_eq!(search.poll(t0 + ms(1_000)), None);
        assert!(!search.results_visible());
    }

    #[test]
    fn keystrokes_inside_window_issue_one_lookup() {
        let t0 = Instant::now();
        let mut search = SearchBox::default();
        let mut issued = Vec::new();

        type_text(&mut search, "par", t0);
        issued.extend(search.poll(t0 + ms(100)));
        type_text(&mut search, "pari", t0 + ms(150));
        issued.extend(search.poll(t0 + ms(250)));
        type_text(&mut search, "paris", t0 + ms(290));
        issued.extend(search.poll(t0 + ms(500)));
        issued.extend(search.poll(t0 + ms(590)));
        issued.extend(search.poll(t0 + ms(2_000)));

        assert_eq!(issued, vec!["paris".to_string()]);
    }

    #[test]
    fn shrinking_below_minimum_before_debounce_hides() {
        let t0 = Instant::now();
        let mut search = SearchBox::default();
        type_text(&mut search, "rome", t0);
        search.show_results("rome", vec![paris()]);
        type_text(&mut search, "ro", t0 + ms(100));

        assert_eq!(search.poll(t0 + ms(400)), None);
        assert!(!search.results_visible());
    }

    #[test]
    fn focus_reissues_qualifying_query() {
        let t0 = Instant::now();
        let mut search = SearchBox::default();
        type_text(&mut search, "lisbon", t0);
        assert_eq!(search.poll(t0 + ms(300)), Some("lisbon".to_string()));
        search.show_results("lisbon", vec![City::new("Lisbon", "Portugal", "38.7", "-9.1")]);
        search.dismiss();
        assert!(!search.results_visible());
        assert_eq!(search.query(), "lisbon");

        assert_eq!(search.on_focus(), Some("lisbon".to_string()));
        search.show_results("lisbon", vec![City::new("Lisbon", "Portugal", "38.7", "-9.1")]);
        assert!(search.results_visible());

        type_text(&mut search, "li", t0);
        assert_eq!(search.on_focus(), None);
    }

    #[test]
    fn empty_results_hide_the_list() {
        let mut search = SearchBox::default();
        search.show_results("zzz", Vec::new());
        assert!(!search.results_visible());
    }

    #[test]
    fn select_hides_and_returns_city() {
        let mut search = SearchBox::default();
        search.show_results("paris", vec![paris()]);
        assert_eq!(search.select(3), None);
        assert!(search.results_visible());
        assert_eq!(search.select(0), Some(paris()));
        assert!(!search.results_visible());
    }

    #[test]
    fn clear_resets_text_and_pending_query() {
        let t0 = Instant::now();
        let mut search = SearchBox::default();
        type_text(&mut search, "berlin", t0);
        search.clear();
        assert_eq!(search.query(), "");
        assert_eq!(search.next_deadline(), None);
        assert_eq!(search.poll(t0 + ms(1_000)), None);
    }
}
