use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use eframe::egui::{
    self, Align, Color32, Layout, Rect, RichText, ScrollArea, Sense, Stroke, TextEdit,
    TopBottomPanel, Ui,
};

use crate::city::directory::MAX_CITIES;
use crate::city::model::{CityId, ClockStyle, Palette, Theme};
use crate::dashboard::{AddOutcome, CardState, ClockCard, Dashboard, NoticeKind, TimezoneRequest};
use crate::lookup::LocationLookup;
use crate::lookup::worker::{LookupEvent, LookupWorker};
use crate::search::SearchBox;
use crate::store::KeyValueStore;
use crate::ui::clock_face::{show_analog, show_digital};
use crate::ui::theme::{CardColors, card_colors, configure_theme, shades};

/// Opens the dashboard window. `dashboard` must not have been restored yet.
pub fn run_gui<S>(
    mut dashboard: Dashboard<S>,
    lookup: Arc<dyn LocationLookup>,
    debounce: Duration,
) -> Result<()>
where
    S: KeyValueStore + 'static,
{
    let restore_requests = dashboard.restore(Instant::now(), Utc::now())?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("World Clock")
            .with_inner_size([720.0, 860.0])
            .with_min_inner_size([480.0, 520.0]),
        ..Default::default()
    };

    eframe::run_native(
        "World Clock",
        native_options,
        Box::new(move |cc| {
            configure_theme(&cc.egui_ctx, dashboard.theme(), dashboard.palette());
            let ctx = cc.egui_ctx.clone();
            let worker = LookupWorker::new(lookup).with_waker(move || ctx.request_repaint());
            for request in restore_requests {
                dispatch(&worker, request);
            }
            Ok(Box::new(WorldClockApp::new(dashboard, worker, debounce)))
        }),
    )
    .map_err(|err| anyhow::anyhow!("failed to launch world clock GUI: {err}"))?;

    Ok(())
}

fn dispatch(worker: &LookupWorker, request: TimezoneRequest) {
    worker.resolve_timezone(request.ticket, request.lat, request.lon);
}

struct WorldClockApp<S> {
    dashboard: Dashboard<S>,
    search: SearchBox,
    worker: LookupWorker,
    input_rect: Option<Rect>,
    results_rect: Option<Rect>,
    applied_look: (Theme, Palette),
}

impl<S: KeyValueStore> WorldClockApp<S> {
    fn new(dashboard: Dashboard<S>, worker: LookupWorker, debounce: Duration) -> Self {
        let applied_look = (dashboard.theme(), dashboard.palette());
        Self {
            dashboard,
            search: SearchBox::new(debounce),
            worker,
            input_rect: None,
            results_rect: None,
            applied_look,
        }
    }

    fn report(&mut self, what: &str, err: impl Display) {
        log::warn!("{what}: {err:#}");
        self.dashboard
            .notify(NoticeKind::Error, format!("{what}: {err}"), Instant::now());
    }

    fn apply_lookup_events(&mut self) {
        for event in self.worker.drain() {
            match event {
                LookupEvent::SearchCompleted { query, results } => {
                    self.search.show_results(&query, results);
                }
                LookupEvent::TimezoneResolved { ticket, timezone } => {
                    let outcome = self.dashboard.complete_timezone(
                        ticket,
                        timezone,
                        Instant::now(),
                        Utc::now(),
                    );
                    if let AddOutcome::Added(_) = outcome {
                        self.search.clear();
                    }
                }
            }
        }
    }

    fn hide_results_on_outside_click(&mut self, ctx: &egui::Context) {
        let click = ctx.input(|i| {
            if i.pointer.any_click() {
                i.pointer.interact_pos()
            } else {
                None
            }
        });
        let Some(pos) = click else {
            return;
        };
        let inside = [self.input_rect, self.results_rect]
            .into_iter()
            .flatten()
            .any(|rect| rect.contains(pos));
        if !inside {
            self.search.dismiss();
        }
    }

    fn sync_look(&mut self, ctx: &egui::Context) {
        let look = (self.dashboard.theme(), self.dashboard.palette());
        if look != self.applied_look {
            configure_theme(ctx, look.0, look.1);
            self.applied_look = look;
        }
    }

    fn show_header(&mut self, ui: &mut Ui) {
        let accent = shades(self.dashboard.palette()).medium;
        ui.horizontal_wrapped(|ui| {
            ui.label(RichText::new("World Clock").size(26.0).color(accent).strong());
            ui.separator();

            for style in [ClockStyle::Digital, ClockStyle::Analog] {
                let selected = self.dashboard.clock_style() == style;
                if ui.selectable_label(selected, style.label()).clicked()
                    && !selected
                    && let Err(err) = self.dashboard.set_clock_style(style)
                {
                    self.report("could not save clock style", err);
                }
            }
            ui.separator();

            for palette in Palette::ALL {
                let selected = self.dashboard.palette() == palette;
                let swatch = RichText::new("●").size(20.0).color(shades(palette).medium);
                let button = egui::Button::new(swatch).selected(selected);
                if ui.add(button).on_hover_text(palette.label()).clicked()
                    && !selected
                    && let Err(err) = self.dashboard.set_palette(palette)
                {
                    self.report("could not save palette", err);
                }
            }
            ui.separator();

            let theme = self.dashboard.theme();
            let toggle_text = match theme {
                Theme::Light => "Dark mode",
                Theme::Dark => "Light mode",
            };
            if ui.button(toggle_text).clicked()
                && let Err(err) = self.dashboard.set_theme(theme.toggled())
            {
                self.report("could not save theme", err);
            }
        });
    }

    fn show_search(&mut self, ui: &mut Ui) {
        let now = Instant::now();
        ui.horizontal(|ui| {
            let response = ui.add(
                TextEdit::singleline(self.search.query_mut())
                    .hint_text("Search a city")
                    .desired_width(320.0),
            );
            self.input_rect = Some(response.rect);
            if response.changed() {
                self.search.on_input(now);
            }
            if response.gained_focus()
                && let Some(query) = self.search.on_focus()
            {
                self.worker.search(query);
            }
            let stored = self.dashboard.directory().len();
            let pending = self.dashboard.pending_adds();
            let count = if pending > 0 {
                format!("{stored}/{MAX_CITIES} (+{pending} adding)")
            } else {
                format!("{stored}/{MAX_CITIES}")
            };
            ui.label(RichText::new(count).color(Color32::from_rgb(128, 138, 152)));
        });

        if !self.search.results_visible() {
            self.results_rect = None;
            return;
        }
        let mut chosen = None;
        let frame = egui::Frame::group(ui.style()).show(ui, |ui| {
            for (index, city) in self.search.results().iter().enumerate() {
                let text = if city.country.is_empty() {
                    city.name.clone()
                } else {
                    format!("{}, {}", city.name, city.country)
                };
                if ui.selectable_label(false, text).clicked() {
                    chosen = Some(index);
                }
            }
        });
        self.results_rect = Some(frame.response.rect);

        if let Some(city) = chosen.and_then(|index| self.search.select(index))
            && let Some(request) = self.dashboard.request_add(city, now)
        {
            dispatch(&self.worker, request);
        }
    }

    fn show_notice(&self, ui: &mut Ui) {
        let Some(notice) = self.dashboard.notice() else {
            return;
        };
        let color = match notice.kind {
            NoticeKind::Info => Color32::from_rgb(60, 160, 100),
            NoticeKind::Error => Color32::from_rgb(220, 70, 70),
        };
        ui.add_space(4.0);
        ui.label(RichText::new(&notice.text).color(color).strong());
    }

    fn show_cards(&mut self, ui: &mut Ui) {
        let cards: Vec<ClockCard> = self.dashboard.cards().to_vec();
        if cards.is_empty() {
            ui.label(
                RichText::new("No clocks yet. Search for a city to add one.")
                    .color(Color32::from_rgb(128, 138, 152)),
            );
            return;
        }

        let colors = card_colors(self.dashboard.theme(), self.dashboard.palette());
        let mut remove: Option<CityId> = None;
        let mut card_rects: Vec<(CityId, Rect)> = Vec::with_capacity(cards.len());

        ScrollArea::vertical()
            .id_salt("cards_scroll")
            .show(ui, |ui| {
                for card in &cards {
                    let dragged = self.dashboard.dragging() == Some(&card.id);
                    let stroke = if dragged {
                        Stroke::new(2.0, colors.accent)
                    } else {
                        Stroke::new(1.0, colors.muted.gamma_multiply(0.4))
                    };
                    let frame = egui::Frame::new()
                        .fill(colors.fill)
                        .stroke(stroke)
                        .inner_margin(12.0)
                        .show(ui, |ui| {
                            ui.set_width(ui.available_width());
                            ui.push_id(card.id.as_str(), |ui| {
                                if self.show_card(ui, card, &colors) {
                                    remove = Some(card.id.clone());
                                }
                            });
                        });
                    card_rects.push((card.id.clone(), frame.response.rect));
                    ui.add_space(8.0);
                }
            });

        self.track_drag(ui.ctx(), &card_rects);
        if let Some(id) = remove
            && let Err(err) = self.dashboard.remove(&id)
        {
            self.report("could not remove clock", err);
        }
    }

    /// Returns true when the remove button was clicked.
    fn show_card(&mut self, ui: &mut Ui, card: &ClockCard, colors: &CardColors) -> bool {
        let mut remove_clicked = false;
        ui.horizontal(|ui| {
            let handle = ui
                .add(
                    egui::Label::new(RichText::new("☰").size(18.0).color(colors.muted))
                        .sense(Sense::drag()),
                )
                .on_hover_text("Drag to reorder");
            if handle.drag_started() {
                self.dashboard.begin_drag(&card.id);
            }

            ui.vertical(|ui| {
                ui.label(RichText::new(&card.name).size(20.0).color(colors.text).strong());
                ui.label(RichText::new(&card.country).color(colors.muted));
            });

            ui.with_layout(Layout::right_to_left(Align::Min), |ui| {
                let button = egui::Button::new(RichText::new("✕").color(colors.muted));
                if ui.add(button).on_hover_text("Remove").clicked() {
                    remove_clicked = true;
                }
            });
        });
        ui.add_space(6.0);

        match &card.state {
            CardState::Resolving => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(RichText::new("Resolving timezone").color(colors.muted));
                });
            }
            CardState::Unavailable => {
                ui.label(RichText::new("Timezone unavailable").color(colors.muted));
            }
            CardState::Live { timezone } => {
                if let Some(reading) = self.dashboard.reading(&card.id) {
                    ui.vertical_centered(|ui| match self.dashboard.clock_style() {
                        ClockStyle::Digital => show_digital(ui, reading, colors),
                        ClockStyle::Analog => show_analog(ui, reading, colors),
                    });
                }
                ui.label(RichText::new(timezone).small().color(colors.muted));
            }
        }
        remove_clicked
    }

    fn track_drag(&mut self, ctx: &egui::Context, card_rects: &[(CityId, Rect)]) {
        let Some(dragged) = self.dashboard.dragging().cloned() else {
            return;
        };
        let (pointer, released) =
            ctx.input(|i| (i.pointer.hover_pos(), i.pointer.any_released()));

        if let Some(pos) = pointer
            && let Some((target, rect)) = card_rects
                .iter()
                .find(|(id, rect)| id != &dragged && rect.y_range().contains(pos.y))
        {
            self.dashboard
                .drag_over(target, pos.y, rect.top(), rect.height());
        }
        if released && let Err(err) = self.dashboard.end_drag() {
            self.report("could not save order", err);
        }
    }
}

impl<S: KeyValueStore> eframe::App for WorldClockApp<S> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.apply_lookup_events();
        if let Some(query) = self.search.poll(now) {
            self.worker.search(query);
        }
        self.dashboard.tick(now, Utc::now());
        self.hide_results_on_outside_click(ctx);
        self.sync_look(ctx);

        TopBottomPanel::top("header")
            .resizable(false)
            .show(ctx, |ui| {
                ui.add_space(6.0);
                self.show_header(ui);
                ui.add_space(6.0);
                self.show_search(ui);
                self.show_notice(ui);
                ui.add_space(6.0);
            });

        egui::CentralPanel::default().show(ctx, |ui| self.show_cards(ui));

        let deadline = [self.dashboard.next_deadline(), self.search.next_deadline()]
            .into_iter()
            .flatten()
            .min();
        if let Some(deadline) = deadline {
            ctx.request_repaint_after(deadline.saturating_duration_since(Instant::now()));
        }
    }
}
