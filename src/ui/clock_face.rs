use eframe::egui::{self, Align2, FontId, Pos2, RichText, Sense, Stroke, Ui, Vec2, vec2};

use crate::clock::reading::ClockReading;
use crate::ui::theme::CardColors;

pub const FACE_SIZE: f32 = 140.0;

/// End point of a hand `length` long, `degrees` clockwise from twelve.
/// Screen y grows downwards.
pub fn hand_tip(center: Pos2, length: f32, degrees: f64) -> Pos2 {
    let radians = degrees.to_radians() as f32;
    center + vec2(radians.sin(), -radians.cos()) * length
}

pub fn show_digital(ui: &mut Ui, reading: &ClockReading, colors: &CardColors) {
    egui::Frame::new()
        .fill(colors.face)
        .inner_margin(12.0)
        .show(ui, |ui| {
            ui.label(
                RichText::new(&reading.digital)
                    .monospace()
                    .size(34.0)
                    .color(colors.text)
                    .strong(),
            );
        });
}

pub fn show_analog(ui: &mut Ui, reading: &ClockReading, colors: &CardColors) {
    let (response, painter) = ui.allocate_painter(Vec2::splat(FACE_SIZE), Sense::hover());
    let center = response.rect.center();
    let radius = FACE_SIZE / 2.0 - 4.0;

    painter.circle_filled(center, radius, colors.face);
    painter.circle_stroke(center, radius, Stroke::new(3.0, colors.accent));

    for hour in 0..12 {
        let degrees = f64::from(hour) * 30.0;
        let outer = hand_tip(center, radius - 4.0, degrees);
        let inner = hand_tip(center, radius - if hour % 3 == 0 { 14.0 } else { 9.0 }, degrees);
        painter.line_segment([inner, outer], Stroke::new(2.0, colors.muted));
    }
    painter.text(
        hand_tip(center, radius - 24.0, 0.0),
        Align2::CENTER_CENTER,
        "12",
        FontId::proportional(12.0),
        colors.muted,
    );

    let hands = reading.hands;
    painter.line_segment(
        [center, hand_tip(center, radius * 0.5, hands.hour_deg)],
        Stroke::new(5.0, colors.hand),
    );
    painter.line_segment(
        [center, hand_tip(center, radius * 0.75, hands.minute_deg)],
        Stroke::new(3.0, colors.hand),
    );
    painter.line_segment(
        [center, hand_tip(center, radius * 0.85, hands.second_deg)],
        Stroke::new(1.5, colors.second_hand),
    );
    painter.circle_filled(center, 4.0, colors.second_hand);
}
