use eframe::egui::{self, Color32};

use crate::city::model::{Palette, Theme};

/// Seven shades of one accent color, darkest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shades {
    pub darkest: Color32,
    pub darker: Color32,
    pub dark: Color32,
    pub medium: Color32,
    pub light: Color32,
    pub lighter: Color32,
    pub lightest: Color32,
}

pub fn shades(palette: Palette) -> Shades {
    match palette {
        Palette::Blue => Shades {
            darkest: Color32::from_rgb(12, 30, 66),
            darker: Color32::from_rgb(23, 55, 120),
            dark: Color32::from_rgb(30, 78, 170),
            medium: Color32::from_rgb(59, 119, 230),
            light: Color32::from_rgb(120, 166, 242),
            lighter: Color32::from_rgb(186, 210, 250),
            lightest: Color32::from_rgb(230, 239, 254),
        },
        Palette::Red => Shades {
            darkest: Color32::from_rgb(69, 10, 10),
            darker: Color32::from_rgb(127, 29, 29),
            dark: Color32::from_rgb(185, 28, 28),
            medium: Color32::from_rgb(230, 62, 62),
            light: Color32::from_rgb(244, 128, 128),
            lighter: Color32::from_rgb(252, 196, 196),
            lightest: Color32::from_rgb(254, 236, 236),
        },
        Palette::Green => Shades {
            darkest: Color32::from_rgb(5, 46, 22),
            darker: Color32::from_rgb(20, 83, 45),
            dark: Color32::from_rgb(21, 128, 61),
            medium: Color32::from_rgb(34, 176, 86),
            light: Color32::from_rgb(110, 214, 146),
            lighter: Color32::from_rgb(187, 240, 206),
            lightest: Color32::from_rgb(234, 250, 240),
        },
    }
}

/// Colors a card is drawn with under the current theme.
#[derive(Debug, Clone, Copy)]
pub struct CardColors {
    pub fill: Color32,
    pub face: Color32,
    pub text: Color32,
    pub muted: Color32,
    pub accent: Color32,
    pub hand: Color32,
    pub second_hand: Color32,
}

pub fn card_colors(theme: Theme, palette: Palette) -> CardColors {
    let shades = shades(palette);
    match theme {
        Theme::Light => CardColors {
            fill: Color32::WHITE,
            face: shades.lightest,
            text: shades.darkest,
            muted: Color32::from_rgb(100, 110, 125),
            accent: shades.medium,
            hand: shades.darker,
            second_hand: shades.medium,
        },
        Theme::Dark => CardColors {
            fill: Color32::from_rgb(22, 27, 36),
            face: shades.darkest,
            text: shades.lightest,
            muted: Color32::from_rgb(150, 160, 175),
            accent: shades.light,
            hand: shades.lighter,
            second_hand: shades.light,
        },
    }
}

pub fn configure_theme(ctx: &egui::Context, theme: Theme, palette: Palette) {
    let shades = shades(palette);
    let mut visuals = match theme {
        Theme::Light => {
            let mut visuals = egui::Visuals::light();
            visuals.panel_fill = Color32::from_rgb(243, 245, 249);
            visuals.window_fill = Color32::WHITE;
            visuals.widgets.inactive.bg_fill = shades.lighter;
            visuals.widgets.hovered.bg_fill = shades.light;
            visuals.widgets.active.bg_fill = shades.medium;
            visuals
        }
        Theme::Dark => {
            let mut visuals = egui::Visuals::dark();
            visuals.override_text_color = Some(Color32::from_rgb(226, 234, 246));
            visuals.panel_fill = Color32::from_rgb(13, 17, 24);
            visuals.window_fill = Color32::from_rgb(22, 27, 36);
            visuals.widgets.inactive.bg_fill = shades.darker;
            visuals.widgets.hovered.bg_fill = shades.dark;
            visuals.widgets.active.bg_fill = shades.medium;
            visuals
        }
    };
    visuals.selection.bg_fill = shades.medium;
    visuals.hyperlink_color = shades.light;
    ctx.set_visuals(visuals);
}
