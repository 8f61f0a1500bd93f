use egui::{Color32, CornerRadius, Stroke, Visuals};

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

pub const WINDOW_BG: Color32 = Color32::from_rgb(0x2b, 0x2b, 0x2b);
pub const PANEL_BG: Color32 = Color32::from_rgb(0x23, 0x23, 0x23);
pub const INPUT_BG: Color32 = Color32::from_rgb(0x33, 0x33, 0x33);
pub const TEXT: Color32 = Color32::from_rgb(0xe0, 0xe0, 0xe0);
pub const TEXT_DIM: Color32 = Color32::from_rgb(0x9e, 0x9e, 0x9e);
pub const ACCENT: Color32 = Color32::from_rgb(0x4c, 0xaf, 0x50);
pub const OPEN_BUTTON: Color32 = Color32::from_rgb(0x21, 0x96, 0xf3);
pub const BACK_BUTTON: Color32 = Color32::from_rgb(0xff, 0x57, 0x22);
pub const FORWARD_BUTTON: Color32 = ACCENT;
pub const RESET_BUTTON: Color32 = Color32::from_rgb(0xa6, 0x00, 0x00);
pub const ERROR_TEXT: Color32 = Color32::from_rgb(0xef, 0x53, 0x50);
pub const STATUS_MSG_COLOR: Color32 = Color32::from_rgb(0x4e, 0xcd, 0xc4);

/// Dark theme with green accents.
pub fn apply_theme(ctx: &egui::Context) {
    let mut visuals = Visuals::dark();

    visuals.panel_fill = WINDOW_BG;
    visuals.window_fill = PANEL_BG;
    visuals.extreme_bg_color = INPUT_BG;
    visuals.override_text_color = Some(TEXT);

    visuals.selection.bg_fill = ACCENT;
    visuals.selection.stroke = Stroke::new(1.0, TEXT);

    let rounding = CornerRadius::same(4);
    visuals.widgets.inactive.bg_fill = INPUT_BG;
    visuals.widgets.inactive.weak_bg_fill = INPUT_BG;
    visuals.widgets.inactive.corner_radius = rounding;
    visuals.widgets.hovered.corner_radius = rounding;
    visuals.widgets.active.corner_radius = rounding;
    visuals.widgets.hovered.bg_stroke = Stroke::new(1.0, ACCENT);

    ctx.set_visuals(visuals);
}

/// A filled button with white text, used for the coloured action buttons.
pub fn colored_button(text: &str, fill: Color32) -> egui::Button<'static> {
    egui::Button::new(egui::RichText::new(text.to_owned()).color(Color32::WHITE).strong())
        .fill(fill)
}
