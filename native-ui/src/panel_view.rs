use egui::load::SizedTexture;
use egui::{Color32, RichText, TextureHandle};

use vs_panel::VideoPanel;

use crate::theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelAction {
    Reset,
    JumpTo(u32),
}

/// Info text, the current frame scaled to fit, and the per-panel controls.
pub fn show_panel(
    ui: &mut egui::Ui,
    panel: &VideoPanel,
    texture: Option<&TextureHandle>,
) -> Option<PanelAction> {
    let mut action = None;

    egui::Frame::NONE
        .fill(theme::PANEL_BG)
        .inner_margin(egui::Margin::symmetric(8, 6))
        .corner_radius(egui::CornerRadius::same(4))
        .show(ui, |ui| {
            ui.label(RichText::new(panel.info_text()).color(theme::TEXT_DIM).size(11.0));
            ui.add_space(4.0);

            // Keep room for the control row below the image.
            let controls_height = 28.0;
            let avail = ui.available_size() - egui::vec2(0.0, controls_height);
            show_frame(ui, texture, avail);

            ui.horizontal(|ui| {
                if ui
                    .add(theme::colored_button("Reset", theme::RESET_BUTTON))
                    .on_hover_text("Back to the first frame")
                    .clicked()
                {
                    action = Some(PanelAction::Reset);
                }

                ui.label("Frame:");
                let last = panel.total_frames().saturating_sub(1);
                let mut frame = panel.current_frame();
                let response = ui.add(egui::DragValue::new(&mut frame).range(0..=last));
                if response.changed() && frame != panel.current_frame() {
                    action = Some(PanelAction::JumpTo(frame));
                }
                ui.label(
                    RichText::new(format!("/ {last}  ({}%)", panel.progress_percent()))
                        .color(theme::TEXT_DIM),
                );

                if panel.is_loading() {
                    ui.spinner();
                }
                if let Some(err) = panel.last_error() {
                    ui.label(RichText::new(err.to_string()).color(theme::ERROR_TEXT).size(11.0));
                }
            });
        });

    action
}

fn show_frame(ui: &mut egui::Ui, texture: Option<&TextureHandle>, avail: egui::Vec2) {
    let avail = avail.max(egui::vec2(16.0, 16.0));

    match texture {
        Some(tex) => {
            let size = fit_within(tex.size_vec2(), avail);
            ui.allocate_ui(avail, |ui| {
                ui.centered_and_justified(|ui| {
                    ui.image(SizedTexture::new(tex.id(), size));
                });
            });
        }
        None => {
            let (rect, _) = ui.allocate_exact_size(avail, egui::Sense::hover());
            ui.painter().rect_filled(rect, egui::CornerRadius::ZERO, Color32::BLACK);
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Loading…",
                egui::FontId::proportional(13.0),
                theme::TEXT_DIM,
            );
        }
    }
}

/// Largest size with `image`'s aspect ratio that fits in `bounds`.
fn fit_within(image: egui::Vec2, bounds: egui::Vec2) -> egui::Vec2 {
    if image.x <= 0.0 || image.y <= 0.0 {
        return egui::Vec2::ZERO;
    }
    let scale = (bounds.x / image.x).min(bounds.y / image.y);
    image * scale
}
