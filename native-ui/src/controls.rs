use egui::RichText;

use vs_panel::{Interval, Progress};

use crate::theme;

// ---------------------------------------------------------------------------
// Action enum -- polled by app.rs each frame
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlAction {
    Back,
    Forward,
}

/// Shared navigation row plus the progress bar.
///
/// `interval_input` is edited in place; the caller pushes it into the grid.
pub fn show_controls(
    ui: &mut egui::Ui,
    interval_input: &mut u32,
    progress: Option<Progress>,
    enabled: bool,
) -> Option<ControlAction> {
    let mut action = None;

    ui.group(|ui| {
        ui.label(RichText::new("Shared settings").strong());

        ui.horizontal(|ui| {
            ui.add_enabled_ui(enabled, |ui| {
                if ui
                    .add(theme::colored_button("◀ Back", theme::BACK_BUTTON))
                    .on_hover_text("Step every video back (Left arrow)")
                    .clicked()
                {
                    action = Some(ControlAction::Back);
                }

                ui.label("Interval:");
                ui.add(
                    egui::DragValue::new(interval_input)
                        .range(Interval::MIN..=Interval::MAX)
                        .speed(1.0)
                        .suffix(" frames"),
                );

                if ui
                    .add(theme::colored_button("Forward ▶", theme::FORWARD_BUTTON))
                    .on_hover_text("Step every video forward (Right arrow)")
                    .clicked()
                {
                    action = Some(ControlAction::Forward);
                }
            });
        });
    });

    ui.add_space(4.0);

    let fraction = progress.map_or(0.0, |p| f32::from(p.percent) / 100.0);
    let text = match progress {
        Some(p) => format!("{}%", p.percent),
        None => "No progress".to_string(),
    };
    ui.add(
        egui::ProgressBar::new(fraction)
            .fill(theme::ACCENT)
            .text(text),
    );

    action
}
