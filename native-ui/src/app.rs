use eframe::egui;
use egui_extras::{Size, StripBuilder};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use vs_common::FrameSource;
use vs_decoder::FfmpegSource;
use vs_panel::{
    Direction, LoadFailure, Notify, PanelEvent, PanelGrid, PanelId, VideoPanel, GRID_COLUMNS,
    MAX_PANELS,
};

use crate::config::Settings;
use crate::controls::{self, ControlAction};
use crate::panel_view::{self, PanelAction};
use crate::theme;

/// GPU copy of a panel's displayed frame.
struct PanelTexture {
    handle: egui::TextureHandle,
    revision: u64,
}

pub struct VideoSyncApp {
    grid: PanelGrid,
    textures: HashMap<PanelId, PanelTexture>,
    interval_input: u32,

    // UI state
    status_message: Option<(String, Instant)>,
    load_errors: Vec<LoadFailure>,
}

impl VideoSyncApp {
    pub fn new(ctx: &egui::Context, settings: Settings) -> Self {
        let opener = Box::new(|path: &std::path::Path| {
            FfmpegSource::open(path).map(|source| Box::new(source) as Box<dyn FrameSource>)
        });

        // Loader threads wake the UI when a frame is ready.
        let repaint_ctx = ctx.clone();
        let notify: Notify = Arc::new(move || repaint_ctx.request_repaint());

        let mut grid = PanelGrid::new(opener)
            .with_cache_budget_mb(settings.cache_mb)
            .with_notify(notify);
        grid.set_interval(settings.interval.get());

        let mut app = Self {
            interval_input: grid.interval().get(),
            grid,
            textures: HashMap::new(),
            status_message: None,
            load_errors: Vec::new(),
        };

        if !settings.initial_paths.is_empty() {
            app.load_paths(settings.initial_paths);
        }

        app
    }

    // -----------------------------------------------------------------------
    // File operations
    // -----------------------------------------------------------------------

    /// Ask for up to four videos and replace the grid with them.
    pub fn open_videos(&mut self) {
        if let Some(paths) = rfd::FileDialog::new()
            .set_title("Select up to 4 videos")
            .add_filter("Video", &["mp4", "avi", "mov"])
            .add_filter("All", &["*"])
            .pick_files()
        {
            self.load_paths(paths);
        }
    }

    fn load_paths(&mut self, paths: Vec<PathBuf>) {
        let report = self.grid.open_videos(&paths);

        self.textures.clear();

        let mut msg = format!("Loaded {} video(s)", report.opened.len());
        if !report.failures.is_empty() {
            msg.push_str(&format!(", {} failed", report.failures.len()));
        }
        if !report.ignored.is_empty() {
            msg.push_str(&format!(
                ", {} ignored (max {MAX_PANELS})",
                report.ignored.len()
            ));
        }
        self.set_status(msg);

        self.load_errors = report.failures;
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    fn navigate(&mut self, direction: Direction) {
        if self.grid.is_empty() {
            return;
        }
        self.apply_interval_input();
        self.grid.navigate_frames(direction);
    }

    fn apply_interval_input(&mut self) {
        if self.interval_input != self.grid.interval().get() {
            self.grid.set_interval(self.interval_input);
            self.interval_input = self.grid.interval().get();
        }
    }

    fn apply_panel_action(&mut self, id: PanelId, action: PanelAction) {
        let Some(panel) = self.grid.panel_mut(id) else {
            return;
        };

        let result = match action {
            PanelAction::Reset => panel.reset_to_start(),
            PanelAction::JumpTo(index) => panel.jump_to_frame(index),
        };

        if let Err(e) = result {
            let msg = format!("{}: {}", panel.metadata().file_name(), e);
            self.set_status(msg);
        }
    }

    // -----------------------------------------------------------------------
    // Frame delivery
    // -----------------------------------------------------------------------

    fn process_panel_events(&mut self) {
        for (id, event) in self.grid.poll() {
            match event {
                PanelEvent::FrameShown { index } => {
                    tracing::trace!("Panel {:?}: frame {} shown", id, index);
                }
                PanelEvent::Discarded { index } => {
                    tracing::trace!("Panel {:?}: stale frame {} dropped", id, index);
                }
                PanelEvent::DecodeFailed { index, error } => {
                    let name = self
                        .grid
                        .panel(id)
                        .map(|p| p.metadata().file_name())
                        .unwrap_or_default();
                    self.set_status(format!("{name}: frame {index} failed: {error}"));
                }
            }
        }
    }

    /// Upload frames whose revision changed since the last upload.
    fn sync_textures(&mut self, ctx: &egui::Context) {
        self.textures
            .retain(|id, _| self.grid.panel(*id).is_some());

        for (id, panel) in self.grid.panels() {
            let Some(shown) = panel.displayed() else {
                continue;
            };

            if let Some(tex) = self.textures.get(&id) {
                if tex.revision == shown.revision {
                    continue;
                }
            }

            let image = egui::ColorImage::from_rgb(shown.frame.size(), &shown.frame.data);
            match self.textures.get_mut(&id) {
                Some(tex) => {
                    tex.handle.set(image, egui::TextureOptions::LINEAR);
                    tex.revision = shown.revision;
                }
                None => {
                    let handle = ctx.load_texture(
                        format!("panel-{id:?}"),
                        image,
                        egui::TextureOptions::LINEAR,
                    );
                    self.textures.insert(
                        id,
                        PanelTexture {
                            handle,
                            revision: shown.revision,
                        },
                    );
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_status(&mut self, msg: String) {
        tracing::info!("{}", msg);
        self.status_message = Some((msg, Instant::now()));
    }

    fn process_keyboard_shortcuts(&mut self, ctx: &egui::Context) {
        // Don't steal keys from a focused DragValue
        if ctx.wants_keyboard_input() {
            return;
        }

        let modifiers = ctx.input(|i| i.modifiers);

        if modifiers.command && ctx.input(|i| i.key_pressed(egui::Key::O)) {
            self.open_videos();
            return;
        }

        if ctx.input(|i| i.key_pressed(egui::Key::ArrowLeft)) {
            self.navigate(Direction::Back);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowRight)) {
            self.navigate(Direction::Forward);
        }
    }

    fn show_load_errors(&mut self, ctx: &egui::Context) {
        if self.load_errors.is_empty() {
            return;
        }

        let mut open = true;
        let mut dismissed = false;
        egui::Window::new("Some videos could not be opened")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .open(&mut open)
            .show(ctx, |ui| {
                for failure in &self.load_errors {
                    ui.label(
                        egui::RichText::new(failure.path.display().to_string()).strong(),
                    );
                    ui.label(
                        egui::RichText::new(failure.error.to_string()).color(theme::ERROR_TEXT),
                    );
                    ui.add_space(4.0);
                }
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });

        if !open || dismissed {
            self.load_errors.clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Panel grid
// ---------------------------------------------------------------------------

fn show_grid(
    ui: &mut egui::Ui,
    slots: &[(PanelId, &VideoPanel)],
    textures: &HashMap<PanelId, PanelTexture>,
    actions: &mut Vec<(PanelId, PanelAction)>,
) {
    let rows = slots.len().div_ceil(GRID_COLUMNS);

    StripBuilder::new(ui)
        .sizes(Size::remainder(), rows)
        .vertical(|mut strip| {
            for row in slots.chunks(GRID_COLUMNS) {
                strip.strip(|builder| {
                    builder
                        .sizes(Size::remainder(), GRID_COLUMNS)
                        .horizontal(|mut strip| {
                            for col in 0..GRID_COLUMNS {
                                match row.get(col) {
                                    Some((id, panel)) => strip.cell(|ui| {
                                        let texture = textures.get(id).map(|t| &t.handle);
                                        if let Some(action) =
                                            panel_view::show_panel(ui, panel, texture)
                                        {
                                            actions.push((*id, action));
                                        }
                                    }),
                                    None => strip.empty(),
                                }
                            }
                        });
                });
            }
        });
}

impl eframe::App for VideoSyncApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. Shortcuts before anything else
        self.process_keyboard_shortcuts(ctx);

        // 2. Pull finished loads and refresh textures
        self.process_panel_events();
        self.sync_textures(ctx);

        // 3. Top bar
        let mut open_clicked = false;
        egui::TopBottomPanel::top("top_bar")
            .frame(
                egui::Frame::NONE
                    .fill(theme::PANEL_BG)
                    .inner_margin(egui::Margin::symmetric(8, 6)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui
                        .add(theme::colored_button("Open videos", theme::OPEN_BUTTON))
                        .on_hover_text("Select up to 4 videos (Ctrl+O)")
                        .clicked()
                    {
                        open_clicked = true;
                    }
                    ui.label(
                        egui::RichText::new(format!("{} / {} loaded", self.grid.len(), MAX_PANELS))
                            .color(theme::TEXT_DIM),
                    );
                });
            });

        // 4. Status bar at the very bottom
        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(22.0)
            .frame(
                egui::Frame::NONE
                    .fill(theme::PANEL_BG)
                    .inner_margin(egui::Margin::symmetric(8, 2)),
            )
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    // Fades after 3 seconds
                    if let Some((ref msg, when)) = self.status_message {
                        let elapsed = when.elapsed().as_secs_f32();
                        if elapsed < 3.0 {
                            let alpha = if elapsed > 2.0 {
                                ((3.0 - elapsed) * 255.0) as u8
                            } else {
                                255
                            };
                            let c = theme::STATUS_MSG_COLOR;
                            ui.label(
                                egui::RichText::new(msg)
                                    .color(egui::Color32::from_rgba_unmultiplied(
                                        c.r(),
                                        c.g(),
                                        c.b(),
                                        alpha,
                                    ))
                                    .size(11.0),
                            );
                            ctx.request_repaint();
                        }
                    }
                });
            });

        // 5. Shared controls above the status bar
        let mut control_action = None;
        egui::TopBottomPanel::bottom("controls")
            .frame(
                egui::Frame::NONE
                    .fill(theme::WINDOW_BG)
                    .inner_margin(egui::Margin::symmetric(8, 6)),
            )
            .show(ctx, |ui| {
                control_action = controls::show_controls(
                    ui,
                    &mut self.interval_input,
                    self.grid.progress(),
                    !self.grid.is_empty(),
                );
            });

        // 6. Panel grid fills the rest
        let mut panel_actions = Vec::new();
        egui::CentralPanel::default()
            .frame(
                egui::Frame::NONE
                    .fill(theme::WINDOW_BG)
                    .inner_margin(egui::Margin::same(6)),
            )
            .show(ctx, |ui| {
                if self.grid.is_empty() {
                    ui.centered_and_justified(|ui| {
                        ui.label(
                            egui::RichText::new("Open up to 4 videos to compare them side by side")
                                .color(theme::TEXT_DIM)
                                .size(16.0),
                        );
                    });
                    return;
                }

                let slots: Vec<_> = self.grid.panels().collect();
                show_grid(ui, &slots, &self.textures, &mut panel_actions);
            });

        self.show_load_errors(ctx);

        // 7. Apply actions collected while drawing
        self.apply_interval_input();
        if let Some(action) = control_action {
            match action {
                ControlAction::Back => self.navigate(Direction::Back),
                ControlAction::Forward => self.navigate(Direction::Forward),
            }
        }
        for (id, action) in panel_actions {
            self.apply_panel_action(id, action);
        }
        if open_clicked {
            self.open_videos();
        }
    }
}
