use crate::admin::AdminApp;
use crate::config::{Config, ConfigStore};
use crate::pane::PaneController;
use crate::player::PlaybackEngine;
use crate::state::PaneStateStore;
use crate::window::{WindowController, WindowRegistry, GRID_COLUMNS, MAX_EXTRA_WINDOWS};
use egui::{Align2, Color32, Id, Sense, Shape, Stroke, TextureHandle, Vec2};
use log::info;
use std::collections::HashMap;

/// Fixed credential. A real deployment should feed this from outside
/// instead of shipping it in the binary.
pub const ADMIN_PASSWORD: &str = "admin";

const VIDEO_WIDTH: f32 = 280.0;
const VIDEO_HEIGHT: f32 = 180.0;
const METER_WIDTH: f32 = 15.0;
const SPECTRUM_HEIGHT: f32 = 40.0;

fn new_engine() -> Box<dyn PlaybackEngine> {
    #[cfg(feature = "gstreamer")]
    {
        Box::new(crate::player::GstEngine::new())
    }
    #[cfg(not(feature = "gstreamer"))]
    {
        Box::new(crate::player::NullEngine::default())
    }
}

#[derive(Default)]
struct WindowActions {
    add_window: bool,
    admin: bool,
}

impl WindowActions {
    fn merge(&mut self, other: WindowActions) {
        self.add_window |= other.add_window;
        self.admin |= other.admin;
    }
}

/// The viewer proper: one main window plus up to five extra viewports, each a
/// grid of panes. Window accounting lives on the shell's registry so a trip
/// through admin mode and back never resets the id sequence.
pub struct ViewerApp {
    store: PaneStateStore,
    windows: Vec<WindowController>,
    textures: HashMap<(u32, usize), TextureHandle>,
    admin_input: Option<String>,
    pub notice: Option<String>,
    pub admin_requested: bool,
}

impl ViewerApp {
    /// Builds the viewer from a loaded configuration. Loading the pane state
    /// here guarantees the file exists before the first pane writes to it.
    pub fn new(config: &Config) -> Self {
        let store = PaneStateStore::new(&config.urls_file);
        store.load();
        Self {
            store,
            windows: Vec::new(),
            textures: HashMap::new(),
            admin_input: None,
            notice: None,
            admin_requested: false,
        }
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn shutdown(&mut self, registry: &mut WindowRegistry) {
        for mut window in self.windows.drain(..) {
            window.close();
            registry.close_window(window.id());
        }
        self.textures.clear();
    }

    pub fn ui(&mut self, ctx: &egui::Context, registry: &mut WindowRegistry) {
        if self.windows.is_empty() {
            if let Some(id) = registry.open_window() {
                self.windows
                    .push(WindowController::new(id, self.store.clone(), &new_engine));
                info!("opened window {id}");
            }
        }

        let dt = f64::from(ctx.input(|i| i.unstable_dt));
        for window in &mut self.windows {
            window.tick(dt);
        }
        // meters and stall checks need to advance even without input events
        ctx.request_repaint();

        let mut actions = WindowActions::default();

        if !self.windows.is_empty() {
            egui::CentralPanel::default().show(ctx, |ui| {
                actions.merge(Self::window_contents(
                    ui,
                    &mut self.windows[0],
                    &mut self.textures,
                ));
            });
            Self::show_window_notices(ctx, &mut self.windows[0]);
        }

        let mut closed = Vec::new();
        for i in 1..self.windows.len() {
            let window = &mut self.windows[i];
            let textures = &mut self.textures;
            let id = window.id();
            let mut local = WindowActions::default();
            ctx.show_viewport_immediate(
                egui::ViewportId::from_hash_of(("multiviewer_window", id)),
                egui::ViewportBuilder::default()
                    .with_title(format!("MultiViewer - Window {id}"))
                    .with_inner_size([1200.0, 800.0]),
                |ctx, _class| {
                    egui::CentralPanel::default().show(ctx, |ui| {
                        local.merge(Self::window_contents(ui, window, textures));
                    });
                    Self::show_window_notices(ctx, window);
                    if ctx.input(|i| i.viewport().close_requested()) {
                        closed.push(id);
                    }
                },
            );
            actions.merge(local);
        }

        for window in &mut self.windows {
            let id = window.id();
            for pane in window.panes_mut() {
                if pane.is_fullscreen() {
                    Self::fullscreen_viewport(ctx, id, pane, &mut self.textures);
                }
            }
        }

        for id in closed {
            if let Some(pos) = self.windows.iter().position(|w| w.id() == id) {
                let mut window = self.windows.remove(pos);
                window.close();
                registry.close_window(id);
                self.textures.retain(|(wid, _), _| *wid != id);
            }
        }

        if actions.add_window {
            match registry.open_window() {
                Some(id) => {
                    self.windows
                        .push(WindowController::new(id, self.store.clone(), &new_engine));
                    info!("opened window {id}");
                }
                None => {
                    self.notice = Some(format!(
                        "The maximum of {MAX_EXTRA_WINDOWS} extra windows is already open."
                    ));
                }
            }
        }
        if actions.admin {
            self.admin_input = Some(String::new());
        }

        self.admin_prompt(ctx);
        self.app_notice(ctx);
    }

    fn admin_prompt(&mut self, ctx: &egui::Context) {
        let mut submitted = false;
        let mut cancelled = false;
        if let Some(input) = &mut self.admin_input {
            egui::Window::new("Administrator Password")
                .collapsible(false)
                .resizable(false)
                .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label("Enter the password:");
                    ui.add(egui::TextEdit::singleline(input).password(true));
                    ui.horizontal(|ui| {
                        if ui.button("OK").clicked() {
                            submitted = true;
                        }
                        if ui.button("Cancel").clicked() {
                            cancelled = true;
                        }
                    });
                });
        }
        if submitted {
            let entered = self.admin_input.take().unwrap_or_default();
            if entered == ADMIN_PASSWORD {
                info!("admin mode activated");
                self.admin_requested = true;
            }
        } else if cancelled {
            self.admin_input = None;
        }
    }

    fn app_notice(&mut self, ctx: &egui::Context) {
        if let Some(text) = self.notice.clone() {
            egui::Window::new("Notice")
                .id(Id::new("app_notice"))
                .collapsible(false)
                .resizable(false)
                .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(text);
                    if ui.button("OK").clicked() {
                        self.notice = None;
                    }
                });
        }
    }

    fn show_window_notices(ctx: &egui::Context, window: &mut WindowController) {
        if let Some(text) = window.notice.clone() {
            egui::Window::new("Notice")
                .id(Id::new(("window_notice", window.id())))
                .collapsible(false)
                .resizable(false)
                .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(text);
                    if ui.button("OK").clicked() {
                        window.notice = None;
                    }
                });
        }
        let id = window.id();
        for pane in window.panes_mut() {
            if let Some(text) = pane.notice.clone() {
                egui::Window::new("Pane Notice")
                    .id(Id::new(("pane_notice", id, pane.index())))
                    .collapsible(false)
                    .resizable(false)
                    .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
                    .show(ctx, |ui| {
                        ui.label(text);
                        if ui.button("OK").clicked() {
                            pane.notice = None;
                        }
                    });
            }
        }
    }

    fn window_contents(
        ui: &mut egui::Ui,
        window: &mut WindowController,
        textures: &mut HashMap<(u32, usize), TextureHandle>,
    ) -> WindowActions {
        let mut actions = WindowActions::default();

        ui.horizontal(|ui| {
            if ui.button("Add Pane").clicked() {
                window.add_pane(&new_engine);
            }
            if ui.button("Add Window").clicked() {
                actions.add_window = true;
            }
            if ui.button("Admin Mode").clicked() {
                actions.admin = true;
            }
        });
        ui.separator();

        egui::ScrollArea::vertical().show(ui, |ui| {
            egui::Grid::new(("pane_grid", window.id()))
                .num_columns(GRID_COLUMNS)
                .spacing([20.0, 20.0])
                .show(ui, |ui| {
                    let id = window.id();
                    for (i, pane) in window.panes_mut().iter_mut().enumerate() {
                        Self::pane_cell(ui, id, pane, textures);
                        if (i + 1) % GRID_COLUMNS == 0 {
                            ui.end_row();
                        }
                    }
                });
        });

        actions
    }

    fn pane_cell(
        ui: &mut egui::Ui,
        window_id: u32,
        pane: &mut PaneController,
        textures: &mut HashMap<(u32, usize), TextureHandle>,
    ) {
        ui.vertical(|ui| {
            let mut url = pane.url().to_string();
            let response = ui.add(
                egui::TextEdit::singleline(&mut url)
                    .hint_text("Enter stream address...")
                    .desired_width(VIDEO_WIDTH + METER_WIDTH),
            );
            if response.changed() {
                pane.set_url(url);
            }

            let mut name = pane.name().to_string();
            let response = ui.add(
                egui::TextEdit::singleline(&mut name)
                    .hint_text("Enter display name...")
                    .desired_width(VIDEO_WIDTH + METER_WIDTH),
            );
            if response.changed() {
                pane.set_name(name);
            }

            ui.horizontal(|ui| {
                let (meter_rect, _) = ui
                    .allocate_exact_size(egui::vec2(METER_WIDTH, VIDEO_HEIGHT), Sense::hover());
                Self::draw_meter(ui, meter_rect, pane);

                let (video_rect, _) = ui
                    .allocate_exact_size(egui::vec2(VIDEO_WIDTH, VIDEO_HEIGHT), Sense::hover());
                Self::update_texture(ui.ctx(), window_id, pane, textures);
                ui.painter().rect_filled(video_rect, 8.0, Color32::BLACK);
                if let Some(texture) = textures.get(&(window_id, pane.index())) {
                    ui.put(
                        video_rect,
                        egui::Image::new((texture.id(), video_rect.size())),
                    );
                }
            });

            let (spectrum_rect, _) = ui.allocate_exact_size(
                egui::vec2(VIDEO_WIDTH + METER_WIDTH, SPECTRUM_HEIGHT),
                Sense::hover(),
            );
            Self::draw_spectrum(ui, spectrum_rect, pane.spectrum());

            ui.horizontal(|ui| {
                if ui.button("Play").clicked() {
                    pane.play();
                }
                if ui.button("Pause").clicked() {
                    pane.pause();
                }
                if ui.button("Stop").clicked() {
                    pane.stop();
                }
                if ui.button("Fullscreen").clicked() {
                    pane.toggle_fullscreen();
                }
                let speaker = if pane.audio_enabled() { "🔊" } else { "🔇" };
                if ui.button(speaker).clicked() {
                    pane.toggle_audio();
                }
            });
        });
    }

    fn update_texture(
        ctx: &egui::Context,
        window_id: u32,
        pane: &PaneController,
        textures: &mut HashMap<(u32, usize), TextureHandle>,
    ) {
        if let Some(receiver) = pane.frames() {
            let frame = receiver.borrow().clone();
            match frame {
                Some(image) => {
                    let texture = ctx.load_texture(
                        format!("pane_{window_id}_{}", pane.index()),
                        image,
                        Default::default(),
                    );
                    textures.insert((window_id, pane.index()), texture);
                }
                None => {
                    textures.remove(&(window_id, pane.index()));
                }
            }
        }
    }

    fn draw_meter(ui: &egui::Ui, rect: egui::Rect, pane: &PaneController) {
        let painter = ui.painter();
        painter.rect_filled(rect, 2.0, Color32::from_gray(0x33));
        let level = f32::from(pane.meter_level()) / 100.0;
        if level > 0.0 {
            let fill_height = rect.height() * level;
            let fill = egui::Rect::from_min_max(
                egui::pos2(rect.min.x, rect.max.y - fill_height),
                rect.max,
            );
            let color = if pane.meter_clipping() {
                Color32::RED
            } else {
                Color32::GREEN
            };
            painter.rect_filled(fill, 2.0, color);
        }
        painter.rect_stroke(rect, 2.0, Stroke::new(1.0, Color32::from_gray(0x55)));
    }

    fn draw_spectrum(ui: &egui::Ui, rect: egui::Rect, spectrum: &[f32]) {
        let painter = ui.painter();
        painter.rect_filled(rect, 2.0, Color32::from_gray(0x33));
        if spectrum.len() < 2 {
            return;
        }
        let mid = rect.center().y;
        let step = rect.width() / (spectrum.len() - 1) as f32;
        let points: Vec<egui::Pos2> = spectrum
            .iter()
            .enumerate()
            .map(|(i, v)| {
                egui::pos2(
                    rect.min.x + step * i as f32,
                    mid - (v / 100.0) * (rect.height() / 2.0),
                )
            })
            .collect();
        painter.add(Shape::line(points, Stroke::new(2.0, Color32::GREEN)));
    }

    fn fullscreen_viewport(
        ctx: &egui::Context,
        window_id: u32,
        pane: &mut PaneController,
        textures: &mut HashMap<(u32, usize), TextureHandle>,
    ) {
        ctx.show_viewport_immediate(
            egui::ViewportId::from_hash_of(("multiviewer_fullscreen", window_id, pane.index())),
            egui::ViewportBuilder::default()
                .with_title(format!("MultiViewer - Pane {}", pane.index() + 1))
                .with_fullscreen(true),
            |ctx, _class| {
                egui::TopBottomPanel::bottom(Id::new((
                    "fullscreen_controls",
                    window_id,
                    pane.index(),
                )))
                    .show(ctx, |ui| {
                        if ui.button("Back").clicked() {
                            pane.toggle_fullscreen();
                        }
                    });
                egui::CentralPanel::default()
                    .frame(egui::Frame::none().fill(Color32::BLACK))
                    .show(ctx, |ui| {
                        Self::update_texture(ui.ctx(), window_id, pane, textures);
                        if let Some(texture) = textures.get(&(window_id, pane.index())) {
                            ui.centered_and_justified(|ui| {
                                ui.image((texture.id(), ui.available_size()));
                            });
                        }
                    });
                if ctx.input(|i| i.viewport().close_requested()) && pane.is_fullscreen() {
                    pane.toggle_fullscreen();
                }
            },
        );
    }
}

pub enum AppMode {
    Admin(AdminApp),
    Viewer(ViewerApp),
}

/// Top-level shell: owns the window registry for the whole process run and
/// swaps between the admin editor and the viewer.
pub struct MultiViewerApp {
    mode: AppMode,
    registry: WindowRegistry,
}

impl MultiViewerApp {
    pub fn admin() -> Self {
        Self {
            mode: AppMode::Admin(AdminApp::new(ConfigStore::new())),
            registry: WindowRegistry::new(),
        }
    }

    pub fn viewer() -> Self {
        let config = ConfigStore::new().load();
        Self {
            mode: AppMode::Viewer(ViewerApp::new(&config)),
            registry: WindowRegistry::new(),
        }
    }
}

impl eframe::App for MultiViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let next = match &mut self.mode {
            AppMode::Admin(admin) => {
                admin.ui(ctx);
                if admin.launch_viewer {
                    info!("admin handed off to viewer");
                    Some(AppMode::Viewer(ViewerApp::new(&admin.config())))
                } else {
                    None
                }
            }
            AppMode::Viewer(viewer) => {
                viewer.ui(ctx, &mut self.registry);
                if viewer.admin_requested {
                    viewer.shutdown(&mut self.registry);
                    Some(AppMode::Admin(AdminApp::new(ConfigStore::new())))
                } else {
                    None
                }
            }
        };
        if let Some(mode) = next {
            self.mode = mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn viewer_in(dir: &TempDir) -> ViewerApp {
        let config = Config {
            urls_file: dir.path().join("urls.json").to_string_lossy().to_string(),
            vlc_lib_path: String::new(),
            vlc_core_path: String::new(),
        };
        ViewerApp::new(&config)
    }

    #[test]
    fn test_viewer_new_creates_state_file() {
        let temp_dir = TempDir::new().unwrap();
        let _viewer = viewer_in(&temp_dir);
        assert!(temp_dir.path().join("urls.json").exists());
    }

    #[test]
    fn test_shutdown_releases_every_window() {
        let temp_dir = TempDir::new().unwrap();
        let mut viewer = viewer_in(&temp_dir);
        let mut registry = WindowRegistry::new();

        // simulate what ui() does on first frame without an egui context
        let id = registry.open_window().unwrap();
        viewer.windows.push(WindowController::new(
            id,
            viewer.store.clone(),
            &new_engine,
        ));
        assert_eq!(registry.open_count(), 1);

        viewer.shutdown(&mut registry);
        assert_eq!(viewer.window_count(), 0);
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn test_admin_password_is_fixed_literal() {
        assert_eq!(ADMIN_PASSWORD, "admin");
    }
}
