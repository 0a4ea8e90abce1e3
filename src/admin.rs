use crate::config::{
    default_paths, host_os, is_valid_core_lib, is_valid_media_lib, Config, ConfigStore, HostOs,
};
use log::info;
use std::path::Path;

/// Configuration editor shown before the viewer starts. Owns a working copy
/// of the three paths; nothing is written until a save passes validation.
pub struct AdminApp {
    store: ConfigStore,
    urls_file_input: String,
    vlc_lib_input: String,
    vlc_core_input: String,
    pub message: Option<String>,
    /// Set once a validated save asked for the viewer to take over.
    pub launch_viewer: bool,
}

impl AdminApp {
    pub fn new(store: ConfigStore) -> Self {
        let config = store.load();
        let mut app = Self {
            store,
            urls_file_input: config.urls_file,
            vlc_lib_input: config.vlc_lib_path,
            vlc_core_input: config.vlc_core_path,
            message: None,
            launch_viewer: false,
        };
        if host_os() == HostOs::MacOs {
            app.auto_detect_library_paths();
        }
        app
    }

    /// Stock VLC install locations on macOS; filled in when they exist so the
    /// operator rarely has to browse for them.
    fn auto_detect_library_paths(&mut self) {
        let defaults = default_paths(HostOs::MacOs);
        if Path::new(&defaults.vlc_lib_path).exists() {
            self.vlc_lib_input = defaults.vlc_lib_path;
        }
        if Path::new(&defaults.vlc_core_path).exists() {
            self.vlc_core_input = defaults.vlc_core_path;
        }
    }

    pub fn urls_file_input_mut(&mut self) -> &mut String {
        &mut self.urls_file_input
    }

    pub fn vlc_lib_input_mut(&mut self) -> &mut String {
        &mut self.vlc_lib_input
    }

    pub fn vlc_core_input_mut(&mut self) -> &mut String {
        &mut self.vlc_core_input
    }

    fn paths_valid(&self) -> bool {
        // The core library is only checked on Windows; macOS bundles it next
        // to libvlc, so the check is skipped there.
        is_valid_media_lib(&self.vlc_lib_input)
            && (host_os() != HostOs::Windows || is_valid_core_lib(&self.vlc_core_input))
    }

    /// Validates and writes the configuration; a failed validation refuses
    /// the save and surfaces a message instead.
    pub fn save_configuration(&mut self) -> bool {
        if !self.paths_valid() {
            self.message =
                Some("Some of the entered paths are not valid. Check them and try again.".into());
            return false;
        }
        let config = Config {
            urls_file: self.urls_file_input.clone(),
            vlc_lib_path: self.vlc_lib_input.clone(),
            vlc_core_path: self.vlc_core_input.clone(),
        };
        match self.store.save(&config) {
            Ok(()) => {
                info!("configuration saved to {}", self.store.path().display());
                self.message = Some("Configuration saved successfully.".into());
                true
            }
            Err(e) => {
                self.message = Some(format!("Failed to save configuration: {e}"));
                false
            }
        }
    }

    /// Save-then-launch; the viewer only takes over after a valid save.
    pub fn open_viewer(&mut self) {
        if self.save_configuration() {
            self.launch_viewer = true;
        }
    }

    pub fn config(&self) -> Config {
        Config {
            urls_file: self.urls_file_input.clone(),
            vlc_lib_path: self.vlc_lib_input.clone(),
            vlc_core_path: self.vlc_core_input.clone(),
        }
    }

    fn lib_recommendation(&self) -> String {
        match host_os() {
            HostOs::Windows => "Recommended: C:/Program Files/VideoLAN/VLC/libvlc.dll".into(),
            HostOs::MacOs => {
                "Recommended: /Applications/VLC.app/Contents/MacOS/lib/libvlc.dylib".into()
            }
        }
    }

    fn core_recommendation(&self) -> String {
        match host_os() {
            HostOs::Windows => "Recommended: C:/Program Files/VideoLAN/VLC/libvlccore.dll".into(),
            HostOs::MacOs => {
                "Recommended: /Applications/VLC.app/Contents/MacOS/lib/libvlccore.dylib".into()
            }
        }
    }

    fn urls_recommendation(&self) -> String {
        match host_os() {
            HostOs::Windows => "Recommended: C:/Users/Alex/Desktop/Multi/urls.json".into(),
            HostOs::MacOs => "Recommended: /Users/alex-mac/Desktop/Multi/urls.json".into(),
        }
    }

    pub fn ui(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("MultiViewer Administration");
            ui.separator();

            ui.label("Media engine library (libvlc):");
            ui.text_edit_singleline(&mut self.vlc_lib_input);
            ui.label(
                egui::RichText::new(self.lib_recommendation())
                    .small()
                    .color(egui::Color32::GRAY),
            );

            ui.separator();

            ui.label("Media engine core library (libvlccore):");
            ui.text_edit_singleline(&mut self.vlc_core_input);
            ui.label(
                egui::RichText::new(self.core_recommendation())
                    .small()
                    .color(egui::Color32::GRAY),
            );

            ui.separator();

            ui.label("Pane state file (JSON):");
            ui.text_edit_singleline(&mut self.urls_file_input);
            ui.label(
                egui::RichText::new(self.urls_recommendation())
                    .small()
                    .color(egui::Color32::GRAY),
            );

            ui.separator();

            ui.horizontal(|ui| {
                if ui.button("Save Configuration").clicked() {
                    self.save_configuration();
                }
                if ui.button("Open MultiViewer").clicked() {
                    self.open_viewer();
                }
            });

            if let Some(message) = &self.message {
                ui.separator();
                ui.label(message.clone());
            }
        });
    }
}
