use anyhow::{Context, Result};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Well-known configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "multiviewer_config.json";

/// Paths the viewer needs before it can start: where the pane-state file
/// lives and where the native playback libraries are installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub urls_file: String,
    pub vlc_lib_path: String,
    pub vlc_core_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    MacOs,
}

/// Any non-Windows host gets the macOS defaults.
pub fn host_os() -> HostOs {
    if cfg!(target_os = "windows") {
        HostOs::Windows
    } else {
        HostOs::MacOs
    }
}

/// Built-in fallback triple per platform. Pure; touches neither disk nor
/// network.
pub fn default_paths(os: HostOs) -> Config {
    match os {
        HostOs::Windows => Config {
            urls_file: "C:/Users/Alex/Desktop/Multi/urls.json".to_string(),
            vlc_lib_path: "C:/Program Files/VideoLAN/VLC/libvlc.dll".to_string(),
            vlc_core_path: "C:/Program Files/VideoLAN/VLC/libvlccore.dll".to_string(),
        },
        HostOs::MacOs => Config {
            urls_file: "/Users/alex-mac/Desktop/Multi/urls.json".to_string(),
            vlc_lib_path: "/Applications/VLC.app/Contents/MacOS/lib/libvlc.dylib".to_string(),
            vlc_core_path: "/Applications/VLC.app/Contents/MacOS/lib/libvlccore.dylib"
                .to_string(),
        },
    }
}

/// A media library path is accepted when it exists on disk and its file name
/// carries the expected library marker. A nonexistent path always fails,
/// whatever it is called.
pub fn is_valid_media_lib(path: &str) -> bool {
    path_has_marker(path, "libvlc")
}

pub fn is_valid_core_lib(path: &str) -> bool {
    path_has_marker(path, "libvlccore")
}

fn path_has_marker(path: &str, marker: &str) -> bool {
    let path = Path::new(path);
    path.exists()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.contains(marker))
}

/// Reads and writes the shared configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::at(CONFIG_FILE)
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration, substituting the platform defaults when the
    /// file is missing or malformed. The default is persisted right away so
    /// every later load sees the same triple.
    pub fn load(&self) -> Config {
        match self.try_load() {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "config {} unreadable ({e:#}), using platform defaults",
                    self.path.display()
                );
                let config = default_paths(host_os());
                if let Err(e) = self.save(&config) {
                    error!("failed to persist default config: {e:#}");
                }
                config
            }
        }
    }

    fn try_load(&self) -> Result<Config> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }

    /// Wholesale overwrite. Single writer, low frequency; no atomicity.
    pub fn save(&self, config: &Config) -> Result<()> {
        let raw = serde_json::to_string(config).context("serializing config")?;
        fs::write(&self.path, raw).with_context(|| format!("writing {}", self.path.display()))
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_default_paths_windows() {
        let config = default_paths(HostOs::Windows);
        assert_eq!(config.urls_file, "C:/Users/Alex/Desktop/Multi/urls.json");
        assert_eq!(
            config.vlc_lib_path,
            "C:/Program Files/VideoLAN/VLC/libvlc.dll"
        );
        assert_eq!(
            config.vlc_core_path,
            "C:/Program Files/VideoLAN/VLC/libvlccore.dll"
        );
    }

    #[test]
    fn test_default_paths_macos() {
        let config = default_paths(HostOs::MacOs);
        assert_eq!(config.urls_file, "/Users/alex-mac/Desktop/Multi/urls.json");
        assert!(config.vlc_lib_path.ends_with("libvlc.dylib"));
        assert!(config.vlc_core_path.ends_with("libvlccore.dylib"));
    }

    #[test]
    fn test_load_missing_file_returns_defaults_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::at(temp_dir.path().join("multiviewer_config.json"));

        let config = store.load();
        assert_eq!(config, default_paths(host_os()));

        // The default must have been written back.
        assert!(store.path().exists());
        let reloaded = store.load();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_malformed_file_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("multiviewer_config.json");
        fs::write(&path, "{not json at all").unwrap();

        let store = ConfigStore::at(&path);
        let config = store.load();
        assert_eq!(config, default_paths(host_os()));
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::at(temp_dir.path().join("multiviewer_config.json"));
        let config = Config {
            urls_file: "/tmp/urls.json".to_string(),
            vlc_lib_path: "/opt/vlc/libvlc.so".to_string(),
            vlc_core_path: "/opt/vlc/libvlccore.so".to_string(),
        };

        store.save(&config).unwrap();
        assert_eq!(store.load(), config);
    }

    #[test]
    fn test_config_uses_stable_field_names() {
        let config = default_paths(HostOs::Windows);
        let raw = serde_json::to_string(&config).unwrap();
        assert!(raw.contains("\"urls_file\""));
        assert!(raw.contains("\"vlc_lib_path\""));
        assert!(raw.contains("\"vlc_core_path\""));
    }

    #[test]
    fn test_validation_rejects_nonexistent_path() {
        assert!(!is_valid_media_lib("/definitely/not/there/libvlc.dylib"));
        assert!(!is_valid_core_lib("/definitely/not/there/libvlccore.dylib"));
    }

    #[test]
    fn test_validation_rejects_existing_file_without_marker() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("something_else.dylib");
        File::create(&path).unwrap();
        assert!(!is_valid_media_lib(path.to_str().unwrap()));
    }

    #[test]
    fn test_validation_accepts_existing_marked_file() {
        let temp_dir = TempDir::new().unwrap();
        let lib = temp_dir.path().join("libvlc.dylib");
        let core = temp_dir.path().join("libvlccore.dylib");
        File::create(&lib).unwrap();
        File::create(&core).unwrap();

        assert!(is_valid_media_lib(lib.to_str().unwrap()));
        assert!(is_valid_core_lib(core.to_str().unwrap()));
        // "libvlccore" contains "libvlc", so the core library also passes
        // the looser check.
        assert!(is_valid_media_lib(core.to_str().unwrap()));
        assert!(!is_valid_core_lib(lib.to_str().unwrap()));
    }
}
