use anyhow::{Context, Result};
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Panes a window starts with when nothing has been saved for it yet.
pub const DEFAULT_PANE_COUNT: usize = 8;

/// One window's slice of the state file. `num_widgets` stays absent until the
/// window has saved a layout at least once; `urls` and `names` only hold
/// indices that were actually edited, so they need not be contiguous.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_widgets: Option<usize>,
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

/// Whole file: window key (`window_<n>`) to that window's entry.
pub type StateFile = BTreeMap<String, WindowEntry>;

fn window_key(window_id: u32) -> String {
    format!("window_{window_id}")
}

/// Read/write access to the pane-state file named in the configuration.
///
/// Every mutation is a full read-modify-write of the file with no locking.
/// Last write wins; fine for one single-threaded desktop process, and entries
/// are never deleted, so removing a pane or closing a window leaves its rows
/// behind.
#[derive(Debug, Clone)]
pub struct PaneStateStore {
    path: PathBuf,
}

impl PaneStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole file. Missing or unparseable content is an empty store,
    /// which is written back so the file exists for subsequent writers.
    pub fn load(&self) -> StateFile {
        match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    "state file {} unreadable ({e:#}), starting empty",
                    self.path.display()
                );
                let empty = StateFile::new();
                if let Err(e) = self.write(&empty) {
                    error!("failed to create empty state file: {e:#}");
                }
                empty
            }
        }
    }

    fn try_load(&self) -> Result<StateFile> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", self.path.display()))
    }

    fn write(&self, state: &StateFile) -> Result<()> {
        let raw = serde_json::to_string(state).context("serializing pane state")?;
        fs::write(&self.path, raw).with_context(|| format!("writing {}", self.path.display()))
    }

    pub fn get_url(&self, window_id: u32, index: usize) -> Option<String> {
        self.load()
            .get(&window_key(window_id))
            .and_then(|w| w.urls.get(&index.to_string()).cloned())
    }

    pub fn get_name(&self, window_id: u32, index: usize) -> Option<String> {
        self.load()
            .get(&window_key(window_id))
            .and_then(|w| w.names.get(&index.to_string()).cloned())
    }

    pub fn set_url(&self, window_id: u32, index: usize, value: &str) -> Result<()> {
        let mut state = self.load();
        state
            .entry(window_key(window_id))
            .or_default()
            .urls
            .insert(index.to_string(), value.to_string());
        self.write(&state)
    }

    pub fn set_name(&self, window_id: u32, index: usize, value: &str) -> Result<()> {
        let mut state = self.load();
        state
            .entry(window_key(window_id))
            .or_default()
            .names
            .insert(index.to_string(), value.to_string());
        self.write(&state)
    }

    /// Overwrites the saved pane count, keeping the window's urls and names
    /// untouched.
    pub fn set_window_layout(&self, window_id: u32, pane_count: usize) -> Result<()> {
        let mut state = self.load();
        state.entry(window_key(window_id)).or_default().num_widgets = Some(pane_count);
        self.write(&state)
    }

    pub fn get_window_layout(&self, window_id: u32) -> usize {
        self.load()
            .get(&window_key(window_id))
            .and_then(|w| w.num_widgets)
            .unwrap_or(DEFAULT_PANE_COUNT)
    }
}
