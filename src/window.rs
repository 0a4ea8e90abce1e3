use crate::pane::PaneController;
use crate::player::PlaybackEngine;
use crate::state::PaneStateStore;
use log::{error, info};

/// Hard cap on panes per window.
pub const MAX_PANES: usize = 15;
/// Extra windows allowed beyond the first.
pub const MAX_EXTRA_WINDOWS: usize = 5;
/// Fixed grid width.
pub const GRID_COLUMNS: usize = 4;

/// Grid slot for a pane index: row-major, four columns.
pub fn grid_slot(index: usize) -> (usize, usize) {
    (index / GRID_COLUMNS, index % GRID_COLUMNS)
}

/// Process-wide window accounting, owned by the application shell rather than
/// living in statics. Ids are 1-based and strictly increasing for the life of
/// the process; closing a window frees a slot but never an id.
#[derive(Debug)]
pub struct WindowRegistry {
    next_id: u32,
    open: usize,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self { next_id: 1, open: 0 }
    }

    pub fn open_count(&self) -> usize {
        self.open
    }

    /// Claims the next window id, or `None` when the first window plus
    /// `MAX_EXTRA_WINDOWS` extras are already open.
    pub fn open_window(&mut self) -> Option<u32> {
        if self.open >= 1 + MAX_EXTRA_WINDOWS {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.open += 1;
        Some(id)
    }

    pub fn close_window(&mut self, id: u32) {
        self.open = self.open.saturating_sub(1);
        info!("window {id} closed, {} still open", self.open);
    }
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a playback backend for one pane.
pub type EngineFactory = dyn Fn() -> Box<dyn PlaybackEngine>;

/// One viewer window: an ordered, capacity-bounded collection of panes laid
/// out on the fixed grid. Pane count changes are persisted through the store;
/// the saved count decides how many panes come back on the next run.
pub struct WindowController {
    id: u32,
    panes: Vec<PaneController>,
    store: PaneStateStore,
    /// Pending user-visible message for this window.
    pub notice: Option<String>,
}

impl WindowController {
    /// Restores a window from the store: saved pane count (default 8),
    /// clamped to capacity, with each pane reading back its own fields.
    pub fn new(id: u32, store: PaneStateStore, engine_factory: &EngineFactory) -> Self {
        let mut window = Self {
            id,
            panes: Vec::new(),
            store,
            notice: None,
        };
        let count = window.store.get_window_layout(id).clamp(1, MAX_PANES);
        for _ in 0..count {
            window.add_pane(engine_factory);
        }
        window
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    pub fn panes(&self) -> &[PaneController] {
        &self.panes
    }

    pub fn panes_mut(&mut self) -> &mut [PaneController] {
        &mut self.panes
    }

    /// Appends a pane at the next sequential index and persists the new
    /// count. Rejected with a notice once the window is full.
    pub fn add_pane(&mut self, engine_factory: &EngineFactory) -> bool {
        if self.panes.len() >= MAX_PANES {
            self.notice = Some(format!(
                "This window already holds the maximum of {MAX_PANES} panes."
            ));
            return false;
        }
        let index = self.panes.len();
        self.panes.push(PaneController::new(
            self.id,
            index,
            self.store.clone(),
            engine_factory(),
        ));
        if let Err(e) = self.store.set_window_layout(self.id, self.panes.len()) {
            error!("window {}: failed to persist layout: {e:#}", self.id);
        }
        true
    }

    pub fn tick(&mut self, dt: f64) {
        for pane in &mut self.panes {
            pane.tick(dt);
        }
    }

    /// Stops every pane and releases its engine. Stored entries stay on disk.
    pub fn close(&mut self) {
        for pane in &mut self.panes {
            pane.release();
        }
    }
}
