pub mod admin;
pub mod app;
pub mod config;
pub mod pane;
pub mod player;
pub mod state;
pub mod window;

pub use admin::AdminApp;
pub use app::{AppMode, MultiViewerApp, ViewerApp, ADMIN_PASSWORD};
pub use config::{Config, ConfigStore};
pub use pane::{PaneController, PlaybackState};
pub use player::PlaybackEngine;
pub use state::PaneStateStore;
pub use window::{WindowController, WindowRegistry};
