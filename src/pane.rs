use crate::player::PlaybackEngine;
use crate::state::PaneStateStore;
use egui::ColorImage;
use log::{error, info, warn};
use rand::Rng;
use tokio::sync::watch;

/// Meter refresh period while a pane is playing, seconds.
pub const METER_INTERVAL: f64 = 0.1;
/// Stall check period; the first check lands this long after play.
pub const STALL_INTERVAL: f64 = 5.0;
/// Points in the synthetic spectrum trace.
pub const SPECTRUM_POINTS: usize = 100;
/// Meter levels above this render as clipping.
pub const METER_CLIP_LEVEL: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// One playback cell: owns its engine, mirrors its address and display name
/// into the pane state store on every edit, and drives the meter and stall
/// intervals from the UI loop's delta time.
///
/// The meter is synthetic: levels are drawn at random rather than measured
/// from the stream.
pub struct PaneController {
    window_id: u32,
    index: usize,
    url: String,
    name: String,
    state: PlaybackState,
    engine: Box<dyn PlaybackEngine>,
    store: PaneStateStore,
    meter_level: u8,
    spectrum: Vec<f32>,
    audio_enabled: bool,
    fullscreen: bool,
    black_screen_notified: bool,
    meter_accum: f64,
    stall_accum: f64,
    /// Pending user-visible message; the UI shows and clears it.
    pub notice: Option<String>,
}

impl PaneController {
    /// Builds a pane and reads its saved address and name back from the store.
    pub fn new(
        window_id: u32,
        index: usize,
        store: PaneStateStore,
        engine: Box<dyn PlaybackEngine>,
    ) -> Self {
        let url = store.get_url(window_id, index).unwrap_or_default();
        let name = store.get_name(window_id, index).unwrap_or_default();
        Self {
            window_id,
            index,
            url,
            name,
            state: PlaybackState::Idle,
            engine,
            store,
            meter_level: 0,
            spectrum: Vec::new(),
            audio_enabled: false,
            fullscreen: false,
            black_screen_notified: false,
            meter_accum: 0.0,
            stall_accum: 0.0,
            notice: None,
        }
    }

    pub fn window_id(&self) -> u32 {
        self.window_id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meter_level(&self) -> u8 {
        self.meter_level
    }

    pub fn meter_clipping(&self) -> bool {
        self.meter_level > METER_CLIP_LEVEL
    }

    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn frames(&self) -> Option<watch::Receiver<Option<ColorImage>>> {
        self.engine.frames()
    }

    /// Starts (or restarts) playback of the current address. An empty address
    /// is reported to the user and changes nothing. Playback always starts
    /// muted, whatever the audio toggle says; the unmute button is the only
    /// way to hear a pane.
    pub fn play(&mut self) {
        if self.url.is_empty() {
            self.notice = Some("Please enter a valid stream address.".to_string());
            return;
        }
        match self.engine.play(&self.url) {
            Ok(()) => {
                if let Err(e) = self.engine.set_volume(0) {
                    warn!(
                        "window {} pane {}: failed to mute on play: {e:#}",
                        self.window_id, self.index
                    );
                }
                self.state = PlaybackState::Playing;
                self.meter_accum = 0.0;
                self.stall_accum = 0.0;
                self.black_screen_notified = false;
                info!(
                    "window {} pane {}: playing {}",
                    self.window_id, self.index, self.url
                );
            }
            Err(e) => {
                error!(
                    "window {} pane {}: failed to start playback: {e:#}",
                    self.window_id, self.index
                );
                self.notice = Some(format!("Could not start playback: {e}"));
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Err(e) = self.engine.pause() {
            error!(
                "window {} pane {}: pause failed: {e:#}",
                self.window_id, self.index
            );
        }
        self.state = PlaybackState::Paused;
    }

    pub fn stop(&mut self) {
        if self.state != PlaybackState::Idle {
            if let Err(e) = self.engine.stop() {
                error!(
                    "window {} pane {}: stop failed: {e:#}",
                    self.window_id, self.index
                );
            }
        }
        self.state = PlaybackState::Idle;
        self.meter_level = 0;
        self.spectrum.clear();
        self.black_screen_notified = false;
        self.meter_accum = 0.0;
        self.stall_accum = 0.0;
    }

    pub fn toggle_audio(&mut self) {
        self.audio_enabled = !self.audio_enabled;
        let volume = if self.audio_enabled { 100 } else { 0 };
        if let Err(e) = self.engine.set_volume(volume) {
            warn!(
                "window {} pane {}: volume change failed: {e:#}",
                self.window_id, self.index
            );
        }
    }

    /// Fullscreen is an overlay, not a playback state; toggling never touches
    /// the engine.
    pub fn toggle_fullscreen(&mut self) {
        self.fullscreen = !self.fullscreen;
    }

    /// Write-through: called on every edit of the address field.
    pub fn set_url(&mut self, value: String) {
        self.url = value;
        if let Err(e) = self.store.set_url(self.window_id, self.index, &self.url) {
            error!(
                "window {} pane {}: failed to persist url: {e:#}",
                self.window_id, self.index
            );
        }
    }

    /// Write-through: called on every edit of the name field.
    pub fn set_name(&mut self, value: String) {
        self.name = value;
        if let Err(e) = self.store.set_name(self.window_id, self.index, &self.name) {
            error!(
                "window {} pane {}: failed to persist name: {e:#}",
                self.window_id, self.index
            );
        }
    }

    /// Advances the meter and stall intervals. Both only run while playing;
    /// pause and stop freeze them.
    pub fn tick(&mut self, dt: f64) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Some(message) = self.engine.take_error() {
            error!(
                "window {} pane {}: engine error: {message}",
                self.window_id, self.index
            );
        }

        self.meter_accum += dt;
        while self.meter_accum >= METER_INTERVAL {
            self.meter_accum -= METER_INTERVAL;
            self.refresh_meter();
        }

        self.stall_accum += dt;
        while self.stall_accum >= STALL_INTERVAL {
            self.stall_accum -= STALL_INTERVAL;
            self.check_stall();
        }
    }

    fn refresh_meter(&mut self) {
        let mut rng = rand::thread_rng();
        self.meter_level = rng.gen_range(0..=100);
        let scale = f32::from(self.meter_level);
        self.spectrum = (0..SPECTRUM_POINTS)
            .map(|_| (rng.gen::<f32>() - 0.5) * 2.0 * scale)
            .collect();
    }

    /// A zero-by-zero reported frame size means the decoder has produced no
    /// picture. One notice per play session; query failures count as no stall.
    fn check_stall(&mut self) {
        match self.engine.video_size() {
            Ok((0, 0)) => {
                if !self.black_screen_notified {
                    self.black_screen_notified = true;
                    warn!(
                        "window {} pane {}: no picture after stall check",
                        self.window_id, self.index
                    );
                    self.notice = Some(format!(
                        "Video pane {} has gone black. Check the stream.",
                        self.index + 1
                    ));
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "window {} pane {}: frame size query failed: {e:#}",
                    self.window_id, self.index
                );
            }
        }
    }

    /// Releases the engine when the owning window closes.
    pub fn release(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Probe {
        plays: Vec<String>,
        volumes: Vec<i32>,
        pauses: usize,
        stops: usize,
        size_queries: usize,
        size: (u32, u32),
        fail_size_query: bool,
        pending_error: Option<String>,
    }

    #[derive(Clone, Default)]
    struct MockEngine(Rc<RefCell<Probe>>);

    impl MockEngine {
        fn probe(&self) -> Rc<RefCell<Probe>> {
            self.0.clone()
        }
    }

    impl PlaybackEngine for MockEngine {
        fn play(&mut self, address: &str) -> anyhow::Result<()> {
            self.0.borrow_mut().plays.push(address.to_string());
            Ok(())
        }

        fn pause(&mut self) -> anyhow::Result<()> {
            self.0.borrow_mut().pauses += 1;
            Ok(())
        }

        fn stop(&mut self) -> anyhow::Result<()> {
            self.0.borrow_mut().stops += 1;
            Ok(())
        }

        fn set_volume(&mut self, volume: i32) -> anyhow::Result<()> {
            self.0.borrow_mut().volumes.push(volume);
            Ok(())
        }

        fn video_size(&self) -> anyhow::Result<(u32, u32)> {
            let mut probe = self.0.borrow_mut();
            probe.size_queries += 1;
            if probe.fail_size_query {
                Err(anyhow!("query failed"))
            } else {
                Ok(probe.size)
            }
        }

        fn take_error(&mut self) -> Option<String> {
            self.0.borrow_mut().pending_error.take()
        }
    }

    fn pane_with_mock(dir: &TempDir) -> (PaneController, Rc<RefCell<Probe>>) {
        let store = PaneStateStore::new(dir.path().join("urls.json"));
        let engine = MockEngine::default();
        let probe = engine.probe();
        (PaneController::new(1, 0, store, Box::new(engine)), probe)
    }

    #[test]
    fn test_play_with_empty_address_keeps_prior_state() {
        let temp_dir = TempDir::new().unwrap();
        let (mut pane, probe) = pane_with_mock(&temp_dir);

        pane.play();
        assert_eq!(pane.state(), PlaybackState::Idle);
        assert!(pane.notice.is_some());
        assert!(probe.borrow().plays.is_empty());
    }

    #[test]
    fn test_play_starts_muted_regardless_of_toggle() {
        let temp_dir = TempDir::new().unwrap();
        let (mut pane, probe) = pane_with_mock(&temp_dir);

        pane.toggle_audio(); // user unmuted earlier
        pane.set_url("rtsp://example/stream".to_string());
        pane.play();

        assert_eq!(pane.state(), PlaybackState::Playing);
        assert_eq!(probe.borrow().plays, vec!["rtsp://example/stream"]);
        // toggle pushed 100, play still forces 0 afterwards
        assert_eq!(*probe.borrow().volumes.last().unwrap(), 0);
    }

    #[test]
    fn test_pause_only_from_playing() {
        let temp_dir = TempDir::new().unwrap();
        let (mut pane, probe) = pane_with_mock(&temp_dir);

        pane.pause();
        assert_eq!(pane.state(), PlaybackState::Idle);
        assert_eq!(probe.borrow().pauses, 0);

        pane.set_url("rtsp://x".to_string());
        pane.play();
        pane.pause();
        assert_eq!(pane.state(), PlaybackState::Paused);
        assert_eq!(probe.borrow().pauses, 1);
    }

    #[test]
    fn test_stop_resets_meter_and_stall_flag() {
        let temp_dir = TempDir::new().unwrap();
        let (mut pane, probe) = pane_with_mock(&temp_dir);

        pane.set_url("rtsp://x".to_string());
        pane.play();
        pane.tick(STALL_INTERVAL); // stall fires, size is (0, 0)
        assert!(pane.notice.is_some());
        assert!(pane.meter_level() <= 100);

        pane.stop();
        assert_eq!(pane.state(), PlaybackState::Idle);
        assert_eq!(pane.meter_level(), 0);
        assert!(pane.spectrum().is_empty());
        assert_eq!(probe.borrow().stops, 1);
    }

    #[test]
    fn test_stall_notice_fires_once_per_session() {
        let temp_dir = TempDir::new().unwrap();
        let (mut pane, probe) = pane_with_mock(&temp_dir);

        pane.set_url("rtsp://x".to_string());
        pane.play();

        pane.tick(STALL_INTERVAL);
        assert!(pane.notice.take().is_some());

        pane.tick(STALL_INTERVAL);
        assert!(pane.notice.is_none(), "second stall must not re-notify");
        assert!(probe.borrow().size_queries >= 2);

        // a stop/play cycle re-arms the notification
        pane.stop();
        pane.play();
        pane.tick(STALL_INTERVAL);
        assert!(pane.notice.is_some());
    }

    #[test]
    fn test_stall_skipped_when_picture_present() {
        let temp_dir = TempDir::new().unwrap();
        let (mut pane, probe) = pane_with_mock(&temp_dir);
        probe.borrow_mut().size = (1280, 720);

        pane.set_url("rtsp://x".to_string());
        pane.play();
        pane.tick(STALL_INTERVAL);
        assert!(pane.notice.is_none());
    }

    #[test]
    fn test_stall_query_failure_is_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        let (mut pane, probe) = pane_with_mock(&temp_dir);
        probe.borrow_mut().fail_size_query = true;

        pane.set_url("rtsp://x".to_string());
        pane.play();
        pane.tick(STALL_INTERVAL);
        assert!(pane.notice.is_none());
        assert_eq!(pane.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_meter_only_runs_while_playing() {
        let temp_dir = TempDir::new().unwrap();
        let (mut pane, _probe) = pane_with_mock(&temp_dir);

        pane.tick(1.0);
        assert!(pane.spectrum().is_empty());

        pane.set_url("rtsp://x".to_string());
        pane.play();
        pane.tick(METER_INTERVAL);
        assert_eq!(pane.spectrum().len(), SPECTRUM_POINTS);

        pane.pause();
        let level = pane.meter_level();
        let spectrum = pane.spectrum().to_vec();
        pane.tick(1.0);
        assert_eq!(pane.meter_level(), level);
        assert_eq!(pane.spectrum(), spectrum.as_slice());
    }

    #[test]
    fn test_edits_write_through_to_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = PaneStateStore::new(temp_dir.path().join("urls.json"));
        let engine = MockEngine::default();
        let mut pane = PaneController::new(2, 3, store.clone(), Box::new(engine));

        pane.set_url("rtsp://cam".to_string());
        pane.set_name("Entrance".to_string());

        assert_eq!(store.get_url(2, 3), Some("rtsp://cam".to_string()));
        assert_eq!(store.get_name(2, 3), Some("Entrance".to_string()));
    }

    #[test]
    fn test_construction_reads_saved_fields() {
        let temp_dir = TempDir::new().unwrap();
        let store = PaneStateStore::new(temp_dir.path().join("urls.json"));
        store.set_url(1, 4, "rtsp://saved").unwrap();
        store.set_name(1, 4, "Saved name").unwrap();

        let pane = PaneController::new(1, 4, store, Box::new(MockEngine::default()));
        assert_eq!(pane.url(), "rtsp://saved");
        assert_eq!(pane.name(), "Saved name");
    }

    #[test]
    fn test_toggle_audio_flips_volume() {
        let temp_dir = TempDir::new().unwrap();
        let (mut pane, probe) = pane_with_mock(&temp_dir);

        pane.toggle_audio();
        assert!(pane.audio_enabled());
        assert_eq!(*probe.borrow().volumes.last().unwrap(), 100);

        pane.toggle_audio();
        assert!(!pane.audio_enabled());
        assert_eq!(*probe.borrow().volumes.last().unwrap(), 0);
    }

    #[test]
    fn test_fullscreen_is_orthogonal_to_playback() {
        let temp_dir = TempDir::new().unwrap();
        let (mut pane, probe) = pane_with_mock(&temp_dir);

        pane.set_url("rtsp://x".to_string());
        pane.play();
        pane.toggle_fullscreen();
        assert!(pane.is_fullscreen());
        assert_eq!(pane.state(), PlaybackState::Playing);
        assert_eq!(probe.borrow().stops, 0);

        pane.toggle_fullscreen();
        assert!(!pane.is_fullscreen());
        assert_eq!(pane.state(), PlaybackState::Playing);
    }
}
