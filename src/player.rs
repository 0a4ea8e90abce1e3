use anyhow::Result;
use egui::ColorImage;
use tokio::sync::watch;

/// Seam between the pane controller and the native playback backend. The
/// backend is opaque: it decodes, renders and reports what it knows; nothing
/// here reimplements any of that.
pub trait PlaybackEngine {
    /// Binds the engine to a stream address and starts playback.
    fn play(&mut self, address: &str) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Volume in 0..=100.
    fn set_volume(&mut self, volume: i32) -> Result<()>;

    /// Currently decoded frame dimensions. `(0, 0)` means no picture yet,
    /// which is exactly what the stall heuristic looks for.
    fn video_size(&self) -> Result<(u32, u32)>;

    /// Most recent asynchronous engine error, if any, consumed on read.
    fn take_error(&mut self) -> Option<String> {
        None
    }

    /// Decoded frames for display, when the backend produces them.
    fn frames(&self) -> Option<watch::Receiver<Option<ColorImage>>> {
        None
    }
}

/// Backend used when the crate is built without the `gstreamer` feature:
/// accepts every command and never decodes a frame.
#[derive(Debug, Default)]
pub struct NullEngine {
    active: bool,
}

impl PlaybackEngine for NullEngine {
    fn play(&mut self, _address: &str) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.active = false;
        Ok(())
    }

    fn set_volume(&mut self, _volume: i32) -> Result<()> {
        Ok(())
    }

    fn video_size(&self) -> Result<(u32, u32)> {
        Ok((0, 0))
    }
}

#[cfg(feature = "gstreamer")]
pub use gst::GstEngine;

#[cfg(feature = "gstreamer")]
mod gst {
    use super::PlaybackEngine;
    use anyhow::{anyhow, Result};
    use egui::ColorImage;
    use gstreamer::prelude::*;
    use gstreamer::{Bin, Element, ElementFactory, MessageView, State};
    use gstreamer_app::AppSink;
    use gstreamer_video::{VideoFrame, VideoInfo};
    use log::{info, warn};
    use std::sync::{Arc, Mutex};
    use tokio::sync::watch;

    /// GStreamer-backed engine. Each `play` builds a fresh `playbin` whose
    /// video sink converts to RGBA and hands frames to an appsink; frames are
    /// forwarded over a watch channel for the UI to upload as textures.
    pub struct GstEngine {
        pipeline: Option<Element>,
        frame_size: Arc<Mutex<(u32, u32)>>,
        error: Arc<Mutex<Option<String>>>,
        sender: watch::Sender<Option<ColorImage>>,
        receiver: watch::Receiver<Option<ColorImage>>,
    }

    impl GstEngine {
        pub fn new() -> Self {
            let (sender, receiver) = watch::channel(None);
            Self {
                pipeline: None,
                frame_size: Arc::new(Mutex::new((0, 0))),
                error: Arc::new(Mutex::new(None)),
                sender,
                receiver,
            }
        }

        fn teardown(&mut self) {
            if let Some(pipeline) = self.pipeline.take() {
                let _ = pipeline.set_state(State::Paused);
                if let Err(e) = pipeline.set_state(State::Null) {
                    warn!("failed to tear down pipeline: {e:?}");
                }
            }
        }

        fn build_pipeline(&self, address: &str) -> Result<Element> {
            let pipeline = ElementFactory::make("playbin")
                .name("playbin")
                .build()
                .map_err(|e| anyhow!("failed to create playbin: {e:?}"))?;
            pipeline.set_property("uri", address);

            let video_bin = Bin::new();
            let videoconvert = ElementFactory::make("videoconvert")
                .build()
                .map_err(|e| anyhow!("failed to create videoconvert: {e:?}"))?;
            let videoscale = ElementFactory::make("videoscale")
                .build()
                .map_err(|e| anyhow!("failed to create videoscale: {e:?}"))?;
            let capsfilter = ElementFactory::make("capsfilter")
                .build()
                .map_err(|e| anyhow!("failed to create capsfilter: {e:?}"))?;
            capsfilter.set_property(
                "caps",
                &gstreamer::Caps::builder("video/x-raw")
                    .field("format", "RGBA")
                    .build(),
            );

            let appsink = AppSink::builder().build();
            appsink.set_max_buffers(1);
            appsink.set_drop(true);

            video_bin
                .add(&videoconvert)
                .map_err(|e| anyhow!("failed to add videoconvert: {e:?}"))?;
            video_bin
                .add(&videoscale)
                .map_err(|e| anyhow!("failed to add videoscale: {e:?}"))?;
            video_bin
                .add(&capsfilter)
                .map_err(|e| anyhow!("failed to add capsfilter: {e:?}"))?;
            video_bin
                .add(&appsink.clone().upcast::<Element>())
                .map_err(|e| anyhow!("failed to add appsink: {e:?}"))?;

            videoconvert
                .link(&videoscale)
                .map_err(|e| anyhow!("failed to link videoconvert: {e:?}"))?;
            videoscale
                .link(&capsfilter)
                .map_err(|e| anyhow!("failed to link videoscale: {e:?}"))?;
            capsfilter
                .link(&appsink.clone().upcast::<Element>())
                .map_err(|e| anyhow!("failed to link capsfilter: {e:?}"))?;

            let pad = videoconvert
                .static_pad("sink")
                .ok_or_else(|| anyhow!("videoconvert has no sink pad"))?;
            video_bin
                .add_pad(
                    &gstreamer::GhostPad::with_target(&pad)
                        .map_err(|e| anyhow!("failed to create ghost pad: {e:?}"))?,
                )
                .map_err(|e| anyhow!("failed to add ghost pad: {e:?}"))?;

            pipeline.set_property("video-sink", &video_bin);

            let audiosink = ElementFactory::make("autoaudiosink")
                .build()
                .map_err(|e| anyhow!("failed to create audio sink: {e:?}"))?;
            pipeline.set_property("audio-sink", &audiosink);

            self.watch_bus(&pipeline);
            self.extract_frames(appsink);

            Ok(pipeline)
        }

        fn watch_bus(&self, pipeline: &Element) {
            let bus = pipeline.bus().expect("pipeline should have a bus");
            let error = self.error.clone();
            std::thread::spawn(move || {
                for msg in bus.iter_timed(gstreamer::ClockTime::NONE) {
                    match msg.view() {
                        MessageView::Eos(_) => {
                            info!("end of stream");
                        }
                        MessageView::Error(err) => {
                            let message = format!(
                                "error from {:?}: {} ({:?})",
                                err.src().map(|s| s.path_string()),
                                err.error(),
                                err.debug()
                            );
                            warn!("engine: {message}");
                            *error.lock().unwrap() = Some(message);
                        }
                        MessageView::Warning(w) => {
                            warn!(
                                "engine warning from {:?}: {} ({:?})",
                                w.src().map(|s| s.path_string()),
                                w.error(),
                                w.debug()
                            );
                        }
                        _ => {}
                    }
                }
            });
        }

        fn extract_frames(&self, appsink: AppSink) {
            let sender = self.sender.clone();
            let frame_size = self.frame_size.clone();
            appsink.set_callbacks(
                gstreamer_app::AppSinkCallbacks::builder()
                    .new_sample(move |appsink| {
                        if let Some((frame, size)) = pull_frame(appsink) {
                            *frame_size.lock().unwrap() = size;
                            let _ = sender.send(Some(frame));
                        }
                        Ok(gstreamer::FlowSuccess::Ok)
                    })
                    .build(),
            );
        }
    }

    fn pull_frame(appsink: &AppSink) -> Option<(ColorImage, (u32, u32))> {
        let sample = appsink.pull_sample().ok()?;
        let buffer = sample.buffer()?;
        let caps = sample.caps()?;
        let video_info = VideoInfo::from_caps(caps).ok()?;

        let frame = VideoFrame::from_buffer_readable(buffer.copy(), &video_info).ok()?;
        let width = video_info.width();
        let height = video_info.height();
        let plane_data = frame.plane_data(0).ok()?;

        Some((
            ColorImage::from_rgba_unmultiplied(
                [width as usize, height as usize],
                plane_data,
            ),
            (width, height),
        ))
    }

    impl Default for GstEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    impl PlaybackEngine for GstEngine {
        fn play(&mut self, address: &str) -> Result<()> {
            self.teardown();
            *self.frame_size.lock().unwrap() = (0, 0);
            *self.error.lock().unwrap() = None;
            let _ = self.sender.send(None);

            let pipeline = self.build_pipeline(address)?;
            pipeline
                .set_state(State::Playing)
                .map_err(|e| anyhow!("failed to start playback: {e:?}"))?;
            self.pipeline = Some(pipeline);
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            if let Some(pipeline) = &self.pipeline {
                pipeline
                    .set_state(State::Paused)
                    .map_err(|e| anyhow!("failed to pause: {e:?}"))?;
            }
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.teardown();
            let _ = self.sender.send(None);
            Ok(())
        }

        fn set_volume(&mut self, volume: i32) -> Result<()> {
            if let Some(pipeline) = &self.pipeline {
                pipeline.set_property("volume", f64::from(volume.clamp(0, 100)) / 100.0);
            }
            Ok(())
        }

        fn video_size(&self) -> Result<(u32, u32)> {
            match &self.pipeline {
                Some(_) => Ok(*self.frame_size.lock().unwrap()),
                None => Err(anyhow!("no active pipeline")),
            }
        }

        fn take_error(&mut self) -> Option<String> {
            self.error.lock().unwrap().take()
        }

        fn frames(&self) -> Option<watch::Receiver<Option<ColorImage>>> {
            Some(self.receiver.clone())
        }
    }

    impl Drop for GstEngine {
        fn drop(&mut self) {
            self.teardown();
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn setup_gstreamer() -> bool {
            if gstreamer::init().is_err() {
                return false;
            }
            ElementFactory::make("playbin").build().is_ok()
        }

        #[test]
        fn test_video_size_without_pipeline_is_error() {
            if !setup_gstreamer() {
                return;
            }
            let engine = GstEngine::new();
            assert!(engine.video_size().is_err());
        }

        #[test]
        fn test_play_then_stop() {
            if !setup_gstreamer() {
                return;
            }
            let mut engine = GstEngine::new();
            if engine.play("file:///nonexistent/stream.mp4").is_ok() {
                assert_eq!(engine.video_size().unwrap(), (0, 0));
                assert!(engine.stop().is_ok());
                assert!(engine.video_size().is_err());
            }
        }

        #[test]
        fn test_stop_without_play_is_ok() {
            if !setup_gstreamer() {
                return;
            }
            let mut engine = GstEngine::new();
            assert!(engine.stop().is_ok());
        }

        #[test]
        fn test_set_volume_without_pipeline_is_ok() {
            if !setup_gstreamer() {
                return;
            }
            let mut engine = GstEngine::new();
            assert!(engine.set_volume(0).is_ok());
            assert!(engine.set_volume(100).is_ok());
        }
    }
}
