#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use handsoff::SessionError;
use handsoff::alert::{AudioCue, FinishedListener, Notifier};
use handsoff::camera::{Camera, Frame, FrameSource, StillSource};
use handsoff::embedding::{FeatureExtractor, ModelLoader};
use handsoff::session::Collaborators;
use handsoff::training::{TrainingMessage, TrainingReport};
use image::{Rgb, RgbImage};

pub fn solid(rgb: [u8; 3]) -> Frame {
    RgbImage::from_pixel(8, 8, Rgb(rgb))
}

pub fn hands_off_frame() -> Frame {
    solid([10, 20, 240])
}

pub fn touching_frame() -> Frame {
    solid([240, 30, 10])
}

/// Camera whose single source stays reachable from the test.
pub struct SharedCamera {
    pub source: Arc<StillSource>,
}

impl SharedCamera {
    pub fn new(frame: Frame) -> Self {
        Self {
            source: Arc::new(StillSource::new(frame)),
        }
    }
}

impl Camera for SharedCamera {
    fn open(&self) -> Result<Arc<dyn FrameSource>, SessionError> {
        Ok(Arc::clone(&self.source) as Arc<dyn FrameSource>)
    }
}

pub struct DeniedCamera;

impl Camera for DeniedCamera {
    fn open(&self) -> Result<Arc<dyn FrameSource>, SessionError> {
        Err(SessionError::PermissionDenied("user declined".into()))
    }
}

/// Embeds a frame as the colour of its top-left pixel.
pub struct PixelExtractor;

impl FeatureExtractor for PixelExtractor {
    fn dimension(&self) -> usize {
        3
    }

    fn extract(&self, frame: &Frame) -> Result<Vec<f32>, SessionError> {
        let pixel = frame
            .get_pixel_checked(0, 0)
            .ok_or_else(|| SessionError::CaptureError("empty frame".into()))?;
        Ok(pixel.0.iter().map(|channel| *channel as f32).collect())
    }
}

pub fn pixel_loader(called: Arc<AtomicBool>) -> ModelLoader {
    Box::new(move || {
        called.store(true, Ordering::SeqCst);
        Ok(Box::new(PixelExtractor) as Box<dyn FeatureExtractor>)
    })
}

/// Cue whose playback only ends when the test says so.
#[derive(Default)]
pub struct ManualCue {
    plays: AtomicUsize,
    listeners: Mutex<Vec<FinishedListener>>,
}

impl ManualCue {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn finish(&self) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener();
        }
    }
}

impl AudioCue for ManualCue {
    fn play(&self) -> Result<(), SessionError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_finished(&self, listener: FinishedListener) {
        self.listeners.lock().unwrap().push(listener);
    }
}

#[derive(Default)]
pub struct CountingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl CountingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for CountingNotifier {
    fn notify(&self, title: &str, body: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        true
    }
}

pub struct Fakes {
    pub loader_called: Arc<AtomicBool>,
    pub cue: Arc<ManualCue>,
    pub notifier: Arc<CountingNotifier>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            loader_called: Arc::new(AtomicBool::new(false)),
            cue: Arc::new(ManualCue::default()),
            notifier: Arc::new(CountingNotifier::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            loader: pixel_loader(Arc::clone(&self.loader_called)),
            cue: Arc::clone(&self.cue) as Arc<dyn AudioCue>,
            notifier: Arc::clone(&self.notifier) as Arc<dyn Notifier>,
        }
    }
}

/// Drain progress messages until a run reports completion.
pub fn wait_for_finish(updates: &Receiver<TrainingMessage>) -> TrainingReport {
    loop {
        match updates
            .recv_timeout(Duration::from_secs(5))
            .expect("training finished in time")
        {
            TrainingMessage::Progress(_) => continue,
            TrainingMessage::Finished(result) => return result.expect("training succeeded"),
        }
    }
}
