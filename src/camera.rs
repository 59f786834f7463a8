//! Frame sources and the camera permission boundary.
//!
//! A [`Camera`] stands for the device before the user granted access; opening
//! it yields a pull-based [`FrameSource`] shared by training and inference.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::RgbImage;
use tracing::{debug, info};

use crate::error::SessionError;

/// One captured video frame.
pub type Frame = RgbImage;

/// Extensions accepted by [`FolderCamera`].
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Pull-based access to the latest frame.
pub trait FrameSource: Send + Sync {
    fn current_frame(&self) -> Result<Frame, SessionError>;
}

/// Device that must be granted before any frame is captured.
pub trait Camera {
    fn open(&self) -> Result<Arc<dyn FrameSource>, SessionError>;
}

/// Camera that always yields the same frame.
#[derive(Debug, Clone)]
pub struct StillCamera {
    frame: Frame,
}

impl StillCamera {
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }
}

impl Camera for StillCamera {
    fn open(&self) -> Result<Arc<dyn FrameSource>, SessionError> {
        Ok(Arc::new(StillSource {
            frame: Mutex::new(self.frame.clone()),
        }))
    }
}

/// Frame source whose current frame can be swapped while it is being read.
#[derive(Debug)]
pub struct StillSource {
    frame: Mutex<Frame>,
}

impl StillSource {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame: Mutex::new(frame),
        }
    }

    /// Replace the frame returned by later captures.
    pub fn set_frame(&self, frame: Frame) {
        *self.frame.lock().unwrap_or_else(|err| err.into_inner()) = frame;
    }
}

impl FrameSource for StillSource {
    fn current_frame(&self) -> Result<Frame, SessionError> {
        Ok(self
            .frame
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone())
    }
}

/// Replays the image files of a directory in name order, looping forever.
#[derive(Debug, Clone)]
pub struct FolderCamera {
    dir: PathBuf,
}

impl FolderCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Camera for FolderCamera {
    fn open(&self) -> Result<Arc<dyn FrameSource>, SessionError> {
        let frames = list_frames(&self.dir)?;
        info!(
            "Replaying {} frames from {}",
            frames.len(),
            self.dir.display()
        );
        Ok(Arc::new(FolderSource {
            frames,
            cursor: AtomicUsize::new(0),
        }))
    }
}

struct FolderSource {
    frames: Vec<PathBuf>,
    cursor: AtomicUsize,
}

impl FrameSource for FolderSource {
    fn current_frame(&self) -> Result<Frame, SessionError> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        let path = &self.frames[index];
        debug!("Capturing {}", path.display());
        image::open(path)
            .map(|image| image.to_rgb8())
            .map_err(|err| SessionError::CaptureError(format!("{}: {err}", path.display())))
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, SessionError> {
    let entries = std::fs::read_dir(dir).map_err(|err| match err.kind() {
        ErrorKind::PermissionDenied => {
            SessionError::PermissionDenied(format!("{}: {err}", dir.display()))
        }
        _ => SessionError::CaptureError(format!("{}: {err}", dir.display())),
    })?;
    let mut frames: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_frame_file(path))
        .collect();
    if frames.is_empty() {
        return Err(SessionError::CaptureError(format!(
            "no frames found in {}",
            dir.display()
        )));
    }
    frames.sort();
    Ok(frames)
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            FRAME_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::tempdir;

    #[test]
    fn folder_camera_cycles_frames_in_name_order() {
        let dir = tempdir().unwrap();
        RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]))
            .save(dir.path().join("b.png"))
            .unwrap();
        RgbImage::from_pixel(2, 2, Rgb([0, 0, 255]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let source = FolderCamera::new(dir.path()).open().unwrap();
        assert_eq!(source.current_frame().unwrap().get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(source.current_frame().unwrap().get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(source.current_frame().unwrap().get_pixel(0, 0), &Rgb([0, 0, 255]));
    }

    #[test]
    fn folder_camera_without_frames_is_capture_error() {
        let dir = tempdir().unwrap();
        let err = FolderCamera::new(dir.path()).open().err().unwrap();
        assert!(matches!(err, SessionError::CaptureError(_)));
    }

    #[test]
    fn missing_folder_is_capture_error() {
        let dir = tempdir().unwrap();
        let err = FolderCamera::new(dir.path().join("absent")).open().err().unwrap();
        assert!(matches!(err, SessionError::CaptureError(_)));
    }

    #[test]
    fn still_source_returns_latest_frame() {
        let source = StillSource::new(RgbImage::from_pixel(1, 1, Rgb([1, 2, 3])));
        source.set_frame(RgbImage::from_pixel(1, 1, Rgb([4, 5, 6])));
        assert_eq!(source.current_frame().unwrap().get_pixel(0, 0), &Rgb([4, 5, 6]));
    }
}
