//! Face-touch monitor: few-shot training and live classification of camera frames.
/// Alert gate, audio cue and notifications.
pub mod alert;
/// Application directory resolution.
pub mod app_dirs;
/// Frame sources behind the camera permission boundary.
pub mod camera;
/// Example store and nearest-neighbour classifier.
pub mod classifier;
/// TOML configuration.
pub mod config;
/// Frame embedding model.
pub mod embedding;
/// Error taxonomy.
pub mod error;
/// Paced inference loop.
pub mod inference;
/// Tracing setup.
pub mod logging;
/// Session context and commands.
pub mod session;
/// Paced training runs.
pub mod training;

pub use error::SessionError;
