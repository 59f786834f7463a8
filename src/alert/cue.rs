use std::io::Cursor;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rodio::source::SineWave;
use rodio::{Decoder, OutputStream, Sink, Source};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// Callback fired when cue playback has ended.
pub type FinishedListener = Arc<dyn Fn() + Send + Sync>;

/// Alert sound with a completion signal.
pub trait AudioCue: Send + Sync {
    /// Start playback without waiting for it to end.
    fn play(&self) -> Result<(), SessionError>;

    /// Register a callback for the end of every playback.
    fn on_finished(&self, listener: FinishedListener);
}

/// What the cue sounds like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueSettings {
    /// Sound file to play; a generated tone is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cue_path: Option<PathBuf>,
    #[serde(default = "default_tone_hz")]
    pub tone_hz: f32,
    #[serde(default = "default_tone_ms")]
    pub tone_ms: u64,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl Default for CueSettings {
    fn default() -> Self {
        Self {
            cue_path: None,
            tone_hz: default_tone_hz(),
            tone_ms: default_tone_ms(),
            volume: default_volume(),
        }
    }
}

fn default_tone_hz() -> f32 {
    880.0
}

fn default_tone_ms() -> u64 {
    600
}

fn default_volume() -> f32 {
    0.6
}

enum CueCommand {
    Play,
}

/// Cue played through the default rodio output on a dedicated audio thread.
pub struct RodioCue {
    commands: Mutex<Sender<CueCommand>>,
    listeners: Arc<Mutex<Vec<FinishedListener>>>,
}

impl RodioCue {
    /// Open the default output device and start the audio thread.
    pub fn spawn(settings: CueSettings) -> Result<Self, SessionError> {
        let sound = match settings.cue_path.as_ref() {
            Some(path) => Some(Arc::<[u8]>::from(std::fs::read(path).map_err(|err| {
                SessionError::Audio(format!("failed to read {}: {err}", path.display()))
            })?)),
            None => None,
        };
        let listeners: Arc<Mutex<Vec<FinishedListener>>> = Arc::new(Mutex::new(Vec::new()));
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_listeners = Arc::clone(&listeners);
        thread::Builder::new()
            .name("alert-cue".to_string())
            .spawn(move || {
                let stream = match rodio::OutputStreamBuilder::open_default_stream() {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err.to_string()));
                        return;
                    }
                };
                run_audio_thread(stream, settings, sound, command_rx, thread_listeners);
            })
            .map_err(|err| SessionError::Audio(format!("audio thread failed to start: {err}")))?;
        ready_rx
            .recv()
            .map_err(|_| SessionError::Audio("audio thread exited during startup".into()))?
            .map_err(SessionError::Audio)?;
        info!("Alert cue ready on default output");
        Ok(Self {
            commands: Mutex::new(command_tx),
            listeners,
        })
    }
}

impl AudioCue for RodioCue {
    fn play(&self) -> Result<(), SessionError> {
        self.commands
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .send(CueCommand::Play)
            .map_err(|_| SessionError::Audio("audio thread is not running".into()))
    }

    fn on_finished(&self, listener: FinishedListener) {
        self.listeners
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(listener);
    }
}

/// Cue for hosts without an audio device; playback "ends" immediately.
#[derive(Default)]
pub struct SilentCue {
    listeners: Mutex<Vec<FinishedListener>>,
}

impl AudioCue for SilentCue {
    fn play(&self) -> Result<(), SessionError> {
        let current = self
            .listeners
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone();
        for listener in current {
            listener();
        }
        Ok(())
    }

    fn on_finished(&self, listener: FinishedListener) {
        self.listeners
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(listener);
    }
}

fn run_audio_thread(
    stream: OutputStream,
    settings: CueSettings,
    sound: Option<Arc<[u8]>>,
    commands: Receiver<CueCommand>,
    listeners: Arc<Mutex<Vec<FinishedListener>>>,
) {
    while let Ok(CueCommand::Play) = commands.recv() {
        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(settings.volume.clamp(0.0, 1.0));
        match sound.as_ref() {
            Some(bytes) => match Decoder::new(Cursor::new(bytes.to_vec())) {
                Ok(source) => sink.append(source),
                Err(err) => warn!("Alert sound could not be decoded: {err}"),
            },
            None => sink.append(
                SineWave::new(settings.tone_hz)
                    .take_duration(Duration::from_millis(settings.tone_ms))
                    .amplify(0.5),
            ),
        }
        sink.play();
        sink.sleep_until_end();
        debug!("Alert cue playback ended");
        let current: Vec<FinishedListener> = listeners
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone();
        for listener in current {
            listener();
        }
    }
}
