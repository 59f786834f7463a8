//! Session context and the user command surface.
//!
//! A [`Session`] owns everything the driving loops share: the frame source,
//! the embedding model, the example store, the alert gate and the touch flag.
//! At most one activity (a training run or the inference loop) is active;
//! every command first winds down whatever was running.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::info;

use crate::alert::{AlertGate, AudioCue, GateState, Notifier};
use crate::camera::{Camera, FrameSource};
use crate::classifier::{ClassifierOptions, ExampleStore, Label};
use crate::config::Config;
use crate::embedding::{EmbeddingProvider, ModelLoad, ModelLoader};
use crate::error::SessionError;
use crate::inference::{InferenceOptions, LoopHandle, LoopSummary, TouchFlag, spawn_loop};
use crate::training::{TrainingJob, TrainingMessage, TrainingOptions};

/// Shared state handed to the training and inference drivers.
#[derive(Clone)]
pub struct SessionContext {
    pub frames: Arc<dyn FrameSource>,
    pub provider: EmbeddingProvider,
    pub store: Arc<ExampleStore>,
    pub gate: Arc<AlertGate>,
    pub touch: TouchFlag,
}

/// External side-effect providers wired into a session.
pub struct Collaborators {
    pub loader: ModelLoader,
    pub cue: Arc<dyn AudioCue>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionOptions {
    pub classifier: ClassifierOptions,
    pub training: TrainingOptions,
    pub inference: InferenceOptions,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            classifier: config.classifier,
            training: config.training_options(),
            inference: config.inference_options(),
        }
    }
}

/// User commands accepted by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Train(Label),
    Run,
    Stop,
    Status,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "train-not-touched" | "train not-touched" => Ok(Command::Train(Label::NotTouched)),
            "2" | "train-touched" | "train touched" => Ok(Command::Train(Label::Touched)),
            "run" => Ok(Command::Run),
            "stop" => Ok(Command::Stop),
            "status" => Ok(Command::Status),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command '{other}'")),
        }
    }
}

/// What the session is currently driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Idle,
    Training(Label),
    Running,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::Idle => f.write_str("idle"),
            ActivityKind::Training(label) => write!(f, "training {label}"),
            ActivityKind::Running => f.write_str("running"),
        }
    }
}

/// Snapshot reported after every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub activity: ActivityKind,
    pub model_loaded: bool,
    pub not_touched_examples: usize,
    pub touched_examples: usize,
    pub gate: GateState,
    pub touched: bool,
}

enum Activity {
    Idle,
    Training(TrainingJob),
    Running(LoopHandle),
}

pub struct Session {
    ctx: SessionContext,
    options: SessionOptions,
    activity: Activity,
    pending_load: Option<ModelLoad>,
    updates_tx: Sender<TrainingMessage>,
    updates_rx: Option<Receiver<TrainingMessage>>,
}

impl Session {
    /// Open the camera, then build the collaborators and begin loading the
    /// embedding model.
    ///
    /// A refused camera ends startup before `collaborators` is called.
    pub fn start(
        camera: &dyn Camera,
        collaborators: impl FnOnce() -> Collaborators,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let frames = camera.open()?;
        info!("Camera access granted");
        let collaborators = collaborators();
        let provider = EmbeddingProvider::new();
        let pending_load = provider.spawn_load(collaborators.loader);
        let gate = Arc::new(AlertGate::new(collaborators.cue, collaborators.notifier));
        let (updates_tx, updates_rx) = mpsc::channel();
        Ok(Self {
            ctx: SessionContext {
                frames,
                provider,
                store: Arc::new(ExampleStore::new(options.classifier)),
                gate,
                touch: TouchFlag::default(),
            },
            options,
            activity: Activity::Idle,
            pending_load: Some(pending_load),
            updates_tx,
            updates_rx: Some(updates_rx),
        })
    }

    /// Block until the model load started by [`Session::start`] completes.
    pub fn wait_until_ready(&mut self) -> Result<usize, SessionError> {
        match self.pending_load.take() {
            Some(load) => load.wait(),
            None => self
                .ctx
                .provider
                .dimension()
                .ok_or(SessionError::NotInitialized),
        }
    }

    /// Take the receiver for training progress; available once.
    pub fn take_training_updates(&mut self) -> Option<Receiver<TrainingMessage>> {
        self.updates_rx.take()
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn execute(&mut self, command: Command) -> Result<SessionStatus, SessionError> {
        match command {
            Command::Train(label) => self.train(label)?,
            Command::Run => self.run()?,
            Command::Stop | Command::Quit => {
                self.stop();
            }
            Command::Status => {}
        }
        Ok(self.status())
    }

    /// Start (or restart) a training run for `label`.
    pub fn train(&mut self, label: Label) -> Result<(), SessionError> {
        self.stop();
        let job = TrainingJob::spawn(
            label,
            Arc::clone(&self.ctx.frames),
            self.ctx.provider.clone(),
            Arc::clone(&self.ctx.store),
            self.options.training,
            self.updates_tx.clone(),
        )?;
        self.activity = Activity::Training(job);
        Ok(())
    }

    /// Start (or restart) the inference loop.
    pub fn run(&mut self) -> Result<(), SessionError> {
        self.stop();
        let mut last_touched = false;
        let handle = spawn_loop(self.ctx.clone(), self.options.inference, move |outcome| {
            if outcome.touched != last_touched {
                last_touched = outcome.touched;
                info!(touched = outcome.touched, "Touch state changed");
            }
        })?;
        self.activity = Activity::Running(handle);
        Ok(())
    }

    /// Wind down the current activity; returns loop counters if inference was running.
    pub fn stop(&mut self) -> Option<LoopSummary> {
        match std::mem::replace(&mut self.activity, Activity::Idle) {
            Activity::Idle => None,
            Activity::Training(job) => {
                job.cancel();
                None
            }
            Activity::Running(handle) => Some(handle.stop()),
        }
    }

    pub fn status(&self) -> SessionStatus {
        let activity = match &self.activity {
            Activity::Training(job) if !job.is_finished() => ActivityKind::Training(job.label()),
            Activity::Running(handle) if handle.is_running() => ActivityKind::Running,
            _ => ActivityKind::Idle,
        };
        SessionStatus {
            activity,
            model_loaded: self.ctx.provider.is_loaded(),
            not_touched_examples: self.ctx.store.count(Label::NotTouched),
            touched_examples: self.ctx.store.count(Label::Touched),
            gate: self.ctx.gate.state(),
            touched: self.ctx.touch.get(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_aliases() {
        assert_eq!("1".parse(), Ok(Command::Train(Label::NotTouched)));
        assert_eq!(" Train-Touched ".parse(), Ok(Command::Train(Label::Touched)));
        assert_eq!("train not-touched".parse(), Ok(Command::Train(Label::NotTouched)));
        assert_eq!("run".parse(), Ok(Command::Run));
        assert_eq!("exit".parse(), Ok(Command::Quit));
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn activity_kind_displays_label() {
        assert_eq!(
            ActivityKind::Training(Label::Touched).to_string(),
            "training touched"
        );
    }

    #[test]
    fn options_follow_config() {
        let mut config = Config::default();
        config.training.repetitions = 5;
        config.inference.touch_threshold = 0.9;
        let options = SessionOptions::from(&config);
        assert_eq!(options.training.repetitions, 5);
        assert!((options.inference.touch_threshold - 0.9).abs() < f32::EPSILON);
    }
}
