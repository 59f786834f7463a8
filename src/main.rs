//! Terminal front end for the face-touch monitor.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use handsoff::alert::{AudioCue, CooldownNotifier, LogNotifier, RodioCue, SilentCue};
use handsoff::camera::FolderCamera;
use handsoff::config::{self, Config};
use handsoff::embedding::{FeatureExtractor, ThumbnailExtractor};
use handsoff::logging;
use handsoff::session::{Collaborators, Command, Session, SessionOptions, SessionStatus};
use handsoff::training::TrainingMessage;
use handsoff::SessionError;
use tracing::warn;

struct Options {
    config_path: Option<PathBuf>,
    frames_dir: Option<PathBuf>,
}

fn main() {
    let options = match parse_args(std::env::args().skip(1).collect()) {
        Ok(Some(options)) => options,
        Ok(None) => return,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    match run(options) {
        Ok(()) => {}
        Err(SessionError::PermissionDenied(reason)) => {
            eprintln!("Camera access denied ({reason}); nothing to monitor.");
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn run(options: Options) -> Result<(), SessionError> {
    let config = match options.config_path.as_ref() {
        Some(path) => config::load_from(path)?,
        None => config::load_or_default()?,
    };
    let frames_dir = options
        .frames_dir
        .or_else(|| config.camera.frames_dir.clone())
        .ok_or_else(|| {
            SessionError::CaptureError(
                "no camera configured; pass --frames <dir> or set camera.frames_dir".into(),
            )
        })?;

    let mut session = Session::start(
        &FolderCamera::new(frames_dir),
        || collaborators(&config),
        SessionOptions::from(&config),
    )?;
    if let Some(updates) = session.take_training_updates() {
        spawn_progress_printer(updates);
    }
    println!("Loading embedding model...");
    let dimension = session.wait_until_ready()?;
    println!("Ready ({dimension}-dim embeddings). {}", help_commands());

    let stdin = io::stdin();
    prompt();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            prompt();
            continue;
        }
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}. {}", help_commands());
                prompt();
                continue;
            }
        };
        match session.execute(command) {
            Ok(status) => print_status(&status),
            Err(err) => println!("Command failed: {err}"),
        }
        if command == Command::Quit {
            break;
        }
        prompt();
    }
    session.stop();
    Ok(())
}

fn collaborators(config: &Config) -> Collaborators {
    let grid = config.embedding.grid;
    let cue: Arc<dyn AudioCue> = match RodioCue::spawn(config.alert.cue.clone()) {
        Ok(cue) => Arc::new(cue),
        Err(err) => {
            warn!("Audio cue unavailable, alerts will be silent: {err}");
            Arc::new(SilentCue::default())
        }
    };
    Collaborators {
        loader: Box::new(move || {
            Ok(Box::new(ThumbnailExtractor::new(grid)) as Box<dyn FeatureExtractor>)
        }),
        cue,
        notifier: Arc::new(CooldownNotifier::new(
            LogNotifier,
            config.notification_cooldown(),
        )),
    }
}

fn spawn_progress_printer(updates: std::sync::mpsc::Receiver<TrainingMessage>) {
    let _ = thread::Builder::new()
        .name("training-progress".to_string())
        .spawn(move || {
            for message in updates {
                match message {
                    TrainingMessage::Progress(progress) => {
                        print!("\r[{}] Training {:>3}%", progress.label, progress.percent());
                        let _ = io::stdout().flush();
                    }
                    TrainingMessage::Finished(Ok(report)) => {
                        println!("\n[{}] Stored {} examples", report.label, report.added);
                    }
                    TrainingMessage::Finished(Err(err)) => {
                        println!("\nTraining stopped: {err}");
                    }
                }
            }
        });
}

fn print_status(status: &SessionStatus) {
    println!(
        "{} | model {} | examples: not_touch={} touched={} | gate {:?} | {}",
        status.activity,
        if status.model_loaded { "ready" } else { "loading" },
        status.not_touched_examples,
        status.touched_examples,
        status.gate,
        if status.touched { "TOUCHED" } else { "ok" },
    );
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn help_commands() -> &'static str {
    "Commands: 1 | train-not-touched, 2 | train-touched, run, stop, status, quit"
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut options = Options {
        config_path: None,
        frames_dir: None,
    };
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            "--frames" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--frames requires a value".to_string())?;
                options.frames_dir = Some(PathBuf::from(value));
            }
            other => return Err(format!("Unknown argument: {other}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(Some(options))
}

fn help_text() -> String {
    [
        "handsoff",
        "",
        "Learns what your hands-off and face-touch poses look like and alerts on touches.",
        "",
        "Usage:",
        "  handsoff [--frames <dir>] [--config <path>]",
        "",
        "Options:",
        "  --frames <dir>   Directory of frames to replay as the camera feed.",
        "  --config <path>  Config file (default: <config dir>/.handsoff/config.toml).",
        "  -h, --help       Show this help.",
    ]
    .join("\n")
}
