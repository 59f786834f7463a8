//! Where handsoff keeps its files.
//!
//! Everything lives in one `.handsoff` folder. Its parent is, in order of
//! precedence: a test override, `HANDSOFF_CONFIG_HOME`, then the OS config
//! directory.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::BaseDirs;
use thiserror::Error;

pub const APP_DIR_NAME: &str = ".handsoff";
pub const CONFIG_HOME_ENV: &str = "HANDSOFF_CONFIG_HOME";
const LOGS_DIR_NAME: &str = "logs";

static BASE_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("Could not determine a config directory (set {CONFIG_HOME_ENV})")]
    NoBaseDir,
    #[error("Could not create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The `.handsoff` folder, created on first use.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = base_dir().ok_or(AppDirError::NoBaseDir)?;
    ensure_dir(&base.join(APP_DIR_NAME))
}

/// `logs/` inside the app folder, created on first use.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(&app_root_dir()?.join(LOGS_DIR_NAME))
}

fn ensure_dir(path: &Path) -> Result<PathBuf, AppDirError> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(path.to_path_buf()),
        Err(source) => Err(AppDirError::CreateDir {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn base_dir() -> Option<PathBuf> {
    let overridden = BASE_OVERRIDE
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .clone();
    overridden
        .or_else(|| {
            std::env::var_os(CONFIG_HOME_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
        .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
}

#[cfg(test)]
pub(crate) fn set_config_base_override(path: Option<PathBuf>) {
    *BASE_OVERRIDE.lock().unwrap_or_else(|err| err.into_inner()) = path;
}
