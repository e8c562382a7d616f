use anyhow::Result;
use std::path::PathBuf;
use tauri::{AppHandle, Manager};

use crate::models::Settings;

pub fn db_path(app_handle: &AppHandle) -> Result<PathBuf> {
    let data_dir = app_handle.path().app_data_dir()?;
    Ok(data_dir.join("remindflow.db"))
}

pub fn settings_path(app_handle: &AppHandle) -> Result<PathBuf> {
    let data_dir = app_handle.path().app_data_dir()?;
    Ok(data_dir.join("config").join("settings.json"))
}

/// Settings with fallback to defaults on any read/parse problem.
pub fn read_settings(app_handle: &AppHandle) -> Settings {
    settings_path(app_handle)
        .ok()
        .filter(|path| path.exists())
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}
