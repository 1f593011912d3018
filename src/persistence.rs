use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::state::Settings;

const APP_DIR: &str = "CartesianCoach";
const SETTINGS_FILE: &str = "settings.json";

pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
}

pub fn load_settings() -> Settings {
    match settings_path() {
        Some(path) => load_settings_from(&path),
        None => {
            tracing::warn!("No config directory on this platform. Using defaults.");
            Settings::default()
        }
    }
}

pub fn load_settings_from(path: &Path) -> Settings {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No stored settings found. Using defaults.");
            return Settings::default();
        }
        Err(e) => {
            tracing::warn!("Failed to read settings file {}: {}. Using defaults.", path.display(), e);
            return Settings::default();
        }
    };

    let settings = match serde_json::from_str::<Settings>(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to deserialize stored settings: {}. Using defaults.", e);
            return Settings::default();
        }
    };

    if let Err(e) = settings.validate() {
        tracing::warn!("{}. Using defaults.", e);
        return Settings::default();
    }
    settings
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Settings saved to {}", path.display());
    Ok(())
}
