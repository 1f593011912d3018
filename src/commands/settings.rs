use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::persistence;
use crate::state::{AppState, Settings};

pub fn get_settings(state: &AppState) -> Settings {
    state.settings.clone()
}

pub fn get_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Write a default settings file to the platform config directory
pub fn init_config(force: bool) -> anyhow::Result<PathBuf> {
    let path = persistence::settings_path().context("No config directory on this platform")?;
    init_config_at(&path, force)?;
    Ok(path)
}

pub fn init_config_at(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    persistence::save_settings_to(path, &Settings::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CartesianCoach").join("settings.json");

        init_config_at(&path, false).unwrap();
        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["playback"]["pause"], 2);
        assert_eq!(written["remote"]["api_key_env"], "OPENAI_API_KEY");

        assert!(init_config_at(&path, false).is_err());
        assert!(init_config_at(&path, true).is_ok());
    }
}
