#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use macos::*;

#[cfg(not(target_os = "macos"))]
mod linux;
#[cfg(not(target_os = "macos"))]
pub use linux::*;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::engine::TtsOptions;

/// The platform's built-in text-to-speech.
///
/// `speak` resolves once the narrator has finished. Dropping the future
/// silences the narrator.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn speak(&self, text: &str, options: &TtsOptions) -> Result<()>;
    fn name(&self) -> &str;
}

/// Returns the local narrator for this platform, if one is installed
pub fn get_narrator() -> Option<Arc<dyn Narrator>> {
    let narrator = detect_narrator();
    match &narrator {
        Some(n) => tracing::info!("Local narrator available: {}", n.name()),
        None => tracing::warn!("No local narrator found on this system"),
    }
    narrator
}

/// Locate an executable on PATH
pub(crate) fn find_program(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Run a narrator process until it exits. The child is killed if the
/// returned future is dropped.
pub(crate) async fn run_narrator(program: &PathBuf, args: Vec<String>) -> Result<()> {
    let status = tokio::process::Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await?;

    if !status.success() {
        anyhow::bail!("{} exited with {}", program.display(), status);
    }
    Ok(())
}
