use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{find_program, run_narrator, Narrator};
use crate::engine::TtsOptions;

const BASE_WPM: f32 = 175.0;
const BASE_PITCH: f32 = 50.0;
const BASE_AMPLITUDE: f32 = 100.0;

/// espeak-ng (or classic espeak) narrator
pub struct EspeakNarrator {
    program: PathBuf,
}

impl EspeakNarrator {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    fn args(text: &str, options: &TtsOptions) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            format!("{}", (BASE_WPM * options.speed).round() as u32),
            "-p".to_string(),
            format!("{}", (BASE_PITCH * options.pitch).clamp(0.0, 99.0).round() as u32),
            "-a".to_string(),
            format!("{}", (BASE_AMPLITUDE * options.volume).clamp(0.0, 200.0).round() as u32),
        ];
        if let Some(voice) = &options.voice_id {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        args.push("--".to_string());
        args.push(text.to_string());
        args
    }
}

#[async_trait]
impl Narrator for EspeakNarrator {
    async fn speak(&self, text: &str, options: &TtsOptions) -> Result<()> {
        run_narrator(&self.program, Self::args(text, options)).await
    }

    fn name(&self) -> &str {
        "espeak"
    }
}

pub(crate) fn detect_narrator() -> Option<Arc<dyn Narrator>> {
    ["espeak-ng", "espeak"]
        .iter()
        .find_map(|name| find_program(name))
        .map(|p| Arc::new(EspeakNarrator::new(p)) as Arc<dyn Narrator>)
}
