use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::{find_program, run_narrator, Narrator};
use crate::engine::TtsOptions;

// `say` default speaking rate in words per minute
const BASE_WPM: f32 = 175.0;

pub struct MacOsNarrator {
    program: PathBuf,
}

impl MacOsNarrator {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    fn args(text: &str, options: &TtsOptions) -> Vec<String> {
        let mut args = vec![
            "-r".to_string(),
            format!("{}", (BASE_WPM * options.speed).round() as u32),
        ];
        if let Some(voice) = &options.voice_id {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        // `say` has no pitch or volume flags; embedded commands cover volume
        if options.volume < 1.0 {
            args.push(format!("[[volm {:.2}]] {}", options.volume.max(0.0), text));
        } else {
            args.push(text.to_string());
        }
        args
    }
}

#[async_trait]
impl Narrator for MacOsNarrator {
    async fn speak(&self, text: &str, options: &TtsOptions) -> Result<()> {
        run_narrator(&self.program, Self::args(text, options)).await
    }

    fn name(&self) -> &str {
        "say"
    }
}

pub(crate) fn detect_narrator() -> Option<Arc<dyn Narrator>> {
    find_program("say").map(|p| Arc::new(MacOsNarrator::new(p)) as Arc<dyn Narrator>)
}
