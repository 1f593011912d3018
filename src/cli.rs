use clap::{Parser, Subcommand};

use crate::engine::provider::SynthesisMode;
use crate::state::{PauseDuration, Settings};

#[derive(Parser, Debug)]
#[command(name = "cartesian-coach", version, about = "Speak the four Cartesian Logic questions for a belief")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Seconds of silence between questions (1, 2, 3 or 5)
    #[arg(long, global = true, value_parser = parse_pause)]
    pub pause: Option<PauseDuration>,

    /// Never call the remote speech service
    #[arg(long, global = true)]
    pub local_only: bool,

    /// Give up on a question after this many seconds
    #[arg(long, global = true)]
    pub item_timeout: Option<u64>,

    /// Use the built-in question templates instead of the language model
    #[arg(long, global = true)]
    pub no_llm: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the questions for a belief and speak them
    Ask {
        /// The limiting belief, e.g. "I can't speak in public"
        belief: String,
    },

    /// Speak the given lines in order
    Speak {
        #[arg(required = true)]
        lines: Vec<String>,
    },

    /// Print the questions for a belief without speaking
    Questions {
        belief: String,
    },

    /// Print the effective settings
    ShowConfig,

    /// Write a default settings file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_pause(raw: &str) -> Result<PauseDuration, String> {
    let secs: u64 = raw.parse().map_err(|_| format!("'{raw}' is not a number of seconds"))?;
    PauseDuration::try_from(secs).map_err(|e| e.to_string())
}

impl Args {
    /// Fold command-line overrides into the loaded settings
    pub fn apply(&self, settings: &mut Settings) -> SynthesisMode {
        if let Some(pause) = self.pause {
            settings.playback.pause = pause;
        }
        if let Some(secs) = self.item_timeout.filter(|s| *s > 0) {
            settings.playback.item_timeout_s = secs;
        }
        if self.no_llm {
            settings.questions.use_llm = false;
        }
        if self.local_only {
            SynthesisMode::LocalOnly
        } else {
            SynthesisMode::Auto
        }
    }
}
