use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Serialize, Deserialize};
use tokio::sync::watch;

use crate::audio::{
    PlaybackConfig, PlaybackController, Playlist, PrepareOptions, SessionStatus, SharedDevice, StopHandle,
};
use crate::engine::provider::{SpeechProvider, SynthesisMode};
use crate::engine::remote_tts::OpenAiSpeech;
use crate::engine::{RemoteSynthesizer, TtsOptions};
use crate::error::NarrationError;
use crate::platform::Narrator;
use crate::questions::QuestionGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppStatus {
    Idle,
    Preparing,
    Playing,
}

impl Default for AppStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// Silence between questions. Only the listed lengths are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum PauseDuration {
    One,
    #[default]
    Two,
    Three,
    Five,
}

impl PauseDuration {
    pub fn seconds(self) -> u64 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Five => 5,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.seconds())
    }
}

impl TryFrom<u64> for PauseDuration {
    type Error = NarrationError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        match secs {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            5 => Ok(Self::Five),
            other => Err(NarrationError::Config(format!(
                "pause must be 1, 2, 3 or 5 seconds, got {other}"
            ))),
        }
    }
}

impl From<PauseDuration> for u64 {
    fn from(pause: PauseDuration) -> Self {
        pause.seconds()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub remote: RemoteSettings,
    pub narrator: TtsOptions,
    pub playback: PlaybackSettings,
    pub questions: QuestionSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), NarrationError> {
        if self.playback.item_timeout_s == 0 {
            return Err(NarrationError::Config("item_timeout_s must be greater than zero".to_string()));
        }
        if self.playback.prep_timeout_s == 0 {
            return Err(NarrationError::Config("prep_timeout_s must be greater than zero".to_string()));
        }
        if self.remote.enabled && self.remote.base_url.trim().is_empty() {
            return Err(NarrationError::Config("remote.base_url is empty".to_string()));
        }
        Ok(())
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            pause: self.playback.pause.as_duration(),
            item_timeout: Duration::from_secs(self.playback.item_timeout_s),
            play_retries: self.playback.play_retries,
        }
    }

    pub fn prepare_options(&self) -> PrepareOptions {
        PrepareOptions { item_timeout: Duration::from_secs(self.playback.prep_timeout_s) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub enabled: bool,
    pub base_url: String,
    /// Name of the environment variable holding the API key. The key itself
    /// is never stored.
    pub api_key_env: String,
    pub tts_model: String,
    pub voice: String,
}

impl RemoteSettings {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            tts_model: "gpt-4o-mini-tts".to_string(),
            voice: "alloy".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub pause: PauseDuration,
    pub item_timeout_s: u64,
    pub prep_timeout_s: u64,
    pub play_retries: u32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            pause: PauseDuration::default(),
            item_timeout_s: crate::audio::controller::DEFAULT_ITEM_TIMEOUT.as_secs(),
            prep_timeout_s: crate::audio::prepare::DEFAULT_PREP_TIMEOUT.as_secs(),
            play_retries: crate::audio::controller::DEFAULT_PLAY_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionSettings {
    pub use_llm: bool,
    pub model: String,
}

impl Default for QuestionSettings {
    fn default() -> Self {
        Self {
            use_llm: true,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// The prepared playlist plus, once started, the running session's handles
pub struct ActiveSession {
    pub playlist: Arc<Playlist>,
    pub stop: Option<StopHandle>,
    pub status: Option<watch::Receiver<SessionStatus>>,
}

impl ActiveSession {
    pub fn is_playing(&self) -> bool {
        self.status.as_ref().is_some_and(|rx| !rx.borrow().is_terminal())
    }
}

pub struct AppState {
    pub settings: Settings,
    pub provider: SpeechProvider,
    pub controller: PlaybackController,
    pub generator: Option<QuestionGenerator>,
    pub prepare_options: PrepareOptions,
    pub preparing: Mutex<bool>,
    pub session: Mutex<Option<ActiveSession>>,
}

impl AppState {
    /// Wire the synthesis and playback stack from settings.
    ///
    /// The remote path is only built when enabled, not in local-only mode and
    /// a key is present in the environment.
    pub fn from_settings(
        settings: Settings,
        mode: SynthesisMode,
        device: SharedDevice,
        narrator: Option<Arc<dyn Narrator>>,
    ) -> Self {
        let api_key = if settings.remote.enabled && mode == SynthesisMode::Auto {
            settings.remote.api_key()
        } else {
            None
        };
        if settings.remote.enabled && mode == SynthesisMode::Auto && api_key.is_none() {
            tracing::info!(
                "{} is not set. Remote synthesis disabled.",
                settings.remote.api_key_env
            );
        }

        let remote: Option<Arc<dyn RemoteSynthesizer>> = api_key.clone().map(|key| {
            Arc::new(OpenAiSpeech::new(
                &settings.remote.base_url,
                key,
                settings.remote.tts_model.clone(),
                settings.remote.voice.clone(),
            )) as Arc<dyn RemoteSynthesizer>
        });

        let generator = api_key
            .filter(|_| settings.questions.use_llm)
            .map(|key| QuestionGenerator::new(&settings.remote.base_url, key, settings.questions.model.clone()));

        let provider = SpeechProvider::new(remote, narrator.clone(), settings.narrator.clone(), mode);
        let controller =
            PlaybackController::new(device, narrator, settings.narrator.clone(), settings.playback_config());

        Self {
            prepare_options: settings.prepare_options(),
            settings,
            provider,
            controller,
            generator,
            preparing: Mutex::new(false),
            session: Mutex::new(None),
        }
    }

    pub fn status(&self) -> AppStatus {
        if *self.preparing.lock().unwrap() {
            return AppStatus::Preparing;
        }
        match self.session.lock().unwrap().as_ref() {
            Some(session) if session.is_playing() => AppStatus::Playing,
            _ => AppStatus::Idle,
        }
    }
}
