use std::sync::Arc;

use serde::{Serialize, Deserialize};

use super::{AudioSource, LocalUtterance, RemoteClip, RemoteSynthesizer, SpeechRequest, TtsOptions};
use crate::error::NarrationError;
use crate::platform::Narrator;

/// Which synthesis path the provider may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMode {
    /// Remote first, local narrator on any remote failure
    #[default]
    Auto,
    /// Never call the remote service
    LocalOnly,
}

/// Turns text into playable audio, remote first with a local fallback
pub struct SpeechProvider {
    remote: Option<Arc<dyn RemoteSynthesizer>>,
    narrator: Option<Arc<dyn Narrator>>,
    narrator_options: TtsOptions,
    mode: SynthesisMode,
}

impl SpeechProvider {
    pub fn new(
        remote: Option<Arc<dyn RemoteSynthesizer>>,
        narrator: Option<Arc<dyn Narrator>>,
        narrator_options: TtsOptions,
        mode: SynthesisMode,
    ) -> Self {
        Self { remote, narrator, narrator_options, mode }
    }

    fn remote_path(&self) -> Result<&Arc<dyn RemoteSynthesizer>, NarrationError> {
        if self.mode == SynthesisMode::LocalOnly {
            return Err(NarrationError::RemoteUnavailable("local-only mode".to_string()));
        }
        self.remote
            .as_ref()
            .ok_or_else(|| NarrationError::RemoteUnavailable("no credential configured".to_string()))
    }

    /// Fails when no output path exists at all
    pub fn ensure_supported(&self) -> Result<(), NarrationError> {
        if self.remote_path().is_err() && self.narrator.is_none() {
            return Err(NarrationError::UnsupportedEnvironment(
                "remote synthesis is unavailable and no local narrator is installed".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve one request to an `AudioSource`.
    ///
    /// Remote failures are logged and routed to the local narrator. The
    /// returned `LocalUtterance` is deferred: nothing is spoken until the
    /// playback controller reaches it.
    pub async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioSource, NarrationError> {
        let remote_err = match self.remote_path() {
            Ok(remote) => match remote.synthesize(request).await {
                Ok(bytes) => {
                    let clip = RemoteClip::from_bytes(&bytes).map_err(|e| NarrationError::ItemPrepFailed {
                        index: 0,
                        reason: format!("failed to store clip: {e}"),
                    })?;
                    return Ok(AudioSource::RemoteClip(clip));
                }
                Err(e) => {
                    tracing::warn!("Remote synthesis via {} failed: {}. Falling back to local narrator.", remote.name(), e);
                    e
                }
            },
            Err(e) => {
                tracing::debug!("{}; using local narrator", e);
                e
            }
        };

        if self.narrator.is_none() {
            return Err(remote_err);
        }

        Ok(AudioSource::LocalUtterance(LocalUtterance {
            text: request.text.clone(),
            voice_id: self.narrator_options.voice_id.clone(),
        }))
    }

    /// Eager fallback: speak the text immediately through the narrator
    pub async fn speak_now(&self, request: &SpeechRequest) -> Result<(), NarrationError> {
        let narrator = self.narrator.as_ref().ok_or_else(|| {
            NarrationError::UnsupportedEnvironment("no local narrator is installed".to_string())
        })?;
        narrator
            .speak(&request.text, &self.narrator_options)
            .await
            .map_err(|e| NarrationError::PlaybackDevice(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// Remote synthesizer that answers from a script, in call order
    pub struct ScriptedRemote {
        pub responses: Mutex<Vec<Result<Vec<u8>, NarrationError>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedRemote {
        pub fn new(responses: Vec<Result<Vec<u8>, NarrationError>>) -> Self {
            Self { responses: Mutex::new(responses), calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl RemoteSynthesizer for ScriptedRemote {
        async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, NarrationError> {
            self.calls.lock().unwrap().push(request.text.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(NarrationError::remote(None, "script exhausted"));
            }
            responses.remove(0)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Narrator that "speaks" for a fixed duration of (tokio) time
    pub struct FakeNarrator {
        pub spoken: Mutex<Vec<String>>,
        pub voices: Mutex<Vec<Option<String>>>,
        pub duration: Duration,
        pub fail: bool,
    }

    impl FakeNarrator {
        pub fn new(duration: Duration) -> Self {
            Self { spoken: Mutex::new(Vec::new()), voices: Mutex::new(Vec::new()), duration, fail: false }
        }

        pub fn failing() -> Self {
            Self { fail: true, ..Self::new(Duration::ZERO) }
        }
    }

    #[async_trait]
    impl Narrator for FakeNarrator {
        async fn speak(&self, text: &str, options: &TtsOptions) -> anyhow::Result<()> {
            self.spoken.lock().unwrap().push(text.to_string());
            self.voices.lock().unwrap().push(options.voice_id.clone());
            if self.fail {
                anyhow::bail!("narrator failed");
            }
            tokio::time::sleep(self.duration).await;
            Ok(())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::{FakeNarrator, ScriptedRemote};
    use super::*;
    use crate::engine::wav_bytes;

    fn narrator() -> Option<Arc<dyn Narrator>> {
        Some(Arc::new(FakeNarrator::new(Duration::from_millis(10))))
    }

    #[tokio::test]
    async fn remote_success_yields_owned_clip() {
        let remote = Arc::new(ScriptedRemote::new(vec![Ok(wav_bytes(100, 8000))]));
        let provider = SpeechProvider::new(Some(remote), narrator(), TtsOptions::default(), SynthesisMode::Auto);

        let source = provider.synthesize(&SpeechRequest::new("hello")).await.unwrap();
        match source {
            AudioSource::RemoteClip(clip) => {
                assert!(clip.is_owned());
                assert!(clip.path().unwrap().exists());
                clip.release();
            }
            other => panic!("expected remote clip, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn remote_failure_falls_back_without_speaking() {
        let remote = Arc::new(ScriptedRemote::new(vec![Err(NarrationError::remote(Some(500), "boom"))]));
        let fake = Arc::new(FakeNarrator::new(Duration::from_millis(10)));
        let provider = SpeechProvider::new(
            Some(remote.clone()),
            Some(fake.clone()),
            TtsOptions::default(),
            SynthesisMode::Auto,
        );

        let source = provider.synthesize(&SpeechRequest::new("hello")).await.unwrap();
        assert!(matches!(source, AudioSource::LocalUtterance(ref u) if u.text == "hello"));
        assert_eq!(remote.calls.lock().unwrap().len(), 1);
        assert!(fake.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_only_mode_skips_remote() {
        let remote = Arc::new(ScriptedRemote::new(vec![Ok(wav_bytes(100, 8000))]));
        let provider = SpeechProvider::new(
            Some(remote.clone()),
            narrator(),
            TtsOptions::default(),
            SynthesisMode::LocalOnly,
        );

        let source = provider.synthesize(&SpeechRequest::new("hello")).await.unwrap();
        assert!(matches!(source, AudioSource::LocalUtterance(_)));
        assert!(remote.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fallback_uses_the_narrator_voice() {
        let options = TtsOptions { voice_id: Some("en-gb".to_string()), ..TtsOptions::default() };
        let provider = SpeechProvider::new(None, narrator(), options, SynthesisMode::Auto);

        let request = SpeechRequest::new("hello").with_voice(Some("alloy".to_string()));
        let source = provider.synthesize(&request).await.unwrap();
        assert!(matches!(source, AudioSource::LocalUtterance(ref u) if u.voice_id.as_deref() == Some("en-gb")));
    }

    #[tokio::test]
    async fn remote_failure_without_narrator_is_an_error() {
        let remote = Arc::new(ScriptedRemote::new(vec![Err(NarrationError::remote(Some(503), "down"))]));
        let provider = SpeechProvider::new(Some(remote), None, TtsOptions::default(), SynthesisMode::Auto);

        assert!(provider.ensure_supported().is_ok());
        let result = provider.synthesize(&SpeechRequest::new("hello")).await;
        assert!(matches!(result, Err(NarrationError::RemoteCallFailed { status: Some(503), .. })));
    }

    #[test]
    fn no_paths_is_unsupported() {
        let provider = SpeechProvider::new(None, None, TtsOptions::default(), SynthesisMode::Auto);
        assert!(matches!(provider.ensure_supported(), Err(NarrationError::UnsupportedEnvironment(_))));
    }

    #[tokio::test]
    async fn speak_now_is_audible_immediately() {
        let fake = Arc::new(FakeNarrator::new(Duration::from_millis(1)));
        let provider = SpeechProvider::new(None, Some(fake.clone()), TtsOptions::default(), SynthesisMode::Auto);

        provider.speak_now(&SpeechRequest::new("now")).await.unwrap();
        assert_eq!(*fake.spoken.lock().unwrap(), vec!["now".to_string()]);
    }
}
