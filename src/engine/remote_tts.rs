use async_trait::async_trait;
use serde::Serialize;

use super::{RemoteSynthesizer, SpeechRequest};
use crate::error::NarrationError;

const USER_AGENT: &str = "CartesianCoach/0.1";

#[derive(Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// Remote synthesis against an OpenAI-compatible `/audio/speech` endpoint.
/// Always asks for WAV so the payload can be decoded locally.
pub struct OpenAiSpeech {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    default_voice: String,
}

impl OpenAiSpeech {
    pub fn new(base_url: &str, api_key: String, model: String, default_voice: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            default_voice,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/speech", self.base_url)
    }
}

#[async_trait]
impl RemoteSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, NarrationError> {
        let voice = request.voice_id.as_deref().unwrap_or(&self.default_voice);
        let body = SpeechBody {
            model: &self.model,
            input: &request.text,
            voice,
            response_format: "wav",
        };

        let resp = self.client.post(self.endpoint())
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(NarrationError::remote(Some(status.as_u16()), message));
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(NarrationError::remote(Some(status.as_u16()), "empty audio payload"));
        }

        tracing::debug!("Remote synthesis returned {} bytes for {} chars", bytes.len(), request.text.len());
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "openai-speech"
    }
}
