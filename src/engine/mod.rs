pub mod provider;
pub mod remote_tts;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use tempfile::TempPath;

use crate::error::NarrationError;

/// Audio buffer for passing audio data between modules
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// One line of text to be spoken. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: Option<String>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), voice_id: None }
    }

    pub fn with_voice(mut self, voice_id: Option<String>) -> Self {
        self.voice_id = voice_id;
        self
    }
}

/// Local narrator options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsOptions {
    pub speed: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice_id: Option<String>,
}

impl Default for TtsOptions {
    fn default() -> Self {
        Self {
            speed: 0.9,
            pitch: 1.0,
            volume: 1.0,
            voice_id: None,
        }
    }
}

/// Where the bytes behind a clip live.
#[derive(Debug)]
enum ClipResource {
    /// Temp file created by us; deleted on release.
    Owned(Mutex<Option<TempPath>>),
    /// File supplied by the caller; never deleted.
    External(PathBuf),
}

/// Synthesized audio backed by an addressable file.
///
/// `media` is filled in by the preparation stage once the file has been
/// decoded and its duration is known.
#[derive(Debug)]
pub struct RemoteClip {
    resource: ClipResource,
    byte_len: u64,
    media: Mutex<Option<Arc<AudioBuffer>>>,
}

impl RemoteClip {
    /// Write a synthesized payload into a temp file owned by the clip
    pub fn from_bytes(bytes: &[u8]) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("cartesian-coach-")
            .suffix(".wav")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            resource: ClipResource::Owned(Mutex::new(Some(file.into_temp_path()))),
            byte_len: bytes.len() as u64,
            media: Mutex::new(None),
        })
    }

    /// Wrap a file the caller manages. Release leaves the file in place.
    pub fn from_external(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let byte_len = std::fs::metadata(&path)?.len();
        Ok(Self {
            resource: ClipResource::External(path),
            byte_len,
            media: Mutex::new(None),
        })
    }

    pub fn path(&self) -> Option<PathBuf> {
        match &self.resource {
            ClipResource::Owned(slot) => slot.lock().unwrap().as_ref().map(|p| p.to_path_buf()),
            ClipResource::External(path) => Some(path.clone()),
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.resource, ClipResource::Owned(_))
    }

    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    pub fn media(&self) -> Option<Arc<AudioBuffer>> {
        self.media.lock().unwrap().clone()
    }

    pub fn set_media(&self, buffer: AudioBuffer) {
        *self.media.lock().unwrap() = Some(Arc::new(buffer));
    }

    /// Known once the clip has been decoded
    pub fn duration(&self) -> Option<Duration> {
        self.media.lock().unwrap().as_ref().map(|m| m.duration())
    }

    /// Drop the decoded media and delete the temp file if we own it.
    /// Returns true if a file was deleted by this call.
    pub fn release(&self) -> bool {
        self.media.lock().unwrap().take();

        let ClipResource::Owned(slot) = &self.resource else {
            return false;
        };
        let Some(temp_path) = slot.lock().unwrap().take() else {
            return false;
        };

        let clip_path = temp_path.to_path_buf();
        if let Err(e) = temp_path.close() {
            tracing::warn!("Failed to delete clip file {}: {}", clip_path.display(), e);
        }
        true
    }
}

/// Speech that plays through the local narrator and has no addressable media
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUtterance {
    pub text: String,
    /// Narrator voice, fixed when the item is prepared
    pub voice_id: Option<String>,
}

/// One playlist entry, produced per `SpeechRequest` in request order
#[derive(Debug)]
pub enum AudioSource {
    RemoteClip(RemoteClip),
    LocalUtterance(LocalUtterance),
    Unavailable { reason: String },
}

impl AudioSource {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RemoteClip(_) => "remote_clip",
            Self::LocalUtterance(_) => "local_utterance",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// Remote synthesis: text -> encoded audio payload
#[async_trait]
pub trait RemoteSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, NarrationError>;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}

/// Decode a WAV file into a mono-or-interleaved f32 buffer
pub fn decode_wav(path: &Path) -> anyhow::Result<AudioBuffer> {
    use anyhow::Context;

    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open clip {}", path.display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Failed to read float samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("Failed to read integer samples")?
        }
    };

    Ok(AudioBuffer {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

#[cfg(test)]
pub(crate) fn wav_bytes(duration_ms: u32, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = sample_rate as u64 * duration_ms as u64 / 1000;
        for i in 0..frames {
            let v = ((i as f32 * 0.05).sin() * 8000.0) as i16;
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
