use std::time::Duration;

use futures_util::future::join_all;

use super::Playlist;
use crate::engine::provider::SpeechProvider;
use crate::engine::{decode_wav, AudioSource, RemoteClip, SpeechRequest};
use crate::error::NarrationError;

pub const DEFAULT_PREP_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Upper bound for synthesizing and decoding a single item
    pub item_timeout: Duration,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self { item_timeout: DEFAULT_PREP_TIMEOUT }
    }
}

/// Resolve every request to an `AudioSource`, in input order.
///
/// Per-item failures become `Unavailable` entries; the only error returned
/// is `UnsupportedEnvironment`, checked before any work starts.
pub async fn prepare(
    provider: &SpeechProvider,
    requests: &[SpeechRequest],
    options: &PrepareOptions,
) -> Result<Playlist, NarrationError> {
    provider.ensure_supported()?;

    let items = join_all(
        requests
            .iter()
            .enumerate()
            .map(|(index, request)| prepare_item(provider, index, request, options.item_timeout)),
    )
    .await;

    let playlist = Playlist::new(items);
    tracing::info!(
        "Prepared {} item(s), {} available",
        playlist.len(),
        playlist.available_count()
    );
    Ok(playlist)
}

async fn prepare_item(
    provider: &SpeechProvider,
    index: usize,
    request: &SpeechRequest,
    timeout: Duration,
) -> AudioSource {
    match tokio::time::timeout(timeout, resolve(provider, index, request)).await {
        Ok(Ok(source)) => {
            tracing::debug!("Item {} ready as {}", index, source.kind());
            source
        }
        Ok(Err(e)) => {
            tracing::warn!("Item {} unavailable: {}", index, e);
            AudioSource::unavailable(e.to_string())
        }
        Err(_) => {
            let e = NarrationError::ItemPrepFailed {
                index,
                reason: format!("timed out after {}ms", timeout.as_millis()),
            };
            tracing::warn!("Item {} unavailable: {}", index, e);
            AudioSource::unavailable(e.to_string())
        }
    }
}

async fn resolve(
    provider: &SpeechProvider,
    index: usize,
    request: &SpeechRequest,
) -> Result<AudioSource, NarrationError> {
    let source = provider.synthesize(request).await.map_err(|e| match e {
        NarrationError::ItemPrepFailed { reason, .. } => NarrationError::ItemPrepFailed { index, reason },
        other => other,
    })?;

    if let AudioSource::RemoteClip(clip) = &source {
        if let Err(reason) = load_media(clip).await {
            clip.release();
            return Err(NarrationError::ItemPrepFailed { index, reason });
        }
    }
    Ok(source)
}

/// Decode the clip so its duration is known before playback starts
async fn load_media(clip: &RemoteClip) -> Result<(), String> {
    let path = clip.path().ok_or_else(|| "clip has been released".to_string())?;

    let buffer = tokio::task::spawn_blocking(move || decode_wav(&path))
        .await
        .map_err(|e| format!("decode task failed: {e}"))?
        .map_err(|e| format!("{e:#}"))?;

    if buffer.frames() == 0 {
        return Err("clip contains no audio".to_string());
    }

    tracing::debug!(
        "Clip decoded: {} bytes, {:.2}s",
        clip.byte_len(),
        buffer.duration().as_secs_f32()
    );
    clip.set_media(buffer);
    Ok(())
}
