use std::sync::{Arc, Mutex};

use anyhow::{Result, Context};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::Notify;

use super::processing::prepare_for_output;
use crate::engine::{decode_wav, AudioBuffer, RemoteClip};

/// How a loaded item left the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSignal {
    Ended,
    Error(String),
}

/// The single playback device shared by every item of a session.
///
/// Only the playback controller touches it while a session is active.
#[async_trait]
pub trait PlaybackDevice: Send + Sync {
    /// Load a clip, replacing whatever was loaded before
    async fn load(&mut self, clip: &RemoteClip) -> Result<()>;
    /// Start (or resume) the loaded clip
    fn play(&mut self) -> Result<()>;
    /// Resolves when the loaded clip ends or the device reports an error
    async fn wait_end(&mut self) -> DeviceSignal;
    fn pause(&mut self);
    /// Drop the loaded clip
    fn reset(&mut self);
}

pub type SharedDevice = Arc<tokio::sync::Mutex<Box<dyn PlaybackDevice>>>;

pub fn shared(device: impl PlaybackDevice + 'static) -> SharedDevice {
    Arc::new(tokio::sync::Mutex::new(Box::new(device)))
}

#[derive(Default)]
struct PlayState {
    samples: Vec<f32>,
    position: usize,
    playing: bool,
    finished: bool,
    error: Option<String>,
}

/// Default output device via cpal.
///
/// The output stream is opened on the first load and kept for the lifetime
/// of the device; clips are swapped into it rather than opening a new stream
/// per item.
pub struct CpalDevice {
    state: Arc<Mutex<PlayState>>,
    notify: Arc<Notify>,
    stream: Option<cpal::Stream>,
    sample_rate: u32,
    channels: u16,
    loaded: bool,
}

// Safety: cpal::Stream on macOS wraps a CoreAudio AudioUnit which is thread-safe.
// CpalDevice is only reached through the SharedDevice mutex, so concurrent access
// to the stream is impossible.
unsafe impl Send for CpalDevice {}
unsafe impl Sync for CpalDevice {}

impl CpalDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PlayState::default())),
            notify: Arc::new(Notify::new()),
            stream: None,
            sample_rate: 0,
            channels: 0,
            loaded: false,
        }
    }

    fn ensure_stream(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host.default_output_device()
            .context("No output device available")?;

        let config = device.default_output_config()
            .context("Failed to get default output config")?;

        self.sample_rate = config.sample_rate().0;
        self.channels = config.channels();

        let state = Arc::clone(&self.state);
        let notify = Arc::clone(&self.notify);
        let err_state = Arc::clone(&self.state);
        let err_notify = Arc::clone(&self.notify);

        let stream_config: cpal::StreamConfig = config.into();

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut st = state.lock().unwrap();
                if !st.playing {
                    data.fill(0.0);
                    return;
                }
                let remaining = st.samples.len() - st.position;
                let n = remaining.min(data.len());
                let start = st.position;
                data[..n].copy_from_slice(&st.samples[start..start + n]);
                data[n..].fill(0.0);
                st.position += n;
                if st.position >= st.samples.len() {
                    st.playing = false;
                    st.finished = true;
                    notify.notify_one();
                }
            },
            move |err| {
                tracing::error!("Audio playback error: {}", err);
                err_state.lock().unwrap().error = Some(err.to_string());
                err_notify.notify_one();
            },
            None,
        ).context("Failed to build output stream")?;

        stream.play().context("Failed to start output stream")?;
        self.stream = Some(stream);

        tracing::info!("Audio output opened ({}Hz, {} channels)", self.sample_rate, self.channels);
        Ok(())
    }
}

impl Default for CpalDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Interleaved samples for a device, converted on the blocking pool so long
/// clips don't stall the runtime between items
pub async fn output_samples(clip: &RemoteClip, device_rate: u32, device_channels: u16) -> Result<Vec<f32>> {
    let media = clip.media();
    let path = clip.path();

    tokio::task::spawn_blocking(move || {
        let media: Arc<AudioBuffer> = match media {
            Some(m) => m,
            None => Arc::new(decode_wav(&path.context("Clip has been released")?)?),
        };
        prepare_for_output(&media, device_rate, device_channels)
    })
    .await
    .context("Sample conversion task failed")?
}

#[async_trait]
impl PlaybackDevice for CpalDevice {
    async fn load(&mut self, clip: &RemoteClip) -> Result<()> {
        self.ensure_stream()?;

        let samples = output_samples(clip, self.sample_rate, self.channels).await?;

        let mut st = self.state.lock().unwrap();
        *st = PlayState { samples, ..PlayState::default() };
        self.loaded = true;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if !self.loaded {
            anyhow::bail!("Nothing loaded");
        }
        if let Some(stream) = &self.stream {
            stream.play().context("Output stream refused to play")?;
        }
        self.state.lock().unwrap().playing = true;
        Ok(())
    }

    async fn wait_end(&mut self) -> DeviceSignal {
        loop {
            let notified = self.notify.notified();
            {
                let mut st = self.state.lock().unwrap();
                if let Some(err) = st.error.take() {
                    return DeviceSignal::Error(err);
                }
                if st.finished {
                    return DeviceSignal::Ended;
                }
            }
            notified.await;
        }
    }

    fn pause(&mut self) {
        self.state.lock().unwrap().playing = false;
    }

    fn reset(&mut self) {
        *self.state.lock().unwrap() = PlayState::default();
        self.loaded = false;
    }
}
