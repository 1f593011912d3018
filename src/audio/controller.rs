use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::playback::{DeviceSignal, PlaybackDevice, SharedDevice};
use super::Playlist;
use crate::engine::{AudioSource, LocalUtterance, RemoteClip, TtsOptions};
use crate::error::NarrationError;
use crate::platform::Narrator;

/// Hard per-item limit. A device that never reports an end is abandoned
/// after this long and the session moves on.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries of a rejected `play()` call before the item is given up
pub const DEFAULT_PLAY_RETRIES: u32 = 1;

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Silence between two played items
    pub pause: Duration,
    pub item_timeout: Duration,
    pub play_retries: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            pause: Duration::from_secs(2),
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            play_retries: DEFAULT_PLAY_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Playing(usize),
    Pausing,
    Stopped,
    Completed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed)
    }
}

/// Why an item stopped playing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemEvent {
    Ended,
    Errored(String),
    TimedOut,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Played(ItemEvent),
    /// `Unavailable` entry, never loaded
    Skipped,
    /// Session ended before this index
    NotReached,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub status: SessionStatus,
    pub outcomes: Vec<ItemOutcome>,
    pub item_timeout: Duration,
}

impl SessionReport {
    /// Per-item failures that the session absorbed, in playlist order
    pub fn failures(&self) -> Vec<NarrationError> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| match outcome {
                ItemOutcome::Played(ItemEvent::TimedOut) => Some(timed_out(index, self.item_timeout)),
                ItemOutcome::Played(ItemEvent::Errored(msg)) => Some(NarrationError::PlaybackDevice(msg.clone())),
                _ => None,
            })
            .collect()
    }
}

fn timed_out(index: usize, timeout: Duration) -> NarrationError {
    NarrationError::ItemTimedOut { index, timeout_ms: timeout.as_millis() as u64 }
}

/// Progress notifications for the presentation layer.
///
/// `on_complete` is called exactly once per session, including stopped ones.
pub trait PlaybackListener: Send + 'static {
    /// Called before the item is loaded
    fn on_item_start(&mut self, index: usize);
    fn on_item_skipped(&mut self, _index: usize) {}
    fn on_item_end(&mut self, _index: usize, _event: &ItemEvent) {}
    fn on_complete(&mut self, status: SessionStatus);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    ItemStarted { index: usize },
    ItemSkipped { index: usize },
    ItemEnded { index: usize, event: ItemEvent },
    Complete { status: SessionStatus },
}

impl PlaybackListener for mpsc::UnboundedSender<PlaybackEvent> {
    fn on_item_start(&mut self, index: usize) {
        let _ = self.send(PlaybackEvent::ItemStarted { index });
    }

    fn on_item_skipped(&mut self, index: usize) {
        let _ = self.send(PlaybackEvent::ItemSkipped { index });
    }

    fn on_item_end(&mut self, index: usize, event: &ItemEvent) {
        let _ = self.send(PlaybackEvent::ItemEnded { index, event: event.clone() });
    }

    fn on_complete(&mut self, status: SessionStatus) {
        let _ = self.send(PlaybackEvent::Complete { status });
    }
}

/// Cancels a session. Cloneable; safe to call from any state, any number of times.
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Returns true only for the call that actually requested the stop
    pub fn stop(&self) -> bool {
        self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        })
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A running session
pub struct PlaybackRun {
    pub completion: JoinHandle<SessionReport>,
    pub stop: StopHandle,
    pub status: watch::Receiver<SessionStatus>,
}

impl PlaybackRun {
    pub async fn wait(self) -> SessionReport {
        match self.completion.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Playback session task failed: {}", e);
                SessionReport { status: SessionStatus::Stopped, outcomes: Vec::new(), item_timeout: Duration::ZERO }
            }
        }
    }
}

/// Plays a playlist item by item through one shared device
pub struct PlaybackController {
    device: SharedDevice,
    narrator: Option<Arc<dyn Narrator>>,
    narrator_options: TtsOptions,
    config: PlaybackConfig,
}

impl PlaybackController {
    pub fn new(
        device: SharedDevice,
        narrator: Option<Arc<dyn Narrator>>,
        narrator_options: TtsOptions,
        config: PlaybackConfig,
    ) -> Self {
        Self { device, narrator, narrator_options, config }
    }

    /// Start a session on the runtime. The device stays locked until the
    /// session is over, so a second `play` waits for the first to finish.
    pub fn play<L: PlaybackListener>(&self, playlist: Arc<Playlist>, listener: L) -> PlaybackRun {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(SessionStatus::Idle);

        let session = Session {
            device: Arc::clone(&self.device),
            narrator: self.narrator.clone(),
            narrator_options: self.narrator_options.clone(),
            config: self.config.clone(),
            playlist,
            stop_rx,
            status_tx,
            listener,
        };

        PlaybackRun {
            completion: tokio::spawn(session.run()),
            stop: StopHandle { tx: Arc::new(stop_tx) },
            status: status_rx,
        }
    }
}

struct Session<L> {
    device: SharedDevice,
    narrator: Option<Arc<dyn Narrator>>,
    narrator_options: TtsOptions,
    config: PlaybackConfig,
    playlist: Arc<Playlist>,
    stop_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<SessionStatus>,
    listener: L,
}

impl<L: PlaybackListener> Session<L> {
    async fn run(mut self) -> SessionReport {
        let playlist = Arc::clone(&self.playlist);
        let mut outcomes = vec![ItemOutcome::NotReached; playlist.len()];

        let device = Arc::clone(&self.device);
        let mut device = device.lock().await;

        let mut pause_pending = false;
        let mut stopped = false;

        for (index, source) in playlist.iter().enumerate() {
            if self.stop_requested() {
                stopped = true;
                break;
            }

            if let AudioSource::Unavailable { reason } = source {
                tracing::debug!("Skipping item {}: {}", index, reason);
                outcomes[index] = ItemOutcome::Skipped;
                self.listener.on_item_skipped(index);
                continue;
            }

            if pause_pending {
                self.set_status(SessionStatus::Pausing);
                if !self.pause_between_items().await {
                    stopped = true;
                    break;
                }
            }

            self.set_status(SessionStatus::Playing(index));
            self.listener.on_item_start(index);

            let event = match source {
                AudioSource::RemoteClip(clip) => self.play_clip(&mut **device, index, clip).await,
                AudioSource::LocalUtterance(utterance) => self.speak(index, utterance).await,
                AudioSource::Unavailable { .. } => continue,
            };

            tracing::debug!("Item {} finished: {:?}", index, event);
            self.listener.on_item_end(index, &event);
            outcomes[index] = ItemOutcome::Played(event.clone());

            if event == ItemEvent::Stopped {
                stopped = true;
                break;
            }
            pause_pending = true;
        }

        device.reset();

        let status = if stopped { SessionStatus::Stopped } else { SessionStatus::Completed };
        self.set_status(status);
        tracing::info!("Playback session {:?}", status);
        self.listener.on_complete(status);

        SessionReport { status, outcomes, item_timeout: self.config.item_timeout }
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    fn set_status(&self, status: SessionStatus) {
        self.status_tx.send_replace(status);
    }

    /// False if the session was stopped during the pause
    async fn pause_between_items(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stop_rx) => false,
            _ = tokio::time::sleep(self.config.pause) => true,
        }
    }

    fn start_device(&self, device: &mut dyn PlaybackDevice, index: usize) -> Result<(), String> {
        let mut last_err = String::new();
        for attempt in 0..=self.config.play_retries {
            match device.play() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!("Item {} play attempt {} rejected: {}", index, attempt + 1, e);
                    last_err = e.to_string();
                }
            }
        }
        Err(last_err)
    }

    async fn play_clip(&mut self, device: &mut dyn PlaybackDevice, index: usize, clip: &RemoteClip) -> ItemEvent {
        if let Err(e) = device.load(clip).await {
            tracing::warn!("Item {} failed to load: {:#}", index, e);
            return ItemEvent::Errored(e.to_string());
        }

        if let Err(e) = self.start_device(device, index) {
            device.reset();
            return ItemEvent::Errored(e);
        }

        let event = tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stop_rx) => ItemEvent::Stopped,
            signal = device.wait_end() => match signal {
                DeviceSignal::Ended => ItemEvent::Ended,
                DeviceSignal::Error(msg) => ItemEvent::Errored(msg),
            },
            _ = tokio::time::sleep(self.config.item_timeout) => ItemEvent::TimedOut,
        };

        match &event {
            ItemEvent::TimedOut => {
                tracing::warn!("{}", timed_out(index, self.config.item_timeout));
                device.pause();
            }
            ItemEvent::Stopped => {
                device.pause();
                device.reset();
            }
            ItemEvent::Errored(msg) => tracing::warn!("Item {} playback error: {}", index, msg),
            ItemEvent::Ended => {}
        }
        event
    }

    async fn speak(&mut self, index: usize, utterance: &LocalUtterance) -> ItemEvent {
        let Some(narrator) = self.narrator.clone() else {
            tracing::warn!("Item {} needs the local narrator but none is available", index);
            return ItemEvent::Errored("no local narrator".to_string());
        };

        let options = TtsOptions {
            voice_id: utterance.voice_id.clone(),
            ..self.narrator_options.clone()
        };

        let event = tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stop_rx) => ItemEvent::Stopped,
            result = narrator.speak(&utterance.text, &options) => match result {
                Ok(()) => ItemEvent::Ended,
                Err(e) => ItemEvent::Errored(e.to_string()),
            },
            _ = tokio::time::sleep(self.config.item_timeout) => ItemEvent::TimedOut,
        };

        match &event {
            ItemEvent::TimedOut => tracing::warn!("Narrator: {}", timed_out(index, self.config.item_timeout)),
            ItemEvent::Errored(msg) => tracing::warn!("Item {} narrator error: {}", index, msg),
            _ => {}
        }
        event
    }
}

/// Resolves once a stop has been requested. Never resolves if every stop
/// handle is gone.
async fn wait_for_stop(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}
