use std::sync::{Arc, Mutex};

use crate::audio::{self, PlaybackListener, PlaybackRun, Playlist};
use crate::engine::SpeechRequest;
use crate::error::NarrationError;
use crate::questions::{generate_questions, CartesianQuestions};
use crate::state::{ActiveSession, AppState, AppStatus};

/// Clears the preparing flag however preparation ends
struct PreparingGuard<'a>(&'a Mutex<bool>);

impl Drop for PreparingGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap() = false;
    }
}

fn begin_preparing(state: &AppState) -> Result<PreparingGuard<'_>, NarrationError> {
    let mut preparing = state.preparing.lock().unwrap();
    if *preparing {
        return Err(NarrationError::Busy("preparing"));
    }
    if state.session.lock().unwrap().as_ref().is_some_and(ActiveSession::is_playing) {
        return Err(NarrationError::Busy("playing"));
    }
    *preparing = true;
    Ok(PreparingGuard(&state.preparing))
}

pub fn get_status(state: &AppState) -> AppStatus {
    state.status()
}

/// Prepare a new playlist, releasing the previous one first
pub async fn prepare_session(
    state: &AppState,
    requests: Vec<SpeechRequest>,
) -> Result<Arc<Playlist>, NarrationError> {
    let _guard = begin_preparing(state)?;
    release_session(state);

    let playlist = Arc::new(audio::prepare(&state.provider, &requests, &state.prepare_options).await?);
    *state.session.lock().unwrap() = Some(ActiveSession {
        playlist: Arc::clone(&playlist),
        stop: None,
        status: None,
    });
    Ok(playlist)
}

/// Start playing the prepared playlist
pub fn play_session<L: PlaybackListener>(state: &AppState, listener: L) -> Result<PlaybackRun, NarrationError> {
    if *state.preparing.lock().unwrap() {
        return Err(NarrationError::Busy("preparing"));
    }

    let mut session = state.session.lock().unwrap();
    let active = session.as_mut().ok_or(NarrationError::NoSession)?;
    if active.is_playing() {
        return Err(NarrationError::Busy("playing"));
    }

    let run = state.controller.play(Arc::clone(&active.playlist), listener);
    active.stop = Some(run.stop.clone());
    active.status = Some(run.status.clone());
    tracing::info!("Playing session of {} item(s)", active.playlist.len());
    Ok(run)
}

/// Returns false when there is nothing to stop
pub fn stop_session(state: &AppState) -> bool {
    let session = state.session.lock().unwrap();
    match session.as_ref().and_then(|s| s.stop.as_ref()) {
        Some(stop) => {
            let stopped = stop.stop();
            if stopped {
                tracing::info!("Stop requested");
            }
            stopped
        }
        None => false,
    }
}

/// Stop any running session and free its clip files
pub fn release_session(state: &AppState) -> usize {
    let Some(session) = state.session.lock().unwrap().take() else {
        return 0;
    };
    if let Some(stop) = &session.stop {
        stop.stop();
    }
    audio::release(&session.playlist)
}

pub struct Narration {
    pub questions: CartesianQuestions,
    pub run: PlaybackRun,
}

/// Generate the questions for a belief, prepare them and start playback
pub async fn narrate_belief<L: PlaybackListener>(
    state: &AppState,
    belief: &str,
    listener: L,
) -> Result<Narration, NarrationError> {
    match state.status() {
        AppStatus::Preparing => return Err(NarrationError::Busy("preparing")),
        AppStatus::Playing => return Err(NarrationError::Busy("playing")),
        AppStatus::Idle => {}
    }

    let questions = generate_questions(state.generator.as_ref(), belief).await?;
    prepare_session(state, questions.to_requests(None)).await?;
    let run = play_session(state, listener)?;
    Ok(Narration { questions, run })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::*;
    use crate::audio::controller::ItemOutcome;
    use crate::audio::playback::shared;
    use crate::audio::playback::testing::FakeDevice;
    use crate::audio::{PlaybackEvent, SessionStatus};
    use crate::engine::provider::testing::FakeNarrator;
    use crate::engine::provider::SynthesisMode;
    use crate::engine::{wav_bytes, AudioSource, RemoteClip};
    use crate::platform::Narrator;
    use crate::state::Settings;

    fn local_state(narrator: Option<Arc<FakeNarrator>>) -> AppState {
        AppState::from_settings(
            Settings::default(),
            SynthesisMode::LocalOnly,
            shared(FakeDevice::new(Vec::new())),
            narrator.map(|n| n as Arc<dyn Narrator>),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn narrates_four_questions_in_order() {
        let narrator = Arc::new(FakeNarrator::new(Duration::from_secs(1)));
        let state = local_state(Some(narrator.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let started = Instant::now();
        let narration = narrate_belief(&state, "I can't sing in public", tx).await.unwrap();
        assert_eq!(get_status(&state), AppStatus::Playing);

        let report = narration.run.wait().await;
        assert_eq!(report.status, SessionStatus::Completed);
        assert!(report.outcomes.iter().all(|o| *o == ItemOutcome::Played(audio::controller::ItemEvent::Ended)));

        // four 1s utterances, three 2s pauses
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_millis(10_100));

        let spoken = narrator.spoken.lock().unwrap().clone();
        assert_eq!(spoken, narration.questions.as_list().map(str::to_string).to_vec());
        assert_eq!(spoken[0], "What would happen if you sing in public?");

        let mut started_items = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let PlaybackEvent::ItemStarted { index } = event {
                started_items.push(index);
            }
        }
        assert_eq!(started_items, vec![0, 1, 2, 3]);
        assert_eq!(get_status(&state), AppStatus::Idle);
    }

    #[tokio::test]
    async fn play_needs_a_prepared_session() {
        let state = local_state(Some(Arc::new(FakeNarrator::new(Duration::from_millis(1)))));
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(play_session(&state, tx), Err(NarrationError::NoSession)));
        assert!(!stop_session(&state));
    }

    #[tokio::test(start_paused = true)]
    async fn second_play_is_refused_and_stop_ends_session() {
        let state = local_state(Some(Arc::new(FakeNarrator::new(Duration::from_secs(5)))));
        prepare_session(&state, vec![SpeechRequest::new("one"), SpeechRequest::new("two")])
            .await
            .unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        let run = play_session(&state, tx).unwrap();

        let (tx2, _rx2) = mpsc::unbounded_channel();
        assert!(matches!(play_session(&state, tx2), Err(NarrationError::Busy("playing"))));
        assert!(matches!(
            prepare_session(&state, vec![SpeechRequest::new("three")]).await,
            Err(NarrationError::Busy("playing"))
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(stop_session(&state));
        assert!(!stop_session(&state));

        let report = run.wait().await;
        assert_eq!(report.status, SessionStatus::Stopped);
        assert_eq!(report.outcomes[1], ItemOutcome::NotReached);
        assert_eq!(get_status(&state), AppStatus::Idle);
    }

    #[tokio::test]
    async fn release_frees_clips_once() {
        let state = local_state(None);
        let playlist = Playlist::new(vec![
            AudioSource::RemoteClip(RemoteClip::from_bytes(&wav_bytes(50, 8000)).unwrap()),
            AudioSource::RemoteClip(RemoteClip::from_bytes(&wav_bytes(50, 8000)).unwrap()),
        ]);
        *state.session.lock().unwrap() = Some(ActiveSession {
            playlist: Arc::new(playlist),
            stop: None,
            status: None,
        });

        assert_eq!(release_session(&state), 2);
        assert_eq!(release_session(&state), 0);
    }

    #[tokio::test]
    async fn no_output_path_fails_and_clears_preparing() {
        let state = local_state(None);
        let result = prepare_session(&state, vec![SpeechRequest::new("hello")]).await;
        assert!(matches!(result, Err(NarrationError::UnsupportedEnvironment(_))));
        assert_eq!(get_status(&state), AppStatus::Idle);
    }

    #[tokio::test]
    async fn empty_belief_is_rejected_before_preparing() {
        let state = local_state(Some(Arc::new(FakeNarrator::new(Duration::from_millis(1)))));
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(narrate_belief(&state, "   ", tx).await, Err(NarrationError::EmptyBelief)));
        assert!(state.session.lock().unwrap().is_none());
    }
}
