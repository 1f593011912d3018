pub mod audio;
pub mod cli;
pub mod commands;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod platform;
pub mod questions;
pub mod state;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use audio::controller::{ItemEvent, ItemOutcome};
use audio::{PlaybackEvent, SessionReport, SessionStatus};
use commands::{narration, settings};
use engine::SpeechRequest;
use questions::{generate_questions, CartesianQuestions};
use state::AppState;

pub async fn run() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting Cartesian Coach v{}", settings::get_app_version());

    if let cli::Command::InitConfig { force } = &args.cmd {
        let path = settings::init_config(*force)?;
        println!("Wrote default settings to {}", path.display());
        return Ok(());
    }

    let mut loaded = persistence::load_settings();
    let mode = args.apply(&mut loaded);
    loaded.validate()?;

    let narrator = platform::get_narrator();
    let device = audio::playback::shared(audio::CpalDevice::new());
    let state = AppState::from_settings(loaded, mode, device, narrator);

    match &args.cmd {
        cli::Command::Ask { belief } => {
            let (tx, rx) = mpsc::unbounded_channel();
            let started = narration::narrate_belief(&state, belief, tx).await?;
            let lines = labelled(&started.questions);
            let report = drive(started.run, rx, lines).await;
            narration::release_session(&state);
            finish(report)
        }
        cli::Command::Speak { lines } => {
            let requests = lines.iter().map(|l| SpeechRequest::new(l.as_str())).collect();
            narration::prepare_session(&state, requests).await?;
            let (tx, rx) = mpsc::unbounded_channel();
            let run = narration::play_session(&state, tx)?;
            let report = drive(run, rx, lines.clone()).await;
            narration::release_session(&state);
            finish(report)
        }
        cli::Command::Questions { belief } => {
            let questions = generate_questions(state.generator.as_ref(), belief).await?;
            for line in labelled(&questions) {
                println!("{line}");
            }
            Ok(())
        }
        cli::Command::ShowConfig => {
            let json = serde_json::to_string_pretty(&settings::get_settings(&state))
                .context("Failed to serialize settings")?;
            if let Some(path) = persistence::settings_path() {
                println!("# {}", path.display());
            }
            println!("{json}");
            Ok(())
        }
        cli::Command::InitConfig { .. } => Ok(()),
    }
}

fn labelled(questions: &CartesianQuestions) -> Vec<String> {
    CartesianQuestions::labels()
        .iter()
        .zip(questions.as_list())
        .map(|(label, text)| format!("{label}: {text}"))
        .collect()
}

/// Print progress while the session runs. Ctrl-C stops the session.
async fn drive(
    run: audio::PlaybackRun,
    mut events: mpsc::UnboundedReceiver<PlaybackEvent>,
    lines: Vec<String>,
) -> SessionReport {
    let stop = run.stop.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PlaybackEvent::ItemStarted { index } => {
                    if let Some(line) = lines.get(index) {
                        println!("{line}");
                    }
                }
                PlaybackEvent::ItemSkipped { index } => println!("(item {} skipped)", index + 1),
                PlaybackEvent::ItemEnded { .. } | PlaybackEvent::Complete { .. } => {}
            }
        }
    });

    let report = run.wait().await;
    interrupt.abort();
    if let Err(e) = printer.await {
        tracing::warn!("Progress printer failed: {}", e);
    }
    report
}

fn finish(report: SessionReport) -> anyhow::Result<()> {
    let played = report.outcomes.iter().filter(|o| matches!(o, ItemOutcome::Played(ItemEvent::Ended))).count();
    if report.status == SessionStatus::Stopped {
        println!("Stopped.");
    }
    for failure in report.failures() {
        tracing::warn!("{}", failure);
    }
    tracing::info!("{} of {} item(s) played to the end", played, report.outcomes.len());
    Ok(())
}
