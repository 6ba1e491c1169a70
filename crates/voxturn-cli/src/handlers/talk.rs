//! Talk command handler: one turn against a running server.
//!
//! Uploads a recording (or typed text), prints the transcript and reply
//! chunks as they stream in, and plays each chunk's audio through the
//! playback scheduler. Ctrl-C pauses: playback stops at once and the server
//! is asked to cancel the run.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};
use voxturn_core::{ChunkRecord, RecordedAudio, SessionKey};
use voxturn_voice::{
    AudioSink, PlaybackEvent, PlaybackHandle, PlaybackOptions, PlaybackScheduler, TurnClient,
    TurnCoordinator, TurnEnd,
};

use crate::commands::TalkArgs;

pub async fn execute(args: TalkArgs) -> Result<()> {
    let http = reqwest::Client::new();

    #[cfg(feature = "speaker")]
    let sink = voxturn_voice::SpeakerSink::new(http.clone());
    #[cfg(not(feature = "speaker"))]
    let sink = voxturn_voice::LogSink::default();

    run(args, http, sink).await
}

async fn run<S: AudioSink>(args: TalkArgs, http: reqwest::Client, sink: S) -> Result<()> {
    let client = TurnClient::new(http, &args.server, SessionKey::new(&args.session));
    let (playback, events) = PlaybackScheduler::spawn(
        sink,
        PlaybackOptions {
            require_unlock: args.manual_start,
            ..PlaybackOptions::default()
        },
    );
    let watcher = tokio::spawn(watch_playback(events, playback.clone()));
    let coordinator = Arc::new(TurnCoordinator::new(
        playback.clone(),
        Arc::new(client.clone()),
    ));

    if args.intro {
        let intro = client.introduction().await.context("Failed to fetch introduction")?;
        println!("Assistant: {}", intro.text);
        if let Some(audio) = intro.value {
            playback.enqueue(audio).await;
            playback.wait_idle().await;
        }
    }

    let pause = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\n[paused]");
                if let Ok(Some(outcome)) = coordinator.pause().await.await {
                    debug!(status = ?outcome.status, "Server acknowledged pause");
                }
            }
        }
    });

    let end = if let Some(text) = &args.text {
        let records = client.submit_text(text).await?;
        coordinator.run_turn(records, print_record).await
    } else if let Some(path) = &args.recording {
        let audio = read_recording(path).await?;
        let records = client.upload(audio).await?;
        coordinator.run_turn(records, print_record).await
    } else {
        anyhow::bail!("Nothing to say: pass a recording or --text");
    };

    pause.abort();
    watcher.abort();
    println!();
    match end {
        TurnEnd::Completed => Ok(()),
        TurnEnd::Paused => {
            println!("Paused.");
            Ok(())
        }
        TurnEnd::Cancelled => {
            println!("The server cancelled the turn.");
            Ok(())
        }
        TurnEnd::Failed(message) => anyhow::bail!("Turn failed: {message}"),
    }
}

fn print_record(record: &ChunkRecord) {
    match record {
        ChunkRecord::Transcription { value } => println!("You: {value}"),
        ChunkRecord::Audio { index, text, .. } => {
            if *index == Some(0) {
                print!("Assistant: ");
            }
            print!("{text}");
        }
        ChunkRecord::Cancelled | ChunkRecord::Error { .. } => {}
    }
}

/// Surface playback problems and handle the manual-start gate.
async fn watch_playback(mut events: UnboundedReceiver<PlaybackEvent>, playback: PlaybackHandle) {
    while let Some(event) = events.recv().await {
        match event {
            PlaybackEvent::Failed { audio, error } => {
                warn!(audio = %audio, error = %error, "Skipped a chunk that could not be played");
            }
            PlaybackEvent::UnlockRequired => {
                println!("[press Enter to start playback]");
                let pressed = tokio::task::spawn_blocking(|| {
                    let mut line = String::new();
                    std::io::stdin().read_line(&mut line).is_ok()
                })
                .await
                .unwrap_or(false);
                if pressed {
                    playback.unlock().await;
                }
            }
            other => debug!(event = ?other, "Playback"),
        }
    }
}

/// Load a recording from disk.
pub async fn read_recording(path: &Path) -> Result<RecordedAudio> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map_or_else(|| "audio.wav".to_string(), |n| n.to_string_lossy().into_owned());
    Ok(RecordedAudio {
        bytes: Bytes::from(bytes),
        content_type: content_type_for(path).to_string(),
        file_name,
    })
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}
