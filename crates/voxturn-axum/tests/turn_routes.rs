//! Integration tests for the turn HTTP endpoints.
//!
//! Every test drives the real router in-process with `oneshot`; the agent,
//! transcriber and TTS engine are hand-written doubles.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{
    EchoTts, FixedTranscriber, GatedTranscriber, Reply, ScriptedAgent, app, audio_path, body_bytes, get, json,
    ports, post_empty, post_json, post_multipart, records, send,
};
use serde_json::json;
use voxturn_axum::{AxumContext, CorsConfig, ServerPorts, create_spa_router};
use voxturn_core::{AgentEvent, RunId};

fn weather_reply() -> Reply {
    Reply::Events(vec![
        AgentEvent::RunCreated(RunId::new("run_1")),
        AgentEvent::TextDelta("Hello there.\n\nHow".into()),
        AgentEvent::TextDelta(" are you?".into()),
        AgentEvent::Completed,
    ])
}

#[tokio::test]
async fn health_returns_ok() {
    let app = app(ports(ScriptedAgent::new(weather_reply())));
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), b"OK");
}

#[tokio::test]
async fn text_turn_streams_ordered_ndjson_records() {
    let app = app(ports(ScriptedAgent::new(weather_reply())));

    let response = send(&app, post_json("/turns", &json!({ "text": "hi" }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/x-ndjson");
    assert!(response.headers().contains_key("x-turn-id"));

    let lines = records(response).await;
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], json!({ "type": "transcription", "value": "hi" }));
    assert_eq!(lines[1]["type"], "audio");
    assert_eq!(lines[1]["index"], 0);
    assert_eq!(lines[1]["text"], "Hello there.\n\n");
    assert_eq!(lines[2]["index"], 1);
    assert_eq!(lines[2]["text"], "How are you?");

    // The reference resolves to the synthesized bytes.
    let url = lines[1]["value"].as_str().unwrap();
    let audio = send(&app, get(audio_path(url))).await;
    assert_eq!(audio.status(), StatusCode::OK);
    assert_eq!(audio.headers()["content-type"], "audio/mpeg");
    assert_eq!(body_bytes(audio).await.as_ref(), b"Hello there.");
}

#[tokio::test]
async fn busy_session_rejects_second_turn_with_conflict() {
    let agent = ScriptedAgent::new(Reply::Hang);
    let app = app(ports(Arc::clone(&agent)));

    // Keep the first body alive: dropping it would cancel the turn.
    let first = send(&app, post_json("/turns", &json!({ "text": "one" }))).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = send(&app, post_json("/turns", &json!({ "text": "two" }))).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = json(second).await;
    assert_eq!(body["status"], 409);
    assert!(body["error"].as_str().unwrap().contains("already in progress"));

    let upload = send(&app, post_multipart("/upload", "audio", b"RIFF")).await;
    assert_eq!(upload.status(), StatusCode::CONFLICT);

    // Another session is unaffected.
    let other = send(&app, post_json("/turns?session=kitchen", &json!({ "text": "two" }))).await;
    assert_eq!(other.status(), StatusCode::OK);

    let cancel = json(send(&app, post_empty("/cancel-run")).await).await;
    assert_eq!(cancel["status"], "cancelled");
    assert_eq!(agent.cancelled_runs(), vec![RunId::new("run_hang")]);

    // The first turn ends with exactly one cancellation record.
    let lines = records(first).await;
    assert_eq!(lines.last().unwrap(), &json!({ "type": "cancelled" }));
    drop(other);
}

#[tokio::test]
async fn cancel_without_turn_reports_no_active_turn() {
    let app = app(ports(ScriptedAgent::new(weather_reply())));

    let outcome = json(send(&app, post_empty("/cancel-run")).await).await;
    assert_eq!(outcome["status"], "no_active_turn");

    // Legacy clients post a body; it is ignored.
    let legacy = send(
        &app,
        post_json("/cancel-run?session=other", &json!({ "threadId": "thread_x", "runId": "run_x" })),
    )
    .await;
    assert_eq!(legacy.status(), StatusCode::OK);
    assert_eq!(json(legacy).await["status"], "no_active_turn");
}

#[tokio::test]
async fn cancel_after_completion_is_already_finished() {
    let agent = ScriptedAgent::new(weather_reply());
    let app = app(ports(Arc::clone(&agent)));

    let turn = send(&app, post_json("/turns", &json!({ "text": "hi" }))).await;
    records(turn).await;

    let outcome = json(send(&app, post_empty("/cancel-run")).await).await;
    assert_eq!(outcome["status"], "already_finished");
    assert!(agent.cancelled_runs().is_empty());
}

#[tokio::test]
async fn turn_status_reports_current_turn() {
    let app = app(ports(ScriptedAgent::new(weather_reply())));

    let missing = send(&app, get("/turn")).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    records(send(&app, post_json("/turns", &json!({ "text": "hi" }))).await).await;

    let snapshot = json(send(&app, get("/turn")).await).await;
    assert_eq!(snapshot["phase"], "completed");
    assert_eq!(snapshot["chunksEmitted"], 2);
    assert_eq!(snapshot["session"], "default");
    assert!(snapshot["turnId"].is_string());
    assert!(snapshot["startedAt"].is_string());
}

#[tokio::test]
async fn upload_transcribes_then_streams_the_turn() {
    let app = app(ports(ScriptedAgent::new(weather_reply())));

    let response = send(&app, post_multipart("/upload?session=car", "audio", b"RIFF....WAVE")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let lines = records(response).await;
    assert_eq!(lines[0], json!({ "type": "transcription", "value": "what's the weather" }));
    assert_eq!(lines.len(), 3);
}

#[tokio::test]
async fn upload_without_audio_is_a_bad_request() {
    let app = app(ports(ScriptedAgent::new(weather_reply())));

    let wrong_field = send(&app, post_multipart("/upload", "file", b"RIFF")).await;
    assert_eq!(wrong_field.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(wrong_field).await["error"], "No audio file provided");

    let empty = send(&app, post_multipart("/upload", "audio", b"")).await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_text_is_a_bad_request() {
    let app = app(ports(ScriptedAgent::new(weather_reply())));
    let response = send(&app, post_json("/turns", &json!({ "text": "   " }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreachable_agent_is_a_bad_gateway() {
    let app = app(ports(ScriptedAgent::new(Reply::Unreachable)));

    let response = send(&app, post_json("/turns", &json!({ "text": "hi" }))).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json(response).await["status"], 502);

    // The failed turn is still reported, and no longer active.
    let snapshot = json(send(&app, get("/turn")).await).await;
    assert_eq!(snapshot["phase"], "failed");
}

#[tokio::test]
async fn unknown_audio_is_not_found() {
    let app = app(ports(ScriptedAgent::new(weather_reply())));

    let garbage = send(&app, get("/audio/not-a-uuid")).await;
    assert_eq!(garbage.status(), StatusCode::NOT_FOUND);

    let unknown = send(&app, get("/audio/6f1c1d0e-8c1b-4a53-9a59-0d0e4a1c2b3d")).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(unknown).await["status"], 404);
}

#[tokio::test]
async fn scripted_speech_returns_text_and_reference() {
    let app = app(ports(ScriptedAgent::new(weather_reply())));

    let intro = json(send(&app, post_empty("/introduction")).await).await;
    assert!(intro["text"].as_str().unwrap().starts_with("Hi!"));
    let url = intro["value"].as_str().unwrap();
    let audio = send(&app, get(audio_path(url))).await;
    assert_eq!(audio.status(), StatusCode::OK);

    let tour = json(send(&app, post_empty("/tour")).await).await;
    assert!(tour["value"].is_string());
}

#[tokio::test]
async fn scripted_speech_survives_synthesis_failure() {
    let app = app(ServerPorts {
        agent: ScriptedAgent::new(weather_reply()),
        transcriber: Arc::new(FixedTranscriber("unused")),
        tts: Arc::new(EchoTts { failing: true }),
    });

    let response = send(&app, post_empty("/tour")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let tour = json(response).await;
    assert!(tour["text"].is_string());
    assert!(tour["value"].is_null());
}

#[tokio::test]
async fn failed_chunk_synthesis_yields_null_audio() {
    let app = app(ServerPorts {
        agent: ScriptedAgent::new(weather_reply()),
        transcriber: Arc::new(FixedTranscriber("unused")),
        tts: Arc::new(EchoTts { failing: true }),
    });

    let lines = records(send(&app, post_json("/turns", &json!({ "text": "hi" }))).await).await;
    assert_eq!(lines.len(), 3);
    assert!(lines[1]["value"].is_null());
    assert_eq!(lines[2]["text"], "How are you?");
}

#[tokio::test]
async fn static_dir_serves_front_end_without_shadowing_api() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>voxturn</html>").unwrap();
    std::fs::write(dir.path().join("app.js"), "console.log('hi')").unwrap();

    let ctx = AxumContext::new(&common::test_config(), ports(ScriptedAgent::new(weather_reply())));
    let app = create_spa_router(ctx, dir.path(), &CorsConfig::AllowAll);

    let script = send(&app, get("/app.js")).await;
    assert_eq!(script.status(), StatusCode::OK);
    assert_eq!(body_bytes(script).await.as_ref(), b"console.log('hi')");

    let index = send(&app, get("/some/client/route")).await;
    assert_eq!(body_bytes(index).await.as_ref(), b"<html>voxturn</html>");

    let health = send(&app, get("/health")).await;
    assert_eq!(body_bytes(health).await.as_ref(), b"OK");
}

#[tokio::test]
async fn cancel_during_transcription_cancels_the_upload() {
    let agent = ScriptedAgent::new(weather_reply());
    let transcriber = GatedTranscriber::new("never mind");
    let app = app(ServerPorts {
        agent: agent.clone(),
        transcriber: transcriber.clone(),
        tts: Arc::new(EchoTts::default()),
    });

    let upload = tokio::spawn({
        let app = app.clone();
        async move { send(&app, post_multipart("/upload", "audio", b"RIFF")).await }
    });
    transcriber.entered.notified().await;

    // The session is already busy while the recording is transcribed.
    let busy = send(&app, post_json("/turns", &json!({ "text": "hi" }))).await;
    assert_eq!(busy.status(), StatusCode::CONFLICT);

    let cancel = json(send(&app, post_empty("/cancel-run")).await).await;
    assert_eq!(cancel["status"], "cancelled");

    transcriber.release.notify_one();
    let response = upload.await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        records(response).await,
        vec![
            json!({ "type": "transcription", "value": "never mind" }),
            json!({ "type": "cancelled" }),
        ]
    );

    let snapshot = json(send(&app, get("/turn")).await).await;
    assert_eq!(snapshot["phase"], "cancelled");
    assert!(agent.cancelled_runs().is_empty());
}
