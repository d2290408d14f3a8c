//! Replay of recordings on disk, in both supported formats.

use std::io::Write;

use ds_cli::cli::replay::{replay_file, RecordingFormat};
use ds_domain::config::EngineConfig;
use ds_engine::StreamOutcome;

const FRAMES: [&str; 8] = [
    r#"{"sub_question":"What is "}"#,
    r#"{"sub_question":"X?","level":1,"level_question_num":1}"#,
    r#"{"sub_query":"define X","level":1,"level_question_num":1,"query_id":0}"#,
    r#"{"top_documents":[{"document_id":"d1","semantic_identifier":"Letters","link":"https://example.org/x"}],"level":1,"level_question_num":1}"#,
    r#"{"answer_piece":"X is ...","answer_type":"agent_sub_answer","level":1,"level_question_num":1}"#,
    r#"{"stop_reason":"FINISHED","stream_type":"sub_answer","level":1,"level_question_num":1}"#,
    r#"{"answer_piece":"X is the 24th letter."}"#,
    r#"{"type":"complete"}"#,
];

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn replays_raw_sse_recording() {
    let raw: String = FRAMES
        .iter()
        .map(|f| format!("event: message\ndata: {f}\n\n"))
        .collect();
    let file = write_temp(&raw);

    let report = replay_file(file.path(), &EngineConfig::default(), 3)
        .await
        .unwrap();
    assert_eq!(report.format, RecordingFormat::Raw);
    assert!(matches!(report.outcome, StreamOutcome::Completed(_)));

    let message = report.outcome.message();
    assert_eq!(message.content, "X is the 24th letter.");
    assert_eq!(message.sub_questions.len(), 1);
    assert_eq!(message.sub_questions[0].question_text, "What is X?");
    assert_eq!(message.documents.len(), 1);
    assert_eq!(message.citations[0].document_name, "Letters");

    assert_eq!(report.packet_counts.get("sub_question"), Some(&2));
    assert_eq!(report.packet_counts.get("complete"), Some(&1));
}

#[tokio::test]
async fn replays_json_stream_log() {
    let packets: Vec<serde_json::Value> = FRAMES
        .iter()
        .enumerate()
        .map(|(i, f)| {
            serde_json::json!({
                "sequence": i + 1,
                "type": "sse",
                "raw_data": format!("data: {f}\n\n"),
                "data_size": f.len(),
            })
        })
        .collect();
    let log = serde_json::json!({
        "request_id": "test",
        "timestamp": "20240101_000000",
        "packets": packets,
    });
    let file = write_temp(&serde_json::to_string_pretty(&log).unwrap());

    let report = replay_file(file.path(), &EngineConfig::default(), 4096)
        .await
        .unwrap();
    assert_eq!(report.format, RecordingFormat::StreamLog);
    assert_eq!(report.outcome.label(), "completed");
    assert_eq!(report.outcome.message().sub_questions.len(), 1);
}

#[tokio::test]
async fn truncated_recording_ends_without_completion() {
    let raw: String = FRAMES[..7].iter().map(|f| format!("{f}\n")).collect();
    let file = write_temp(&raw);

    let report = replay_file(file.path(), &EngineConfig::default(), 16)
        .await
        .unwrap();
    assert!(matches!(report.outcome, StreamOutcome::Ended(_)));
    assert!(!report.outcome.message().is_streaming);
    assert_eq!(report.outcome.message().content, "X is the 24th letter.");
}

#[tokio::test]
async fn missing_recording_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = replay_file(&dir.path().join("absent.log"), &EngineConfig::default(), 64).await;
    assert!(result.is_err());
}

#[test]
fn config_file_overrides_defaults() {
    let file = write_temp("[engine]\nmin_phase_dwell_ms = 250\n\n[backend]\nbase_url = \"https://search.example.org\"\n");
    let config = ds_cli::cli::load_config_from(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.engine.min_phase_dwell_ms, 250);
    assert_eq!(config.engine.snapshot_interval_ms, 150);
    assert_eq!(
        config.backend.send_message_url(),
        "https://search.example.org/chat/send-message"
    );
}
