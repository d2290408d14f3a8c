//! `deepsearch replay`: run a recorded stream through the engine.
//!
//! Two recording formats are accepted:
//! - raw stream text, exactly as the backend wrote it
//! - a JSON stream log, `{"packets": [{"raw_data": "..."}, ...]}`, where
//!   every `raw_data` is one frame

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use ds_domain::config::{Config, EngineConfig};
use ds_domain::error::Result;
use ds_domain::stream::BoxStream;
use ds_engine::{drive_stream, StreamOutcome, StreamingEngine};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::render::{render_counts, render_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingFormat {
    Raw,
    StreamLog,
}

#[derive(Deserialize)]
struct StreamLog {
    packets: Vec<LoggedPacket>,
}

#[derive(Deserialize)]
struct LoggedPacket {
    #[serde(default)]
    raw_data: String,
}

/// Detect the recording format and return the byte stream to replay.
pub fn recording_bytes(raw: &str) -> (RecordingFormat, Vec<u8>) {
    if raw.trim_start().starts_with('{') {
        if let Ok(log) = serde_json::from_str::<StreamLog>(raw) {
            let mut bytes = Vec::new();
            for packet in log.packets {
                bytes.extend_from_slice(packet.raw_data.as_bytes());
                if !packet.raw_data.ends_with('\n') {
                    bytes.push(b'\n');
                }
            }
            return (RecordingFormat::StreamLog, bytes);
        }
    }
    (RecordingFormat::Raw, raw.as_bytes().to_vec())
}

pub struct ReplayReport {
    pub format: RecordingFormat,
    pub outcome: StreamOutcome,
    pub packet_counts: BTreeMap<String, u64>,
}

/// Replay the recording at `path` in `chunk_size`-byte chunks.
pub async fn replay_file(
    path: &Path,
    config: &EngineConfig,
    chunk_size: usize,
) -> anyhow::Result<ReplayReport> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let (format, bytes) = recording_bytes(&raw);
    tracing::debug!(?format, bytes = bytes.len(), chunk_size, "replaying recording");

    let chunks: Vec<Result<Vec<u8>>> = bytes
        .chunks(chunk_size.max(1))
        .map(|c| Ok(c.to_vec()))
        .collect();
    let body: BoxStream<'static, Result<Vec<u8>>> = Box::pin(futures_util::stream::iter(chunks));

    let mut engine = StreamingEngine::new(config.clone());
    let mut packet_counts = BTreeMap::new();
    let outcome = drive_stream(&mut engine, body, CancellationToken::new(), |snapshot| {
        packet_counts = snapshot.packet_counts.clone();
    })
    .await;

    Ok(ReplayReport {
        format,
        outcome,
        packet_counts,
    })
}

/// Entry point for `deepsearch replay`.
pub async fn run(config: &Config, path: &Path, json: bool, chunk_size: usize) -> anyhow::Result<()> {
    let report = replay_file(path, &config.engine, chunk_size).await?;

    if json {
        let rendered = serde_json::to_string_pretty(report.outcome.message())
            .map_err(|e| anyhow::anyhow!("serializing message: {e}"))?;
        println!("{rendered}");
    } else {
        print!("{}", render_message(report.outcome.message()));
        println!(
            "\nOutcome: {} | Packets: {}",
            report.outcome.label(),
            render_counts(&report.packet_counts)
        );
    }
    Ok(())
}
