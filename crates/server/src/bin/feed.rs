//! Replays a captured frame log against a running hub.
//!
//! The capture is JSONL. Most lines are text envelopes and are sent
//! verbatim (with the update key injected when one is configured). A line
//! of the shape `{"binary": "flags_zip", "path": "flags.zip"}` sends the
//! named file as a versioned binary frame instead.
//!
//! This is the development stand-in for OWLCMS: point it at a capture from
//! a real meet and the hub state rebuilds exactly as it did live.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use protocol::{BinaryFrame, BinaryKind, MINIMUM_PROTOCOL_VERSION};

#[derive(Parser, Debug)]
#[command(about = "Replay a recorded frame log into a competition hub")]
struct Args {
    /// Hub WebSocket endpoint.
    #[arg(long, default_value = "ws://127.0.0.1:8422/ws")]
    url: String,

    /// JSONL capture file.
    #[arg(long)]
    file: PathBuf,

    /// Pause between frames, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Update key to inject into every text payload.
    #[arg(long)]
    update_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let capture = std::fs::read_to_string(&args.file)
        .with_context(|| format!("cannot read {}", args.file.display()))?;

    let (ws, _) = connect_async(&args.url)
        .await
        .with_context(|| format!("cannot connect to {}", args.url))?;
    tracing::info!("connected to {}", args.url);
    let (mut sink, mut stream) = ws.split();

    let mut sent = 0usize;
    for (line_no, line) in capture.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut value: Value = serde_json::from_str(line)
            .with_context(|| format!("line {} is not JSON", line_no + 1))?;

        let message = if let Some(kind) = value.get("binary").and_then(Value::as_str) {
            let path = value
                .get("path")
                .and_then(Value::as_str)
                .context("binary directive needs a path")?;
            let base = args.file.parent().unwrap_or_else(|| std::path::Path::new("."));
            let bytes = std::fs::read(base.join(path))
                .with_context(|| format!("cannot read archive {path}"))?;
            let version = value
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or(MINIMUM_PROTOCOL_VERSION);
            Message::Binary(
                BinaryFrame::encode(version, &BinaryKind::from_wire(kind), &bytes).into(),
            )
        } else {
            if let Some(key) = &args.update_key {
                if let Some(payload) = value.get_mut("payload").and_then(Value::as_object_mut) {
                    payload.insert("updateKey".to_string(), Value::String(key.clone()));
                }
            }
            Message::Text(value.to_string().into())
        };

        sink.send(message).await.context("send failed")?;
        sent += 1;

        if let Some(Ok(Message::Text(reply))) = stream.next().await {
            tracing::info!(frame = sent, "hub replied: {reply}");
        }

        if args.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(args.delay_ms)).await;
        }
    }

    tracing::info!("replayed {sent} frames");
    sink.send(Message::Close(None)).await.ok();
    Ok(())
}
