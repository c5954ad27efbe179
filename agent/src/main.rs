use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tactician_agent::config::{
    DEFAULT_ADVISORY_TIMEOUT_MS, DEFAULT_ADVISORY_URL, DEFAULT_DECISION_DEADLINE_MS,
};
use tactician_agent::{AgentConfig, ChannelTransport, FallbackEngine, Strategy};
use tactician_protocol::{GuardMode, ServerFrame, parse_server_frame};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Reads server frames on stdin (each starting with `>ROOMID` or separated
/// by blank lines) and writes outbound wire strings to stdout.
#[derive(Parser)]
#[command(name = "tactician", about = "Pokemon Showdown battle agent")]
struct Cli {
    #[arg(long, env = "TACTICIAN_USERNAME")]
    username: String,

    #[arg(long, env = "TACTICIAN_STRATEGY", default_value = "local_search")]
    strategy: Strategy,

    /// Race the advisory service against the local strategy
    #[arg(long, env = "TACTICIAN_ADVISORY")]
    advisory: bool,

    #[arg(long, env = "TACTICIAN_ADVISORY_URL", default_value = DEFAULT_ADVISORY_URL)]
    advisory_url: String,

    #[arg(long, env = "TACTICIAN_ADVISORY_TIMEOUT_MS", default_value_t = DEFAULT_ADVISORY_TIMEOUT_MS)]
    advisory_timeout_ms: u64,

    #[arg(long, env = "TACTICIAN_DEADLINE_MS", default_value_t = DEFAULT_DECISION_DEADLINE_MS)]
    deadline_ms: u64,

    #[arg(long, env = "TACTICIAN_MAX_MATCHES", default_value_t = 1)]
    max_matches: usize,

    #[arg(long, env = "TACTICIAN_GUARD", default_value = "strict")]
    guard: GuardMode,

    #[arg(long, env = "TACTICIAN_AUDIT_DIR", default_value = "logs")]
    audit_dir: PathBuf,
}

impl Cli {
    fn into_config(self) -> AgentConfig {
        AgentConfig {
            username: self.username,
            strategy: self.strategy,
            advisory_enabled: self.advisory,
            advisory_url: self.advisory_url,
            advisory_timeout_ms: self.advisory_timeout_ms,
            decision_deadline_ms: self.deadline_ms,
            max_concurrent_matches: self.max_matches,
            guard_mode: self.guard,
            audit_dir: self.audit_dir,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tactician_agent=debug")),
        )
        .init();

    let config = Cli::parse().into_config();

    let (transport, mut outgoing) = ChannelTransport::channel();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = outgoing.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let (frames, inbound) = mpsc::channel(256);
    let reader = tokio::spawn(read_frames(frames));

    let result = tactician_agent::run(config, Arc::new(FallbackEngine), Arc::new(transport), inbound).await;
    reader.abort();

    if let Err(e) = &result {
        tracing::error!(error = %e, "Agent stopped");
    }
    result?;

    writer.await??;
    Ok(())
}

/// Split stdin into frames and forward them
async fn read_frames(frames: mpsc::Sender<ServerFrame>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut buffer = String::new();

    while let Some(line) = lines.next_line().await? {
        let starts_frame = line.starts_with('>');
        if (starts_frame || line.trim().is_empty()) && !buffer.is_empty() {
            flush(&mut buffer, &frames).await?;
        }
        if !line.trim().is_empty() {
            buffer.push_str(&line);
            buffer.push('\n');
        }
    }
    if !buffer.is_empty() {
        flush(&mut buffer, &frames).await?;
    }
    Ok(())
}

async fn flush(buffer: &mut String, frames: &mpsc::Sender<ServerFrame>) -> Result<()> {
    match parse_server_frame(buffer) {
        Ok(frame) => frames
            .send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("Agent stopped reading frames"))?,
        Err(e) => tracing::debug!(error = %e, "Skipping unreadable frame"),
    }
    buffer.clear();
    Ok(())
}
