//! JSON-lines host adapter: each input line is one [`Intent`], every view update is
//! printed as it is published.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use ccc_core::Intent;
use ccc_events::Bus;
use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::render::render;
use crate::GlobalArgs;

#[derive(Args, Clone, Debug)]
pub struct WatchArgs {
    /// Read intents from this file instead of stdin
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Print raw envelopes as JSON instead of one-line summaries
    #[arg(long)]
    pub json: bool,
}

pub async fn run(global: &GlobalArgs, args: &WatchArgs) -> Result<()> {
    let config = global.client_config()?;
    let settle = config.debounce() * 3;
    let bus = Bus::default();
    let mut rx = bus.subscribe();
    let coord = global.coordinator(config, bus).await?;

    let json_out = args.json;
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(env) if json_out => match serde_json::to_string(&env) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!(%err, "envelope not serializable"),
                },
                Ok(env) => println!("{}", render(&env)),
                Err(RecvError::Lagged(skipped)) => eprintln!("[ccc] skipped {skipped} updates"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match args.input.as_deref() {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let mut lines = reader.lines();
    let mut pending = Vec::new();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("reading intents")? {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<Intent>(trimmed) {
            Ok(intent) => pending.push(coord.dispatch(intent)),
            Err(err) => eprintln!("[ccc] line {line_no}: ignoring invalid intent: {err}"),
        }
    }

    for handle in pending {
        match handle.await {
            Ok(outcome) => debug!(?outcome, "intent finished"),
            Err(err) => warn!(%err, "intent task failed"),
        }
    }
    // Give a trailing slider burst time to be evaluated.
    tokio::time::sleep(settle).await;
    coord.shutdown().await;
    // Dropping the last handle closes the bus, which lets the printer drain and exit.
    drop(coord);
    if tokio::time::timeout(Duration::from_millis(500), printer)
        .await
        .is_err()
    {
        debug!("printer did not drain in time");
    }
    Ok(())
}
