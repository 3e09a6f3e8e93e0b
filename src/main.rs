//! Sample guarded worker.
//!
//! Reads one JSON event per line from stdin, runs each through the `sample`
//! handler under its circuit breaker and prints one JSON outcome per line.
//! Breaker state lives in the configured state file, so concurrent and
//! consecutive runs share it.
//!
//! ```text
//! $ echo '{"value":"fail"}' | circuit-guard        # {"outcome":"tripped",...}
//! $ echo '{"value":"hello"}' | circuit-guard       # {"outcome":"open",...}
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use circuit_guard::config::{load_config, Settings};
use circuit_guard::lifecycle::Runtime;
use circuit_guard::observability::logging;
use circuit_guard::resilience::{Classifier, Clock, SystemClock};
use circuit_guard::sample::{handle_event, InputEvent, Outcome, SAMPLE_BREAKER_ID};

#[derive(Parser)]
#[command(name = "circuit-guard")]
#[command(about = "Sample worker guarded by a persisted circuit breaker", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => load_config(path)?,
        None => Settings::default(),
    };

    logging::init(&settings.observability);
    tracing::info!("circuit-guard v{} starting", env!("CARGO_PKG_VERSION"));

    let runtime = Runtime::start(&settings).await?;
    let handler = runtime.breaker().wrap(
        SAMPLE_BREAKER_ID,
        Classifier::any(),
        |event: InputEvent| handle_event(event, SystemClock.now_epoch_secs()),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let event: InputEvent = match serde_json::from_str(&line) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed event");
                        continue;
                    }
                };
                let outcome = Outcome::from_result(handler.call(event).await);
                println!("{}", serde_json::to_string(&outcome)?);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                break;
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
