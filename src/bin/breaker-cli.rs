use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use circuit_guard::config::{load_config, Settings};
use circuit_guard::lifecycle::Runtime;
use circuit_guard::observability::logging;
use circuit_guard::persistence::StatusRecord;
use circuit_guard::resilience::{Clock, SystemClock};

#[derive(Parser)]
#[command(name = "breaker-cli")]
#[command(about = "Inspect and operate persisted circuit breakers", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the status of one breaker
    Status { id: String },
    /// List all breaker records
    List,
    /// Force a breaker open for the configured expiration
    Open {
        id: String,
        #[arg(long)]
        cause: Option<String>,
    },
    /// Close a breaker by deleting its record
    Close { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => load_config(path)?,
        None => Settings::default(),
    };
    logging::init(&settings.observability);

    let runtime = Runtime::start(&settings).await?;
    let store = runtime.store();
    let now = SystemClock.now_epoch_secs();

    match cli.command {
        Commands::Status { id } => {
            let record = store.fetch_record(&id).await?;
            print_json(&describe(&id, record.as_ref(), now))?;
        }
        Commands::List => {
            let records = store.list_records().await?;
            let listed: Vec<Value> = records
                .iter()
                .map(|r| describe(&r.id, Some(r), now))
                .collect();
            print_json(&Value::Array(listed))?;
        }
        Commands::Open { id, cause } => {
            let secs = i64::try_from(settings.breaker.expiration_secs).unwrap_or(i64::MAX);
            let expiry = now.saturating_add(secs);
            let record = StatusRecord::open(id.as_str(), expiry, cause);
            store.update_record(&record).await?;
            print_json(&describe(&id, Some(&record), now))?;
        }
        Commands::Close { id } => {
            store.delete_record(&id).await?;
            print_json(&describe(&id, None, now))?;
        }
    }

    Ok(())
}

fn describe(id: &str, record: Option<&StatusRecord>, now: i64) -> Value {
    match record {
        Some(record) => json!({
            "id": id,
            "status": record.effective_status(now),
            "stored_status": record.status,
            "expiry": record.expiry,
            "expired": record.is_expired(now),
            "cause": record.cause,
        }),
        None => json!({ "id": id, "status": "CLOSED" }),
    }
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
