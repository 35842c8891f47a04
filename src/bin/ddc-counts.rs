//! ddc-counts: print the current per-device counts as JSON.
//!
//! ```text
//! $ ddc-counts redis://127.0.0.1:6379
//! {"x1":2,"x2":1}
//! ```

use std::process::ExitCode;

use clap::Parser;

use ddc_ingest::lifecycle::startup;
use ddc_ingest::observability::logging;
use ddc_ingest::store;

#[derive(Parser)]
#[command(name = "ddc-counts")]
#[command(about = "Show measurement counts per device", long_about = None)]
struct Cli {
    /// Counter store URI (redis://, tcp://)
    #[arg(default_value = "redis://127.0.0.1:6379")]
    store: String,

    /// Pretty-print the JSON
    #[arg(short, long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return startup::usage(e),
    };

    logging::init_tracing(logging::DEFAULT_FILTER);

    let counters = match store::connect(&cli.store).await {
        Ok(counters) => counters,
        Err(e) => {
            tracing::error!(store = %cli.store, error = %e, "Counter store unavailable");
            return ExitCode::FAILURE;
        }
    };

    let counts = match store::device_counts(counters.as_ref()).await {
        Ok(counts) => counts,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read counts");
            return ExitCode::FAILURE;
        }
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&counts)
    } else {
        serde_json::to_string(&counts)
    };
    match rendered {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to render counts");
            ExitCode::FAILURE
        }
    }
}
