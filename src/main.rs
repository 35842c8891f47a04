//! qlistener: device measurement listener.
//!
//! # Architecture Overview
//!
//! ```text
//!   AMQP queue                                               counter store
//!   ──────────▶ ingestion driver ──▶ shared queue ──▶ message processor ──▶ INCR
//!                     ▲                                      ▲
//!                     │ cancel                               │ phase
//!               health monitor ◀──── ShutdownSignal ◀──── SIGINT/SIGTERM
//!               (heartbeat)          Running → Draining → Finalizing
//! ```
//!
//! Exit codes: 0 clean shutdown, 1 config file missing, 2 bad config,
//! 3 missing key, 4 credentials unreadable, 5 broker connect failed,
//! 6 store connect failed, 7 pipeline failed, 127 usage.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use ddc_ingest::broker::AmqpBroker;
use ddc_ingest::config::loader::{load_listener_config, read_credentials};
use ddc_ingest::config::BrokerEndpoint;
use ddc_ingest::lifecycle::signals;
use ddc_ingest::lifecycle::startup::{self, listener_exit_code, listener as codes};
use ddc_ingest::observability::{logging, metrics};
use ddc_ingest::{store, Pipeline, PipelineSettings, ShutdownSignal};

#[derive(Parser)]
#[command(name = "qlistener")]
#[command(about = "Count device measurements from an AMQP queue", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(default_value = "/etc/ddc/qlistener.conf")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return startup::usage(e),
    };

    logging::init_tracing(logging::DEFAULT_FILTER);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "qlistener starting");

    let config = match load_listener_config(&cli.config) {
        Ok(config) => config,
        Err(e) => return startup::fail(listener_exit_code(&e), &e),
    };
    let credentials = match read_credentials(&config.credentials_file) {
        Ok(credentials) => credentials,
        Err(e) => return startup::fail(listener_exit_code(&e), &e),
    };

    tracing::info!(
        broker = %config.broker_host,
        queue = %config.queue,
        store = %config.store_uri,
        queue_capacity = ?config.queue_capacity,
        heartbeat_threshold = config.heartbeat_failure_threshold,
        "Configuration loaded"
    );

    if let Some(addr) = config.metrics_address {
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(address = %addr, error = %e, "Failed to start metrics exporter");
        }
    }

    let endpoint = BrokerEndpoint::new(credentials, config.broker_host.clone());
    let broker = match AmqpBroker::connect(&endpoint).await {
        Ok(broker) => Arc::new(broker),
        Err(e) => return startup::fail(codes::BROKER_CONNECT, &e),
    };
    let counters = match store::connect(&config.store_uri).await {
        Ok(counters) => counters,
        Err(e) => return startup::fail(codes::STORE_CONNECT, &e),
    };

    let shutdown = ShutdownSignal::new();
    tokio::spawn(signals::listen(shutdown.clone()));

    let pipeline = Pipeline::new(broker, counters, PipelineSettings::from_config(&config));
    match pipeline.run(shutdown).await {
        Ok(report) => {
            tracing::info!(
                counted = report.counted(),
                rejected = report.driver.rejected,
                "Shutdown complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(exit_code = codes::PIPELINE_FAILED, error = %e, "Pipeline failed");
            ExitCode::from(codes::PIPELINE_FAILED)
        }
    }
}
