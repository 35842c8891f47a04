//! devadapter: publish one device's measurements from a file or stdin.
//!
//! Exit codes: 0 success, 1 config file missing, 2 credentials unreadable,
//! 3 bad config, 4 data file not found, 5 broker connect failed,
//! 6 input read failed mid-run, 127 usage.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ddc_ingest::broker::{AmqpBroker, Broker};
use ddc_ingest::config::loader::{load_publisher_config, read_credentials};
use ddc_ingest::config::BrokerEndpoint;
use ddc_ingest::lifecycle::startup::{self, publisher as codes, publisher_exit_code};
use ddc_ingest::observability::logging;
use ddc_ingest::publisher::{open_input, MeasurementPublisher};

#[derive(Parser)]
#[command(name = "devadapter")]
#[command(about = "Publish device measurements to an AMQP exchange", long_about = None)]
struct Cli {
    /// Device identifier stamped on every measurement
    device_id: String,

    /// Measurement scale, e.g. C
    scale: String,

    /// Data file with one value per line, or `-` for stdin
    data: PathBuf,

    /// Configuration file
    #[arg(default_value = "/etc/ddc/devadapter.conf")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return startup::usage(e),
    };

    logging::init_tracing(logging::DEFAULT_FILTER);

    let config = match load_publisher_config(&cli.config) {
        Ok(config) => config,
        Err(e) => return startup::fail(publisher_exit_code(&e), &e),
    };
    let credentials = match read_credentials(&config.credentials_file) {
        Ok(credentials) => credentials,
        Err(e) => return startup::fail(publisher_exit_code(&e), &e),
    };
    let input = match open_input(&cli.data).await {
        Ok(input) => input,
        Err(e) => return startup::fail(codes::DATA_FILE, &e),
    };

    let endpoint = BrokerEndpoint::new(credentials, config.broker_host.clone());
    let broker = match AmqpBroker::connect(&endpoint).await {
        Ok(broker) => broker,
        Err(e) => return startup::fail(codes::BROKER_CONNECT, &e),
    };

    let publisher = MeasurementPublisher::new(
        &broker,
        config.exchange.clone(),
        config.routing_key.clone(),
        cli.device_id.clone(),
        cli.scale.clone(),
    );
    let result = publisher.publish_lines(input).await;

    if let Err(e) = broker.close().await {
        tracing::warn!(error = %e, "Broker close failed");
    }

    match result {
        Ok(report) => {
            tracing::info!(
                sent = report.sent,
                failed = report.failed,
                rejected = report.rejected,
                "Publishing finished"
            );
            println!("Sent line count: {}", report.sent);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(exit_code = codes::INPUT_READ, error = %e, "Publishing aborted");
            ExitCode::from(codes::INPUT_READ)
        }
    }
}
