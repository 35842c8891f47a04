//! Device measurement publisher.
//!
//! # Data Flow
//! ```text
//! data file or stdin, one value per line
//!     → Measurement { devID, val, scale, date = now (UTC) }
//!     → JSON → broker.publish(exchange, routing_key)
//! ```
//!
//! Input ends at EOF, at an empty line, or at a line holding only `-`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::broker::Broker;
use crate::ingest::message::{Measurement, MEASURE_VERSION};
use crate::observability::metrics;

/// Line that ends input early.
pub const END_OF_INPUT: &str = "-";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Data file '{}' could not be opened", path.display())]
    DataFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read input: {0}")]
    Read(#[from] std::io::Error),
}

/// Totals for one publishing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Lines published.
    pub sent: u64,
    /// Lines the broker refused.
    pub failed: u64,
    /// Lines that were not UTF-8 or not a number.
    pub rejected: u64,
}

/// Boxed line reader over a file or stdin.
pub type Input = Box<dyn AsyncBufRead + Unpin + Send>;

/// Open `path` for reading, `-` meaning stdin.
pub async fn open_input(path: &Path) -> Result<Input, PublishError> {
    if path == Path::new(END_OF_INPUT) {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| PublishError::DataFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Box::new(BufReader::new(file)))
}

/// Current UTC time as `YYYY-MM-DD HH:MM:SS.mmm`.
pub fn timestamp_now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Publishes one measurement per input line for a single device.
pub struct MeasurementPublisher<'a> {
    broker: &'a dyn Broker,
    exchange: String,
    routing_key: String,
    device_id: String,
    scale: String,
}

impl<'a> MeasurementPublisher<'a> {
    pub fn new(
        broker: &'a dyn Broker,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        device_id: impl Into<String>,
        scale: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            device_id: device_id.into(),
            scale: scale.into(),
        }
    }

    /// Build the measurement for one value.
    pub fn measurement(&self, value: f64) -> Measurement {
        Measurement {
            version: MEASURE_VERSION.to_string(),
            device_id: self.device_id.clone(),
            value,
            scale: self.scale.clone(),
            timestamp: timestamp_now(),
        }
    }

    /// Publish every line of `input` until it ends.
    ///
    /// Lines are read as raw bytes. A line that is not UTF-8 or not a number
    /// is rejected, and one that fails to publish is logged; neither ends
    /// the run and neither is resent.
    pub async fn publish_lines<R>(&self, input: R) -> Result<PublishReport, PublishError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut report = PublishReport::default();
        let mut lines = input.split(b'\n');

        while let Some(raw) = lines.next_segment().await? {
            let line = match std::str::from_utf8(&raw) {
                Ok(line) => line.trim(),
                Err(e) => {
                    report.rejected += 1;
                    tracing::warn!(bytes = raw.len(), error = %e, "Skipping line that is not UTF-8");
                    continue;
                }
            };
            if line.is_empty() || line == END_OF_INPUT {
                break;
            }

            let value = match line.parse::<f64>() {
                Ok(value) if value.is_finite() => value,
                _ => {
                    report.rejected += 1;
                    tracing::warn!(line = %line, "Skipping line that is not a number");
                    continue;
                }
            };

            let payload = match self.measurement(value).encode() {
                Ok(payload) => payload,
                Err(e) => {
                    report.rejected += 1;
                    tracing::warn!(error = %e, "Failed to encode measurement");
                    continue;
                }
            };

            match self
                .broker
                .publish(&self.exchange, &self.routing_key, &payload)
                .await
            {
                Ok(()) => {
                    report.sent += 1;
                    metrics::record_published(true);
                    tracing::debug!(device = %self.device_id, value, "Measurement published");
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::record_published(false);
                    tracing::error!(device = %self.device_id, value, error = %e, "Publish failed");
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use futures_util::StreamExt;

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp_now();
        assert!(
            chrono::NaiveDateTime::parse_from_str(&ts, "%Y-%m-%d %H:%M:%S%.3f").is_ok(),
            "unexpected timestamp {}",
            ts
        );
        assert_eq!(ts.len(), "2024-01-01 12:00:00.000".len());
    }

    #[tokio::test]
    async fn test_publish_stops_at_dash() {
        let broker = MemoryBroker::new();
        let publisher = MeasurementPublisher::new(&broker, "ddc", "measurements", "x1", "C");

        let input: &[u8] = b"10\n12.5\n-\n99\n";
        let report = publisher.publish_lines(input).await.unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(broker.pending("measurements"), 2);

        let mut sub = broker.subscribe("measurements").await.unwrap();
        let first = sub.deliveries.next().await.unwrap().unwrap();
        let m = Measurement::decode(&first.body).unwrap();
        assert_eq!(m.version, MEASURE_VERSION);
        assert_eq!(m.device_id, "x1");
        assert_eq!(m.value, 10.0);
        assert_eq!(m.scale, "C");
    }

    #[tokio::test]
    async fn test_publish_stops_at_empty_line_and_skips_garbage() {
        let broker = MemoryBroker::new();
        let publisher = MeasurementPublisher::new(&broker, "", "q", "x2", "");

        let input: &[u8] = b"5\nabc\n6\n\n7\n";
        let report = publisher.publish_lines(input).await.unwrap();

        assert_eq!(report.sent, 2);
        assert_eq!(report.rejected, 1);
    }

    #[tokio::test]
    async fn test_non_utf8_line_is_rejected_and_run_continues() {
        let broker = MemoryBroker::new();
        let publisher = MeasurementPublisher::new(&broker, "", "q", "x1", "");

        let input: &[u8] = b"1\n\xff\xfe\n2\r\n3\n";
        let report = publisher.publish_lines(input).await.unwrap();

        assert_eq!(report.sent, 3);
        assert_eq!(report.rejected, 1);
        assert_eq!(broker.pending("q"), 3);
    }

    #[tokio::test]
    async fn test_publish_failures_are_counted_not_fatal() {
        let broker = MemoryBroker::new();
        broker.reject_publishes(true);
        let publisher = MeasurementPublisher::new(&broker, "", "q", "x1", "");

        let input: &[u8] = b"1\n2\n";
        let report = publisher.publish_lines(input).await.unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(report.sent, 0);
    }

    #[tokio::test]
    async fn test_missing_data_file() {
        let err = open_input(Path::new("/nonexistent/ddc-data.txt")).await.err().unwrap();
        assert!(matches!(err, PublishError::DataFile { .. }));
    }
}
