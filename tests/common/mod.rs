//! Shared utilities for pipeline integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ddc_ingest::broker::MemoryBroker;
use ddc_ingest::health::HeartbeatConfig;
use ddc_ingest::ingest::{PipelineSettings, ProcessorSettings};
use ddc_ingest::store::MemoryCounterStore;
use tempfile::TempDir;

pub const QUEUE: &str = "measurements";

/// Pipeline settings with millisecond timings.
pub fn fast_settings() -> PipelineSettings {
    let mut settings = PipelineSettings::new(QUEUE);
    settings.heartbeat = HeartbeatConfig {
        tick: Duration::from_millis(2),
        ticks_per_probe: 5,
        failure_threshold: 3,
        probe_timeout: Duration::from_millis(200),
        cancel_ack_timeout: Duration::from_millis(200),
    };
    settings.processor = ProcessorSettings {
        idle_backoff: Duration::from_millis(2),
        settle_interval: Duration::from_millis(2),
    };
    settings
}

/// Fresh in-memory broker and counter store.
pub fn memory_backends() -> (Arc<MemoryBroker>, MemoryCounterStore) {
    (Arc::new(MemoryBroker::new()), MemoryCounterStore::new())
}

/// A measurement body for `device`.
pub fn measurement(device: &str, value: f64) -> String {
    format!(
        r#"{{"version":"ddc/measure/0.1","devID":"{}","val":{},"scale":"C","date":"2024-01-01 12:00:00.000"}}"#,
        device, value
    )
}

/// Poll `check` until it holds or two seconds pass.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

/// Write `files` into a temporary directory.
pub fn write_files(files: &[(&str, &str)]) -> (TempDir, Vec<PathBuf>) {
    let dir = tempfile::tempdir().unwrap();
    let paths = files
        .iter()
        .map(|(name, content)| {
            let path = dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        })
        .collect();
    (dir, paths)
}
