//! JSONL file sink

use async_trait::async_trait;
use parking_lot::Mutex;
use pipetrace_core::{RemoteSink, SinkRecord, SinkResult};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// JSONL sink configuration
#[derive(Debug, Clone)]
pub struct JsonlSinkConfig {
    /// Output file path
    pub path: PathBuf,

    /// Whether to append to existing file
    pub append: bool,

    /// Flush after each write
    pub flush_each: bool,
}

impl Default for JsonlSinkConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("pipetrace-events.jsonl"),
            append: true,
            flush_each: true,
        }
    }
}

/// Writes each mirrored record as one JSON line
pub struct JsonlSink {
    config: JsonlSinkConfig,
    writer: Mutex<BufWriter<File>>,
    records_written: AtomicU64,
}

impl JsonlSink {
    /// Open (or create) the output file
    pub fn open(config: JsonlSinkConfig) -> SinkResult<Self> {
        let file = if config.append {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.path)?
        } else {
            File::create(&config.path)?
        };

        info!("JSONL sink writing to: {:?}", config.path);

        Ok(Self {
            config,
            writer: Mutex::new(BufWriter::new(file)),
            records_written: AtomicU64::new(0),
        })
    }

    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RemoteSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn send(&self, record: &SinkRecord) -> SinkResult<()> {
        let json = serde_json::to_string(record)?;

        let mut w = self.writer.lock();
        writeln!(w, "{}", json)?;
        if self.config.flush_each {
            w.flush()?;
        }

        self.records_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn flush(&self) -> SinkResult<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}
