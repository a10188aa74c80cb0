// src/crawl/sink.rs
// =============================================================================
// Where records go once they are extracted.
//
// The driver hands every Record to a Sink and forgets about it. A sink never
// reports errors back: if writing fails, it logs and keeps going, because
// one bad write should not stop a crawl that has already done the work.
//
// Sinks provided:
// - JsonLinesSink: one JSON object per line, to stdout or a file
// - MemorySink: keeps records in a Vec (tests, small crawls)
// =============================================================================

use std::io::Write;
use tracing::warn;

use super::extract::Record;

pub trait Sink {
    fn emit(&mut self, record: Record);
}

/// Writes records as JSON Lines.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of records successfully written.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(mut self) -> W {
        if let Err(e) = self.writer.flush() {
            warn!(error = %e, "failed to flush record output");
        }
        self.writer
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn emit(&mut self, record: Record) {
        let result = serde_json::to_writer(&mut self.writer, &record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));

        match result {
            Ok(()) => self.written += 1,
            Err(e) => warn!(url = %record.url, error = %e, "failed to write record"),
        }
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<Record>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, record: Record) {
        self.records.push(record);
    }
}
