use std::collections::VecDeque;

use crate::common::types::Lsn;
use crate::transaction::wal::log_record::{LogRecord, Result};

/// In-memory buffer of log records not yet handed to the storage engine.
///
/// Records arrive in emission order, which is strictly increasing LSN
/// order, so draining a prefix by LSN is a head-of-queue walk.
#[derive(Debug, Default)]
pub struct LogTail {
    records: VecDeque<LogRecord>,
}

impl LogTail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: LogRecord) {
        self.records.push_back(record);
    }

    /// Drain every head record with LSN <= `max_lsn`, serializing each
    /// into a single newline-delimited chunk. Records with larger LSNs
    /// stay buffered. Returns the chunk; empty when no record qualifies.
    pub fn drain_up_to(&mut self, max_lsn: Lsn) -> Result<String> {
        let mut chunk = String::new();
        while self.records.front().map_or(false, |head| head.lsn <= max_lsn) {
            if let Some(record) = self.records.pop_front() {
                chunk.push_str(&record.to_line()?);
                chunk.push('\n');
            }
        }
        Ok(chunk)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
