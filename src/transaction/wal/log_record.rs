use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::types::{Lsn, PageId, TxnId, NULL_LSN, NULL_TX};
use crate::transaction::wal::tables::{DirtyPageTable, TransactionTable};

/// Error type for log record operations
#[derive(Error, Debug)]
pub enum LogRecordError {
    #[error("corrupt log record: {line:?}")]
    CorruptLogRecord { line: String },

    #[error("failed to serialize log record: {0}")]
    SerializationError(String),
}

/// Result type for log record operations
pub type Result<T> = std::result::Result<T, LogRecordError>;

/// Types of log records supported by the WAL system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRecordType {
    /// Records an update to a page (before and after image)
    Update,
    /// Compensation record describing the undo of an earlier update
    Compensation,
    /// Marks the successful completion of a transaction
    Commit,
    /// Marks the start of a transaction rollback
    Abort,
    /// Marks that a transaction will write no further records
    End,
    /// Opens a fuzzy checkpoint
    BeginCheckpoint,
    /// Closes a fuzzy checkpoint, carrying the table snapshots
    EndCheckpoint,
}

/// Content of an UPDATE log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateContent {
    /// Page the update touched
    pub page_id: PageId,
    /// Byte offset of the update within the page
    pub offset: usize,
    /// Page bytes before the update
    pub before_image: String,
    /// Page bytes after the update
    pub after_image: String,
}

/// Content of a compensation (CLR) log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationContent {
    pub page_id: PageId,
    pub offset: usize,
    /// The undo value written back to the page (the compensated
    /// update's before-image)
    pub after_image: String,
    /// prevLSN of the update this record compensates; NULL_LSN once the
    /// transaction's first update has been undone
    pub undo_next_lsn: Lsn,
}

/// Content of an END_CKPT log record: by-value snapshots of both
/// bookkeeping tables as of the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointContent {
    pub tx_table: TransactionTable,
    pub dirty_page_table: DirtyPageTable,
}

/// Union of all possible log record content types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogRecordContent {
    Update(UpdateContent),
    Compensation(CompensationContent),
    Commit,
    Abort,
    End,
    BeginCheckpoint,
    EndCheckpoint(CheckpointContent),
}

/// Main log record structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log Sequence Number - unique identifier for this log record
    pub lsn: Lsn,
    /// LSN of the previous log record of the same transaction
    pub prev_lsn: Lsn,
    /// Transaction that generated this log record (NULL_TX for
    /// checkpoint markers)
    pub tx_id: TxnId,
    /// Content of the log record
    pub content: LogRecordContent,
}

impl LogRecord {
    pub fn new(lsn: Lsn, prev_lsn: Lsn, tx_id: TxnId, content: LogRecordContent) -> Self {
        Self {
            lsn,
            prev_lsn,
            tx_id,
            content,
        }
    }

    /// Create a new UPDATE log record
    pub fn new_update(
        lsn: Lsn,
        prev_lsn: Lsn,
        tx_id: TxnId,
        page_id: PageId,
        offset: usize,
        before_image: String,
        after_image: String,
    ) -> Self {
        Self::new(
            lsn,
            prev_lsn,
            tx_id,
            LogRecordContent::Update(UpdateContent {
                page_id,
                offset,
                before_image,
                after_image,
            }),
        )
    }

    /// Create a new compensation log record
    pub fn new_compensation(
        lsn: Lsn,
        prev_lsn: Lsn,
        tx_id: TxnId,
        page_id: PageId,
        offset: usize,
        after_image: String,
        undo_next_lsn: Lsn,
    ) -> Self {
        Self::new(
            lsn,
            prev_lsn,
            tx_id,
            LogRecordContent::Compensation(CompensationContent {
                page_id,
                offset,
                after_image,
                undo_next_lsn,
            }),
        )
    }

    /// Create a new COMMIT log record
    pub fn new_commit(lsn: Lsn, prev_lsn: Lsn, tx_id: TxnId) -> Self {
        Self::new(lsn, prev_lsn, tx_id, LogRecordContent::Commit)
    }

    /// Create a new ABORT log record
    pub fn new_abort(lsn: Lsn, prev_lsn: Lsn, tx_id: TxnId) -> Self {
        Self::new(lsn, prev_lsn, tx_id, LogRecordContent::Abort)
    }

    /// Create a new END log record
    pub fn new_end(lsn: Lsn, prev_lsn: Lsn, tx_id: TxnId) -> Self {
        Self::new(lsn, prev_lsn, tx_id, LogRecordContent::End)
    }

    /// Create a new BEGIN_CKPT log record. Checkpoint markers belong to
    /// no transaction and start no chain.
    pub fn new_begin_checkpoint(lsn: Lsn) -> Self {
        Self::new(lsn, NULL_LSN, NULL_TX, LogRecordContent::BeginCheckpoint)
    }

    /// Create a new END_CKPT log record carrying deep copies of both
    /// tables as of this moment.
    pub fn new_end_checkpoint(
        lsn: Lsn,
        prev_lsn: Lsn,
        tx_table: TransactionTable,
        dirty_page_table: DirtyPageTable,
    ) -> Self {
        Self::new(
            lsn,
            prev_lsn,
            NULL_TX,
            LogRecordContent::EndCheckpoint(CheckpointContent {
                tx_table,
                dirty_page_table,
            }),
        )
    }

    pub fn record_type(&self) -> LogRecordType {
        match self.content {
            LogRecordContent::Update(_) => LogRecordType::Update,
            LogRecordContent::Compensation(_) => LogRecordType::Compensation,
            LogRecordContent::Commit => LogRecordType::Commit,
            LogRecordContent::Abort => LogRecordType::Abort,
            LogRecordContent::End => LogRecordType::End,
            LogRecordContent::BeginCheckpoint => LogRecordType::BeginCheckpoint,
            LogRecordContent::EndCheckpoint(_) => LogRecordType::EndCheckpoint,
        }
    }

    /// Serialize the record to its canonical single-line text form.
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LogRecordError::SerializationError(e.to_string()))
    }

    /// Parse one log line into a freshly owned record.
    pub fn parse_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|_| LogRecordError::CorruptLogRecord {
            line: line.to_string(),
        })
    }
}

/// Parse a newline-delimited log into a vector of owned records.
/// Blank lines are skipped; any malformed line fails the whole parse.
pub fn parse_log(text: &str) -> Result<Vec<LogRecord>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(LogRecord::parse_line)
        .collect()
}
