use log::{debug, info};
use thiserror::Error;

use crate::common::types::{Lsn, PageId, TxnId};
use crate::storage::engine::StorageEngine;
use crate::transaction::wal::log_record::{parse_log, LogRecord, LogRecordError};
use crate::transaction::wal::log_tail::LogTail;
use crate::transaction::wal::tables::{DirtyPageTable, TransactionTable, TxStatus};

/// Error type for log manager operations
#[derive(Error, Debug)]
pub enum LogManagerError {
    #[error("storage engine unavailable: pageWrite(page {page_id}, lsn {lsn}) failed")]
    StorageUnavailable { page_id: PageId, lsn: Lsn },

    #[error("log record error: {0}")]
    LogRecordError(#[from] LogRecordError),
}

/// Result type for log manager operations
pub type Result<T> = std::result::Result<T, LogManagerError>;

/// The recovery manager: write-ahead logging for transactional page
/// updates, fuzzy checkpointing, and ARIES crash recovery.
///
/// Owns the transaction table, the dirty page table and the log tail.
/// The storage engine below owns page memory, the durable log file and
/// LSN allocation; it is reached only through the [`StorageEngine`]
/// contract. Single-threaded: the caller serializes all entry points.
pub struct LogManager {
    engine: Box<dyn StorageEngine>,
    tx_table: TransactionTable,
    dirty_page_table: DirtyPageTable,
    log_tail: LogTail,
}

impl LogManager {
    pub fn new(engine: Box<dyn StorageEngine>) -> Self {
        Self {
            engine,
            tx_table: TransactionTable::new(),
            dirty_page_table: DirtyPageTable::new(),
            log_tail: LogTail::new(),
        }
    }

    /// Replace the storage engine handle. Used after an engine restart
    /// to re-drive recovery against the restored engine.
    pub fn set_storage_engine(&mut self, engine: Box<dyn StorageEngine>) {
        self.engine = engine;
    }

    /// Log an update to `page_id` at `offset`, recording both images.
    ///
    /// Returns the LSN of the update record; the caller stamps it onto
    /// the page header so the engine can enforce write-ahead ordering
    /// when it later writes the page back.
    pub fn write(
        &mut self,
        tx_id: TxnId,
        page_id: PageId,
        offset: usize,
        after_image: &str,
        before_image: &str,
    ) -> Result<Lsn> {
        let lsn = self.engine.next_lsn();
        let prev_lsn = self.tx_table.last_lsn(tx_id);
        self.log_tail.append(LogRecord::new_update(
            lsn,
            prev_lsn,
            tx_id,
            page_id,
            offset,
            before_image.to_string(),
            after_image.to_string(),
        ));
        self.tx_table.set_last_lsn(tx_id, lsn);
        self.tx_table.set_status(tx_id, TxStatus::InProgress);
        self.dirty_page_table.record_dirty(page_id, lsn);
        Ok(lsn)
    }

    /// Commit a transaction. On return every record of the transaction
    /// up to and including its COMMIT is durable; the END record may
    /// linger in the tail.
    ///
    /// Committing a transaction the table does not know is a no-op.
    pub fn commit(&mut self, tx_id: TxnId) -> Result<()> {
        if !self.tx_table.contains(tx_id) {
            debug!("commit for unknown transaction {}, ignoring", tx_id);
            return Ok(());
        }

        let prev_lsn = self.tx_table.last_lsn(tx_id);
        let commit_lsn = self.engine.next_lsn();
        self.log_tail
            .append(LogRecord::new_commit(commit_lsn, prev_lsn, tx_id));
        self.tx_table.set_last_lsn(tx_id, commit_lsn);
        self.tx_table.set_status(tx_id, TxStatus::Committed);

        // Durable-commit point.
        self.flush_up_to(commit_lsn)?;

        let end_lsn = self.engine.next_lsn();
        self.log_tail
            .append(LogRecord::new_end(end_lsn, commit_lsn, tx_id));
        self.tx_table.remove(tx_id);

        debug!("transaction {} committed at LSN {}", tx_id, commit_lsn);
        Ok(())
    }

    /// Roll back a transaction voluntarily. The undo pass appends the
    /// ABORT record, one CLR per undone update, and the final END.
    pub fn abort(&mut self, tx_id: TxnId) -> Result<()> {
        info!("aborting transaction {}", tx_id);
        let mut log = parse_log(&self.engine.get_log())?;
        log.extend(self.log_tail.iter().cloned());
        self.undo(log, Some(tx_id))
    }

    /// Take a fuzzy checkpoint: BEGIN_CKPT / END_CKPT pair carrying
    /// deep-copied snapshots of both tables, forced to the log, with the
    /// master record pointing at the begin-checkpoint LSN. Normal
    /// operation continues; the tables are not cleared.
    pub fn checkpoint(&mut self) -> Result<()> {
        let begin_lsn = self.engine.next_lsn();
        let end_lsn = self.engine.next_lsn();

        self.log_tail.append(LogRecord::new_begin_checkpoint(begin_lsn));
        self.log_tail.append(LogRecord::new_end_checkpoint(
            end_lsn,
            begin_lsn,
            self.tx_table.clone(),
            self.dirty_page_table.clone(),
        ));
        self.flush_up_to(end_lsn)?;
        self.engine.store_master(begin_lsn);

        info!(
            "checkpoint complete: begin LSN {}, {} transactions, {} dirty pages",
            begin_lsn,
            self.tx_table.len(),
            self.dirty_page_table.len()
        );
        Ok(())
    }

    /// Called by the storage engine immediately before it writes
    /// `page_id` to disk. Forces the log through the page's LSN first,
    /// then marks the page clean.
    pub fn page_flushed(&mut self, page_id: PageId) -> Result<()> {
        let page_lsn = self.engine.get_lsn(page_id);
        self.flush_up_to(page_lsn)?;
        self.dirty_page_table.page_flushed(page_id);
        Ok(())
    }

    /// Recover from a crash, given the durable log. Runs Analysis, Redo
    /// and Undo; if Redo fails with [`LogManagerError::StorageUnavailable`]
    /// the undo pass is not attempted.
    pub fn recover(&mut self, log_text: &str) -> Result<()> {
        info!("starting crash recovery");
        let log = parse_log(log_text)?;
        self.analyze(&log)?;
        self.redo(&log)?;
        self.undo(log, None)?;
        info!("recovery complete");
        Ok(())
    }

    /// Hand every tail record with LSN <= `max_lsn` to the engine as one
    /// durable chunk. An empty flush does not touch the engine.
    pub(crate) fn flush_up_to(&mut self, max_lsn: Lsn) -> Result<()> {
        let chunk = self.log_tail.drain_up_to(max_lsn)?;
        if !chunk.is_empty() {
            self.engine.update_log(&chunk);
        }
        Ok(())
    }

    pub(crate) fn engine_mut(&mut self) -> &mut dyn StorageEngine {
        self.engine.as_mut()
    }

    pub(crate) fn tables_mut(
        &mut self,
    ) -> (&mut TransactionTable, &mut DirtyPageTable, &mut LogTail) {
        (
            &mut self.tx_table,
            &mut self.dirty_page_table,
            &mut self.log_tail,
        )
    }

    pub fn tx_table(&self) -> &TransactionTable {
        &self.tx_table
    }

    pub fn dirty_page_table(&self) -> &DirtyPageTable {
        &self.dirty_page_table
    }

    pub fn log_tail(&self) -> &LogTail {
        &self.log_tail
    }
}
