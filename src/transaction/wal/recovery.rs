//! The three ARIES passes: Analysis rebuilds the bookkeeping tables from
//! the last complete checkpoint, Redo repeats history forward from the
//! earliest recLSN, and Undo rolls back every loser transaction by
//! walking prevLSN chains and emitting compensation records. Voluntary
//! abort reuses the same Undo machinery restricted to one transaction.

use std::collections::BinaryHeap;

use log::{debug, info};

use crate::common::types::{Lsn, TxnId, NULL_LSN, NULL_TX};
use crate::transaction::wal::log_manager::{LogManager, LogManagerError, Result};
use crate::transaction::wal::log_record::{LogRecord, LogRecordContent, LogRecordError};
use crate::transaction::wal::tables::{DirtyPageTable, TransactionTable, TxStatus};

impl LogManager {
    /// Analysis pass: reconstruct the transaction table and dirty page
    /// table as of the crash.
    ///
    /// Scans backward for the last END_CKPT and adopts its snapshots,
    /// then scans forward from just past it (or from the start of the
    /// log when no checkpoint exists), replaying table effects. The
    /// tables are rebuilt in scratch copies and only installed once the
    /// whole scan succeeds, so a corrupt log leaves the live tables
    /// untouched.
    pub(crate) fn analyze(&mut self, log: &[LogRecord]) -> Result<()> {
        info!("analysis pass: rebuilding tables from {} log records", log.len());

        let mut tx_table = TransactionTable::new();
        let mut dirty_page_table = DirtyPageTable::new();

        let mut start = 0;
        for (pos, record) in log.iter().enumerate().rev() {
            if let LogRecordContent::EndCheckpoint(snapshot) = &record.content {
                tx_table = snapshot.tx_table.clone();
                dirty_page_table = snapshot.dirty_page_table.clone();
                start = pos + 1;
                debug!("adopted checkpoint snapshot at LSN {}", record.lsn);
                break;
            }
        }

        for record in &log[start..] {
            let tx_id = record.tx_id;
            if tx_id != NULL_TX {
                tx_table.set_last_lsn(tx_id, record.lsn);
            }
            match &record.content {
                LogRecordContent::Commit => {
                    tx_table.set_status(tx_id, TxStatus::Committed);
                }
                LogRecordContent::Update(update) => {
                    if tx_table.status(tx_id) == Some(TxStatus::Committed) {
                        debug!(
                            "update at LSN {} for committed transaction {}",
                            record.lsn, tx_id
                        );
                        return Err(LogRecordError::CorruptLogRecord {
                            line: record.to_line()?,
                        }
                        .into());
                    }
                    tx_table.set_status(tx_id, TxStatus::InProgress);
                    dirty_page_table.record_dirty(update.page_id, record.lsn);
                }
                LogRecordContent::Compensation(clr) => {
                    tx_table.set_status(tx_id, TxStatus::InProgress);
                    dirty_page_table.record_dirty(clr.page_id, record.lsn);
                }
                LogRecordContent::End => {
                    tx_table.remove(tx_id);
                }
                LogRecordContent::Abort
                | LogRecordContent::BeginCheckpoint
                | LogRecordContent::EndCheckpoint(_) => {}
            }
        }

        debug!(
            "analysis complete: {} transactions, {} dirty pages",
            tx_table.len(),
            dirty_page_table.len()
        );

        let (live_tx_table, live_dirty_page_table, _) = self.tables_mut();
        *live_tx_table = tx_table;
        *live_dirty_page_table = dirty_page_table;
        Ok(())
    }

    /// Redo pass: repeat history. Every UPDATE and CLR whose effect may
    /// be missing from disk is re-applied, then END records are emitted
    /// for transactions that committed but never ended.
    pub(crate) fn redo(&mut self, log: &[LogRecord]) -> Result<()> {
        if let Some(start_lsn) = self.dirty_page_table().min_rec_lsn() {
            info!("redo pass: repeating history from LSN {}", start_lsn);
            let start = log
                .iter()
                .position(|r| r.lsn >= start_lsn)
                .unwrap_or(log.len());

            for record in &log[start..] {
                let (page_id, offset, after_image) = match &record.content {
                    LogRecordContent::Update(update) => {
                        (update.page_id, update.offset, update.after_image.as_str())
                    }
                    LogRecordContent::Compensation(clr) => {
                        (clr.page_id, clr.offset, clr.after_image.as_str())
                    }
                    _ => continue,
                };

                // Page was clean at crash time: its post-image is on disk.
                let rec_lsn = match self.dirty_page_table().rec_lsn(page_id) {
                    Some(rec_lsn) => rec_lsn,
                    None => continue,
                };
                // Dirtied only by a later record: this effect is on disk.
                if rec_lsn > record.lsn {
                    continue;
                }
                // Page already carries this update or a newer one.
                if self.engine_mut().get_lsn(page_id) >= record.lsn {
                    continue;
                }

                debug!("redoing LSN {} on page {}", record.lsn, page_id);
                if !self
                    .engine_mut()
                    .page_write(page_id, offset, after_image, record.lsn)
                {
                    return Err(LogManagerError::StorageUnavailable {
                        page_id,
                        lsn: record.lsn,
                    });
                }
            }
        } else {
            debug!("redo pass: no dirty pages, nothing to repeat");
        }

        // Committed-but-not-ended transactions get their END now.
        for tx_id in self.tx_table().ids() {
            if self.tx_table().status(tx_id) != Some(TxStatus::Committed) {
                continue;
            }
            let prev_lsn = self.tx_table().last_lsn(tx_id);
            let end_lsn = self.engine_mut().next_lsn();
            let (tx_table, _, log_tail) = self.tables_mut();
            log_tail.append(LogRecord::new_end(end_lsn, prev_lsn, tx_id));
            tx_table.remove(tx_id);
            debug!("ended committed transaction {} at LSN {}", tx_id, end_lsn);
        }

        Ok(())
    }

    /// Undo pass: roll back losers.
    ///
    /// With `txnum` set this is a voluntary abort: the ABORT record is
    /// appended here and only that transaction's chain is walked. With
    /// `txnum` absent every transaction still in the table with a
    /// non-committed status is a loser. Chains are consumed from a
    /// max-priority queue so records are undone in strictly decreasing
    /// LSN order across all losers.
    pub(crate) fn undo(&mut self, mut log: Vec<LogRecord>, txnum: Option<TxnId>) -> Result<()> {
        let mut to_undo: BinaryHeap<Lsn> = BinaryHeap::new();

        match txnum {
            Some(tx_id) => {
                let prev_lsn = self.tx_table().last_lsn(tx_id);
                let abort_lsn = self.engine_mut().next_lsn();
                let abort = LogRecord::new_abort(abort_lsn, prev_lsn, tx_id);
                let (tx_table, _, log_tail) = self.tables_mut();
                log_tail.append(abort.clone());
                log.push(abort);
                tx_table.set_last_lsn(tx_id, abort_lsn);
                tx_table.set_status(tx_id, TxStatus::InProgress);
                to_undo.push(abort_lsn);
            }
            None => {
                for (tx_id, entry) in self.tx_table().iter() {
                    if entry.status != TxStatus::Committed {
                        debug!("loser transaction {} with last LSN {}", tx_id, entry.last_lsn);
                        to_undo.push(entry.last_lsn);
                    }
                }
            }
        }

        while let Some(lsn) = to_undo.pop() {
            let record = match log.iter().find(|r| r.lsn == lsn) {
                Some(record) => record.clone(),
                None => continue,
            };

            match record.content {
                LogRecordContent::Update(update) => {
                    let tx_id = record.tx_id;
                    let prev_lsn = self.tx_table().last_lsn(tx_id);
                    let clr_lsn = self.engine_mut().next_lsn();
                    let (tx_table, dirty_page_table, log_tail) = self.tables_mut();
                    log_tail.append(LogRecord::new_compensation(
                        clr_lsn,
                        prev_lsn,
                        tx_id,
                        update.page_id,
                        update.offset,
                        update.before_image.clone(),
                        record.prev_lsn,
                    ));
                    tx_table.set_last_lsn(tx_id, clr_lsn);
                    tx_table.set_status(tx_id, TxStatus::InProgress);
                    dirty_page_table.record_dirty(update.page_id, clr_lsn);

                    if !self.engine_mut().page_write(
                        update.page_id,
                        update.offset,
                        &update.before_image,
                        clr_lsn,
                    ) {
                        return Err(LogManagerError::StorageUnavailable {
                            page_id: update.page_id,
                            lsn: clr_lsn,
                        });
                    }

                    if record.prev_lsn == NULL_LSN {
                        self.append_undo_end(tx_id, clr_lsn);
                    } else {
                        to_undo.push(record.prev_lsn);
                    }
                }
                LogRecordContent::Compensation(clr) => {
                    // CLRs are redo-only: they steer the walk, nothing
                    // is compensated twice.
                    if clr.undo_next_lsn != NULL_LSN {
                        to_undo.push(clr.undo_next_lsn);
                    } else {
                        self.append_undo_end(record.tx_id, record.lsn);
                    }
                }
                LogRecordContent::Abort => {
                    if record.prev_lsn != NULL_LSN {
                        to_undo.push(record.prev_lsn);
                    } else {
                        let prev_lsn = self.tx_table().last_lsn(record.tx_id);
                        self.append_undo_end(record.tx_id, prev_lsn);
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// A loser's chain is fully undone: append its END and drop it from
    /// the transaction table.
    fn append_undo_end(&mut self, tx_id: TxnId, prev_lsn: Lsn) {
        let end_lsn = self.engine_mut().next_lsn();
        let (tx_table, _, log_tail) = self.tables_mut();
        log_tail.append(LogRecord::new_end(end_lsn, prev_lsn, tx_id));
        tx_table.remove(tx_id);
        info!("rolled back transaction {}", tx_id);
    }
}
