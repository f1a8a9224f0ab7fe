use crate::common::types::{Lsn, PageId};

/// Contract the recovery manager consumes from the storage engine.
///
/// The engine owns page memory, the durable log file, the master record
/// and LSN allocation. All calls are synchronous; the recovery manager is
/// single-threaded and never re-enters the engine from within a call.
pub trait StorageEngine {
    /// Allocate a fresh, strictly increasing LSN.
    fn next_lsn(&mut self) -> Lsn;

    /// Append an already-serialized, newline-delimited block of log
    /// records to the durable log. Durable on return.
    fn update_log(&mut self, chunk: &str);

    /// Return the complete durable log as text.
    fn get_log(&self) -> String;

    /// Overwrite page bytes at `offset` with `image`, stamp the page with
    /// `lsn`. Returns false if the engine cannot perform the write.
    fn page_write(&mut self, page_id: PageId, offset: usize, image: &str, lsn: Lsn) -> bool;

    /// Current LSN stamped on the page.
    fn get_lsn(&self, page_id: PageId) -> Lsn;

    /// Persist the begin-checkpoint LSN in a known disk location.
    fn store_master(&mut self, lsn: Lsn);

    /// Fetch the begin-checkpoint LSN of the last completed checkpoint,
    /// or `NULL_LSN` if none.
    fn get_master(&self) -> Lsn;
}
