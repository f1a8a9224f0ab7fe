use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::common::types::{Lsn, PageId, NULL_LSN, PAGE_SIZE};
use crate::storage::engine::StorageEngine;

/// One call made against the engine, in order of arrival. Lets a test
/// assert on the exact interleaving of log flushes and page writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    UpdateLog { chunk: String },
    PageWrite { page_id: PageId, offset: usize, image: String, lsn: Lsn },
    StoreMaster { lsn: Lsn },
}

#[derive(Debug)]
struct MemoryPage {
    data: Vec<u8>,
    lsn: Lsn,
}

impl MemoryPage {
    fn new() -> Self {
        Self {
            data: vec![0; PAGE_SIZE],
            lsn: NULL_LSN,
        }
    }
}

#[derive(Debug)]
struct EngineState {
    next_lsn: Lsn,
    log: String,
    master: Lsn,
    pages: HashMap<PageId, MemoryPage>,
    journal: Vec<EngineCall>,
    fail_page_writes: bool,
}

/// In-memory storage engine.
///
/// Pages live in a hash map, the "durable" log is a string, and the
/// master record is a single slot. Every mutating call is recorded in a
/// journal so ordering guarantees (write-ahead in particular) can be
/// checked from the outside. Cloning an engine shares its state, so a
/// caller can keep a handle for inspection while the recovery manager
/// owns the engine.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    state: Rc<RefCell<EngineState>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(EngineState {
                next_lsn: 1,
                log: String::new(),
                master: NULL_LSN,
                pages: HashMap::new(),
                journal: Vec::new(),
                fail_page_writes: false,
            })),
        }
    }

    /// Make every subsequent `page_write` report failure. Used to drive
    /// the storage-unavailable paths of redo and undo.
    pub fn set_fail_page_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_page_writes = fail;
    }

    /// Seed a page with text at `offset` and stamp it with `lsn`,
    /// bypassing the journal. Models a page whose image was already on
    /// disk before the scenario under test begins.
    pub fn install_page(&self, page_id: PageId, offset: usize, text: &str, lsn: Lsn) {
        let mut state = self.state.borrow_mut();
        let page = state.pages.entry(page_id).or_insert_with(MemoryPage::new);
        page.data[offset..offset + text.len()].copy_from_slice(text.as_bytes());
        page.lsn = lsn;
    }

    /// Read `len` bytes of page text at `offset`.
    pub fn page_text(&self, page_id: PageId, offset: usize, len: usize) -> String {
        let state = self.state.borrow();
        match state.pages.get(&page_id) {
            Some(page) => String::from_utf8_lossy(&page.data[offset..offset + len]).into_owned(),
            None => String::new(),
        }
    }

    pub fn page_lsn(&self, page_id: PageId) -> Lsn {
        self.state.borrow().pages.get(&page_id).map_or(NULL_LSN, |p| p.lsn)
    }

    /// The durable log contents so far.
    pub fn log_contents(&self) -> String {
        self.state.borrow().log.clone()
    }

    pub fn master(&self) -> Lsn {
        self.state.borrow().master
    }

    /// Snapshot of the call journal.
    pub fn journal(&self) -> Vec<EngineCall> {
        self.state.borrow().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state.borrow_mut().journal.clear();
    }

    /// Drop all page memory while keeping the durable log, master record
    /// and LSN counter. Models a crash that loses the buffer pool.
    pub fn drop_volatile_pages(&self) {
        self.state.borrow_mut().pages.clear();
    }

    /// Resume LSN allocation at `next` after a restart, the way a real
    /// engine re-derives its counter from the highest LSN in its log.
    /// Never moves the counter backward.
    pub fn restore_lsn_counter(&self, next: Lsn) {
        let mut state = self.state.borrow_mut();
        if next > state.next_lsn {
            state.next_lsn = next;
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine for MemoryEngine {
    fn next_lsn(&mut self) -> Lsn {
        let mut state = self.state.borrow_mut();
        let lsn = state.next_lsn;
        state.next_lsn += 1;
        lsn
    }

    fn update_log(&mut self, chunk: &str) {
        let mut state = self.state.borrow_mut();
        state.log.push_str(chunk);
        state.journal.push(EngineCall::UpdateLog {
            chunk: chunk.to_string(),
        });
    }

    fn get_log(&self) -> String {
        self.state.borrow().log.clone()
    }

    fn page_write(&mut self, page_id: PageId, offset: usize, image: &str, lsn: Lsn) -> bool {
        let mut state = self.state.borrow_mut();
        if state.fail_page_writes {
            return false;
        }
        if offset + image.len() > PAGE_SIZE {
            return false;
        }
        let page = state.pages.entry(page_id).or_insert_with(MemoryPage::new);
        page.data[offset..offset + image.len()].copy_from_slice(image.as_bytes());
        page.lsn = lsn;
        state.journal.push(EngineCall::PageWrite {
            page_id,
            offset,
            image: image.to_string(),
            lsn,
        });
        true
    }

    fn get_lsn(&self, page_id: PageId) -> Lsn {
        self.state.borrow().pages.get(&page_id).map_or(NULL_LSN, |p| p.lsn)
    }

    fn store_master(&mut self, lsn: Lsn) {
        let mut state = self.state.borrow_mut();
        state.master = lsn;
        state.journal.push(EngineCall::StoreMaster { lsn });
    }

    fn get_master(&self) -> Lsn {
        self.state.borrow().master
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsn_allocation_is_strictly_increasing() {
        let mut engine = MemoryEngine::new();
        let a = engine.next_lsn();
        let b = engine.next_lsn();
        let c = engine.next_lsn();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_page_write_and_read_back() {
        let mut engine = MemoryEngine::new();
        assert!(engine.page_write(3, 10, "hello", 7));
        assert_eq!(engine.page_text(3, 10, 5), "hello");
        assert_eq!(engine.get_lsn(3), 7);
    }

    #[test]
    fn test_page_write_out_of_bounds_fails() {
        let mut engine = MemoryEngine::new();
        assert!(!engine.page_write(1, PAGE_SIZE - 2, "xyz", 1));
    }

    #[test]
    fn test_shared_handle_sees_engine_mutations() {
        let mut engine = MemoryEngine::new();
        let handle = engine.clone();
        engine.update_log("line\n");
        engine.store_master(4);
        assert_eq!(handle.log_contents(), "line\n");
        assert_eq!(handle.master(), 4);
        assert_eq!(handle.journal().len(), 2);
    }

    #[test]
    fn test_fail_injection() {
        let mut engine = MemoryEngine::new();
        engine.set_fail_page_writes(true);
        assert!(!engine.page_write(1, 0, "a", 1));
        engine.set_fail_page_writes(false);
        assert!(engine.page_write(1, 0, "a", 1));
    }
}
