use kestreldb::transaction::wal::log_record::{parse_log, LogRecord};
use kestreldb::{LogManager, MemoryEngine};

// Create a recovery manager over a fresh in-memory engine, keeping a
// shared handle to the engine for inspection.
#[allow(dead_code)]
pub fn create_test_manager() -> (LogManager, MemoryEngine) {
    let engine = MemoryEngine::new();
    let handle = engine.clone();
    let manager = LogManager::new(Box::new(engine));
    (manager, handle)
}

// Simulate a crash: everything volatile is lost, only the durable log,
// the master record and the page store survive. Returns a fresh manager
// attached to the surviving engine plus the log text to recover from.
#[allow(dead_code)]
pub fn crash_and_reload(engine: &MemoryEngine) -> (LogManager, String) {
    let log = engine.log_contents();
    let manager = LogManager::new(Box::new(engine.clone()));
    (manager, log)
}

// The complete logical log: durable records followed by the unflushed
// tail, in emission order.
#[allow(dead_code)]
pub fn emitted_records(manager: &LogManager, engine: &MemoryEngine) -> Vec<LogRecord> {
    let mut records = parse_log(&engine.log_contents()).unwrap();
    records.extend(manager.log_tail().iter().cloned());
    records
}
