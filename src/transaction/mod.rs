// Transaction management: write-ahead logging and recovery

pub mod wal;

// Public exports
pub use wal::log_manager::LogManager;
pub use wal::log_record::{LogRecord, LogRecordType};
