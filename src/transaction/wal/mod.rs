// Write-ahead logging and ARIES recovery

pub mod log_manager;
pub mod log_record;
pub mod log_tail;
pub mod recovery;
pub mod tables;

// Public exports
pub use log_manager::{LogManager, LogManagerError};
pub use log_record::{LogRecord, LogRecordType};
pub use tables::{DirtyPageTable, TransactionTable, TxStatus};
