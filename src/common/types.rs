/// Page size in bytes (8KB)
pub const PAGE_SIZE: usize = 8192;

/// Page ID type
pub type PageId = u32;

/// Transaction ID type
pub type TxnId = u32;

/// LSN (Log Sequence Number) type
pub type Lsn = u64;

/// Sentinel LSN meaning "no log record". Real LSNs start at 1.
pub const NULL_LSN: Lsn = 0;

/// Sentinel transaction ID for system records (checkpoints) that are
/// not tied to any transaction. Real transaction IDs start at 1.
pub const NULL_TX: TxnId = 0;
