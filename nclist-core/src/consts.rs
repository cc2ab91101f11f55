/// Records per on-disk block when the caller does not choose one.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Results fetched per `find` call by the iterator adapters.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Bytes per record on disk: six little-endian `i32`s.
pub const RECORD_SIZE: usize = 24;

/// On-disk value of an absent sublist link.
pub const NO_SUBLIST: i32 = -1;
