/// Magic bytes opening the record file ("NCLS").
pub const IDB_MAGIC: [u8; 4] = *b"NCLS";

/// Magic bytes opening the sublist header file ("NCSH").
pub const SUBHEAD_MAGIC: [u8; 4] = *b"NCSH";

pub const FORMAT_VERSION: u32 = 1;

/// Fixed size of the record file header.
pub const IDB_HEADER_SIZE: u64 = 64;

/// Fixed size of the sublist file header.
pub const SUBHEAD_HEADER_SIZE: u64 = 16;

/// One `(min_start, max_end)` block-skip entry.
pub const BLOCK_ENTRY_SIZE: u64 = 8;

/// One `(start, len)` sublist header entry.
pub const SUBHEAD_ENTRY_SIZE: u64 = 16;

pub const IDB_SUFFIX: &str = "idb";
pub const SUBHEAD_SUFFIX: &str = "subhead";
pub const TMP_SUFFIX: &str = "tmp";
