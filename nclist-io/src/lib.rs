//! # Binary persistence for interval databases.
//!
//! An index built by `nclist-index` is written to a pair of files sharing a stem:
//! `<stem>.idb` with the records in nested-list order behind a block index, and
//! `<stem>.subhead` with the sublist table. [`IntervalDbFile`] opens such a pair and
//! answers overlap queries straight from disk, reading only the blocks a query touches.
//!
//! ```no_run
//! use nclist_index::{IntervalDb, RecordSource};
//! use nclist_io::{IntervalDbFile, write_binary};
//!
//! let db = IntervalDb::build(vec![(0, 10).into(), (2, 4).into(), (20, 30).into()]).unwrap();
//! write_binary(&db, "out/chr1", 256).unwrap();
//!
//! let on_disk = IntervalDbFile::open("out/chr1").unwrap();
//! assert_eq!(on_disk.find_all(3, 25).unwrap().len(), 3);
//! ```
//!
pub mod consts;
pub mod format;
pub mod reader;
pub mod records;
pub mod writer;

// re-expose core functions
pub use consts::*;
pub use format::{BlockExtreme, DbHeader, SubheadHeader};
pub use reader::{BlockCursor, IntervalDbFile};
pub use records::{read_records, write_records};
pub use writer::{idb_path, subhead_path, write_binary};
