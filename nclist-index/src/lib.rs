//! Nested containment lists for interval overlap queries.
//!
//! A nested containment list (NCList) stores intervals so that every run of siblings is
//! sorted on both `start` and `end`, and any interval contained in another lives in that
//! container's sublist. An overlap query binary-searches each visited run and only
//! descends into the sublists of records it actually hits, which keeps queries fast even
//! when intervals nest deeply (alignment blocks inside alignment blocks, for example).
//!
//! ## Quick Start
//!
//! ```rust
//! use nclist_core::models::IntervalRecord;
//! use nclist_index::{IntervalDb, RecordSource};
//!
//! let db = IntervalDb::build(vec![
//!     IntervalRecord::new(0, 2, 0, 1000, 1002),
//!     IntervalRecord::new(1, 5, 1, 2000, 2004),
//!     IntervalRecord::new(6, 8, 2, 3000, 3002),
//! ])
//! .unwrap();
//!
//! let hits = db.find_all(3, 7).unwrap();
//! assert_eq!(hits.len(), 2);
//!
//! for hit in db.find_iter(3, 7) {
//!     let hit = hit.unwrap();
//!     println!("{}..{} -> target {}", hit.start, hit.end, hit.target_id);
//! }
//! ```
//!
//! ## Bounded batches
//!
//! [`QueryIterator::find`] fills a caller-provided buffer and reports whether more
//! results are pending, so result memory stays bounded however many records match.
//! The same iterator works over any [`RecordSource`]; the `nclist-io` crate provides a
//! file-backed one that reads records block by block.

/// Nested list construction.
///
/// See [`build_nested_list`] for details.
pub mod builder;

/// The in-memory index.
///
/// See [`IntervalDb`] for details.
pub mod db;

/// Resumable overlap traversal.
///
/// See [`QueryIterator`] for details.
pub mod iterator;

/// The storage seam between traversal and records.
///
/// See [`RecordSource`] for details.
pub mod traits;

// re-exports
pub use self::builder::{NestedList, build_nested_list, validate_layout};
pub use self::db::IntervalDb;
pub use self::iterator::{IterState, OverlapIter, QueryIterator};
pub use self::traits::RecordSource;
