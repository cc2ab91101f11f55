use nclist_core::consts::DEFAULT_BATCH_SIZE;
use nclist_core::errors::Result;
use nclist_core::models::{IntervalRecord, SublistHeader};

use crate::iterator::{OverlapIter, QueryIterator};

/// Storage that a [`QueryIterator`] can walk.
///
/// Records are addressed by their position in nested-list order. Implementations decide
/// how a position is turned into a record: a slice lookup for the in-memory index, a
/// block read for the file-backed one. Each traversal frame owns one `Cursor`, so any
/// buffering lives with the frame and not with the shared source.
pub trait RecordSource {
    /// Transient per-frame state.
    type Cursor: Default;

    /// Number of top-level records, which occupy positions `0..ntop`.
    fn ntop(&self) -> usize;

    /// The run holding the children of a record whose `sublist` is `isub`.
    fn sublist(&self, isub: u32) -> Result<SublistHeader>;

    /// First position in `run` whose record ends after `query_start`, or `run.end()`.
    ///
    /// Runs are sorted so that `end` never decreases, which makes this a lower bound.
    fn seek(&self, run: SublistHeader, query_start: i32, cursor: &mut Self::Cursor)
    -> Result<usize>;

    /// The record at position `idx`.
    fn record(&self, idx: usize, cursor: &mut Self::Cursor) -> Result<IntervalRecord>;

    /// Whether the record at `idx` is known to start at or after `query_end` without
    /// loading it. Returning `false` is always safe.
    fn is_past(&self, _idx: usize, _query_end: i32, _cursor: &Self::Cursor) -> bool {
        false
    }

    /// A fresh, reusable traversal cursor over this source.
    fn query_iter(&self) -> QueryIterator<'_, Self>
    where
        Self: Sized,
    {
        QueryIterator::new(self)
    }

    /// Collect every record overlapping `[start, end)`.
    fn find_all(&self, start: i32, end: i32) -> Result<Vec<IntervalRecord>>
    where
        Self: Sized,
    {
        let mut it = self.query_iter();
        let mut buf = vec![IntervalRecord::default(); DEFAULT_BATCH_SIZE];
        let mut results = Vec::new();
        loop {
            let (count, more) = it.find(start, end, &mut buf)?;
            results.extend_from_slice(&buf[..count]);
            if !more {
                break;
            }
        }
        Ok(results)
    }

    /// Lazily iterate over the records overlapping `[start, end)`.
    fn find_iter(&self, start: i32, end: i32) -> OverlapIter<'_, Self>
    where
        Self: Sized,
    {
        OverlapIter::new(self.query_iter(), start, end, DEFAULT_BATCH_SIZE)
    }
}
