use nclist_core::errors::{NclistError, Result};
use nclist_core::models::{IntervalRecord, SublistHeader};

use crate::traits::RecordSource;

/// Lifecycle of a [`QueryIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    /// New or just reset; the next `find` starts a traversal.
    Fresh,
    /// A traversal is in progress and may still produce results.
    Active,
    /// The root run has been popped. Nothing more until reset or a new range.
    Exhausted,
}

/// One level of the traversal stack: a cursor over the run `[pos, end)`.
#[derive(Debug, Default)]
struct Frame<C> {
    pos: usize,
    end: usize,
    cursor: C,
}

/// A resumable overlap query over any [`RecordSource`].
///
/// The iterator keeps an explicit stack of frames, one per nesting level currently
/// being scanned. Frames are indexed by depth and never freed on pop, so resetting and
/// reusing an iterator across many queries does not reallocate.
///
/// An iterator is a single-caller cursor. Any number of them may share one source.
///
/// # Examples
///
/// ```
/// use nclist_core::models::IntervalRecord;
/// use nclist_index::{IntervalDb, RecordSource};
///
/// let db = IntervalDb::build(vec![
///     IntervalRecord::new(0, 2, 0, 0, 2),
///     IntervalRecord::new(1, 5, 1, 0, 4),
///     IntervalRecord::new(6, 8, 2, 0, 2),
/// ])
/// .unwrap();
///
/// let mut it = db.query_iter();
/// let mut buf = [IntervalRecord::default(); 1];
///
/// let (count, more) = it.find(3, 7, &mut buf).unwrap();
/// assert_eq!((count, more), (1, true));
/// let (count, more) = it.find(3, 7, &mut buf).unwrap();
/// assert_eq!((count, more), (1, false));
/// ```
pub struct QueryIterator<'a, S: RecordSource> {
    source: &'a S,
    frames: Vec<Frame<S::Cursor>>,
    depth: usize,
    state: IterState,
    query: (i32, i32),
    // one match of lookahead so `more` is exact
    pending: Option<IntervalRecord>,
}

impl<'a, S: RecordSource> QueryIterator<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            frames: Vec::new(),
            depth: 0,
            state: IterState::Fresh,
            query: (0, 0),
            pending: None,
        }
    }

    pub fn state(&self) -> IterState {
        self.state
    }

    /// Current stack depth (0 when fresh or exhausted).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Drop all traversal state but keep the frame storage.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.pending = None;
        self.state = IterState::Fresh;
    }

    ///
    /// Fill `buf` with records overlapping `[start, end)`.
    ///
    /// Repeated calls with the same range continue where the previous call stopped.
    /// Calling an active iterator with a different range starts over for that range.
    /// Once exhausted, every call returns `(0, false)` until [`QueryIterator::reset`].
    ///
    /// # Returns
    /// - the number of records written to the front of `buf`, and whether more
    ///   results are pending for another call
    ///
    pub fn find(
        &mut self,
        start: i32,
        end: i32,
        buf: &mut [IntervalRecord],
    ) -> Result<(usize, bool)> {
        if self.state == IterState::Active && self.query != (start, end) {
            self.reset();
        }

        match self.state {
            IterState::Exhausted => return Ok((0, false)),
            IterState::Fresh => self.begin(start, end)?,
            IterState::Active => {}
        }

        let mut count = 0;
        while count < buf.len() {
            let next = match self.pending.take() {
                Some(rec) => Some(rec),
                None => self.advance()?,
            };
            match next {
                Some(rec) => {
                    buf[count] = rec;
                    count += 1;
                }
                None => break,
            }
        }

        if self.pending.is_none() && self.state == IterState::Active {
            self.pending = self.advance()?;
        }

        Ok((count, self.pending.is_some()))
    }

    fn begin(&mut self, start: i32, end: i32) -> Result<()> {
        self.query = (start, end);
        self.depth = 0;
        self.pending = None;

        // an empty or inverted range matches nothing
        if start >= end || self.source.ntop() == 0 {
            self.state = IterState::Exhausted;
            return Ok(());
        }

        self.push_run(SublistHeader::new(0, self.source.ntop()))?;
        self.state = IterState::Active;
        Ok(())
    }

    fn push_run(&mut self, run: SublistHeader) -> Result<()> {
        if run.is_empty() {
            return Ok(());
        }

        if self.depth == self.frames.len() {
            self.frames
                .try_reserve(1)
                .map_err(|e| NclistError::allocation("iterator frame", e))?;
            self.frames.push(Frame::default());
        }

        let frame = &mut self.frames[self.depth];
        frame.pos = self.source.seek(run, self.query.0, &mut frame.cursor)?;
        frame.end = run.end();
        self.depth += 1;
        Ok(())
    }

    /// Step the traversal to the next overlapping record.
    fn advance(&mut self) -> Result<Option<IntervalRecord>> {
        let (start, end) = self.query;

        while self.depth > 0 {
            let frame = &mut self.frames[self.depth - 1];
            if frame.pos >= frame.end || self.source.is_past(frame.pos, end, &frame.cursor) {
                self.depth -= 1;
                continue;
            }

            let rec = self.source.record(frame.pos, &mut frame.cursor)?;
            if rec.start >= end {
                // the rest of this run starts later still
                self.depth -= 1;
                continue;
            }
            frame.pos += 1;

            if let Some(isub) = rec.sublist {
                let run = self.source.sublist(isub)?;
                // children are always laid out after their container
                if run.start < frame.pos {
                    return Err(NclistError::format(format!(
                        "sublist {isub} does not follow record {}",
                        frame.pos - 1
                    )));
                }
                self.push_run(run)?;
            }

            if rec.end > start {
                return Ok(Some(rec));
            }
        }

        self.state = IterState::Exhausted;
        Ok(None)
    }
}

/// An [`Iterator`] over the records overlapping one range.
///
/// Created by [`RecordSource::find_iter`]. It drives a [`QueryIterator`] in batches and
/// yields records one by one; I/O failures from a file-backed source surface as an
/// `Err` item, after which the iterator ends.
pub struct OverlapIter<'a, S: RecordSource> {
    inner: QueryIterator<'a, S>,
    start: i32,
    end: i32,
    buf: Vec<IntervalRecord>,
    filled: usize,
    next: usize,
    more: bool,
}

impl<'a, S: RecordSource> OverlapIter<'a, S> {
    pub fn new(inner: QueryIterator<'a, S>, start: i32, end: i32, batch_size: usize) -> Self {
        Self {
            inner,
            start,
            end,
            buf: vec![IntervalRecord::default(); batch_size.max(1)],
            filled: 0,
            next: 0,
            more: true,
        }
    }
}

impl<S: RecordSource> Iterator for OverlapIter<'_, S> {
    type Item = Result<IntervalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next < self.filled {
            self.next += 1;
            return Some(Ok(self.buf[self.next - 1]));
        }
        if !self.more {
            return None;
        }

        match self.inner.find(self.start, self.end, &mut self.buf) {
            Ok((count, more)) => {
                self.filled = count;
                self.more = more;
                if count == 0 {
                    return None;
                }
                self.next = 1;
                Some(Ok(self.buf[0]))
            }
            Err(e) => {
                self.more = false;
                self.filled = 0;
                Some(Err(e))
            }
        }
    }
}
