use std::ops::Range;

/// A contiguous run of sibling records in nested-list order.
///
/// The top-level run is described by a header too (`start = 0, len = ntop`),
/// it just never appears in the sublist table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SublistHeader {
    pub start: usize,
    pub len: usize,
}

impl SublistHeader {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// One past the last record of the run
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
