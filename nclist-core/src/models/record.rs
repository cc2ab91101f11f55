use std::cmp::Ordering;

/// A single mapped interval: `[start, end)` in the source coordinate space plus
/// the range `[target_start, target_end)` it maps to on `target_id`.
///
/// Coordinates are plain signed integers. Negative values are legal and are
/// commonly used by callers to encode orientation; the index never interprets
/// the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntervalRecord {
    pub start: i32,
    pub end: i32,
    pub target_id: i32,
    pub target_start: i32,
    pub target_end: i32,
    /// Index of this record's children in the sublist header table.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub sublist: Option<u32>,
}

impl IntervalRecord {
    pub fn new(start: i32, end: i32, target_id: i32, target_start: i32, target_end: i32) -> Self {
        Self {
            start,
            end,
            target_id,
            target_start,
            target_end,
            sublist: None,
        }
    }

    /// Check if the record overlaps the half-open range `[start, end)`
    #[inline]
    pub fn overlaps(&self, start: i32, end: i32) -> bool {
        self.start < end && self.end > start
    }

    /// Check if `other` nests inside this record.
    ///
    /// Records with an identical `end` are siblings, not containers, so runs of
    /// siblings always have non-decreasing `start` and `end`.
    #[inline]
    pub fn contains(&self, other: &IntervalRecord) -> bool {
        self.start <= other.start && self.end > other.end
    }

    /// The same record with its sublist link cleared.
    #[inline]
    pub fn unlinked(&self) -> Self {
        Self {
            sublist: None,
            ..*self
        }
    }

    /// Ordering used to lay out nested lists: `start` ascending, then `end`
    /// descending so that a container always precedes what it contains.
    #[inline]
    pub fn nesting_cmp(&self, other: &IntervalRecord) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| other.end.cmp(&self.end))
    }
}

impl From<(i32, i32)> for IntervalRecord {
    fn from((start, end): (i32, i32)) -> Self {
        IntervalRecord::new(start, end, 0, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case((0, 2), 3, 7, false)]
    #[case((1, 5), 3, 7, true)]
    #[case((6, 8), 3, 7, true)]
    #[case((7, 9), 3, 7, false)]
    #[case((-10, -4), -5, 0, true)]
    #[case((-10, -5), -5, 0, false)]
    fn test_overlaps(
        #[case] span: (i32, i32),
        #[case] start: i32,
        #[case] end: i32,
        #[case] expected: bool,
    ) {
        let rec = IntervalRecord::from(span);
        assert_eq!(rec.overlaps(start, end), expected);
    }

    #[rstest]
    fn test_contains() {
        let outer = IntervalRecord::from((0, 10));
        assert_eq!(outer.contains(&IntervalRecord::from((2, 4))), true);
        assert_eq!(outer.contains(&IntervalRecord::from((0, 9))), true);
        // same end means sibling
        assert_eq!(outer.contains(&IntervalRecord::from((5, 10))), false);
        assert_eq!(outer.contains(&IntervalRecord::from((0, 10))), false);
        assert_eq!(outer.contains(&IntervalRecord::from((-1, 5))), false);
    }

    #[rstest]
    fn test_nesting_order() {
        let mut recs: Vec<IntervalRecord> = vec![(5, 6), (0, 2), (0, 10), (3, 4)]
            .into_iter()
            .map(IntervalRecord::from)
            .collect();
        recs.sort_by(|a, b| a.nesting_cmp(b));

        let spans: Vec<(i32, i32)> = recs.iter().map(|r| (r.start, r.end)).collect();
        assert_eq!(spans, vec![(0, 10), (0, 2), (3, 4), (5, 6)]);
    }

    #[rstest]
    fn test_unlinked() {
        let mut rec = IntervalRecord::new(1, 2, 3, 4, 5);
        rec.sublist = Some(7);
        assert_eq!(rec.unlinked(), IntervalRecord::new(1, 2, 3, 4, 5));
    }
}
