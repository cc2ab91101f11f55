use nclist_core::errors::{NclistError, Result};
use nclist_core::models::{IntervalRecord, SublistHeader};

use crate::builder::{NestedList, build_nested_list, validate_layout};
use crate::traits::RecordSource;

/// An immutable, in-memory nested containment list.
///
/// Built once from an unordered batch of records; there is no insert or delete
/// afterwards. The index is `Send + Sync`, so any number of threads may query it at
/// once, each with its own [`QueryIterator`](crate::QueryIterator).
///
/// # Examples
///
/// ```
/// use nclist_core::models::IntervalRecord;
/// use nclist_index::{IntervalDb, RecordSource};
///
/// let db = IntervalDb::build(vec![
///     IntervalRecord::new(0, 10, 0, 100, 110),
///     IntervalRecord::new(2, 4, 1, 500, 502),
/// ])
/// .unwrap();
///
/// assert_eq!(db.ntop(), 1);
/// assert_eq!(db.find_all(3, 5).unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalDb {
    ntop: usize,
    records: Vec<IntervalRecord>,
    subheaders: Vec<SublistHeader>,
}

impl IntervalDb {
    ///
    /// Build an index from unordered records.
    ///
    /// # Arguments
    /// - records: the records to index; an empty vector gives an empty index
    ///
    pub fn build(records: Vec<IntervalRecord>) -> Result<Self> {
        let NestedList {
            ntop,
            records,
            subheaders,
        } = build_nested_list(records)?;

        Ok(Self {
            ntop,
            records,
            subheaders,
        })
    }

    ///
    /// Reassemble an index from an already laid out nested list, validating it first.
    ///
    pub fn from_parts(
        ntop: usize,
        records: Vec<IntervalRecord>,
        subheaders: Vec<SublistHeader>,
    ) -> Result<Self> {
        validate_layout(records.len(), ntop, &subheaders)?;

        let mut referenced = vec![false; subheaders.len()];
        for (idx, rec) in records.iter().enumerate() {
            if let Some(isub) = rec.sublist {
                let seen = referenced.get_mut(isub as usize).ok_or_else(|| {
                    NclistError::format(format!("record links to missing sublist {isub}"))
                })?;
                if subheaders[isub as usize].start <= idx {
                    return Err(NclistError::format(format!(
                        "record {idx} links back to sublist {isub}"
                    )));
                }
                if *seen {
                    return Err(NclistError::format(format!(
                        "sublist {isub} is linked from more than one record"
                    )));
                }
                *seen = true;
            }
        }
        if let Some(orphan) = referenced.iter().position(|seen| !seen) {
            return Err(NclistError::format(format!(
                "sublist {orphan} is not linked from any record"
            )));
        }

        Ok(Self {
            ntop,
            records,
            subheaders,
        })
    }

    pub fn into_parts(self) -> (usize, Vec<IntervalRecord>, Vec<SublistHeader>) {
        (self.ntop, self.records, self.subheaders)
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records not nested in any other
    pub fn ntop(&self) -> usize {
        self.ntop
    }

    /// Number of sublists
    pub fn nlists(&self) -> usize {
        self.subheaders.len()
    }

    /// All records in nested-list order
    pub fn records(&self) -> &[IntervalRecord] {
        &self.records
    }

    pub fn subheaders(&self) -> &[SublistHeader] {
        &self.subheaders
    }

    pub fn top_level(&self) -> &[IntervalRecord] {
        &self.records[..self.ntop]
    }

    /// The records directly nested inside `rec`.
    pub fn children(&self, rec: &IntervalRecord) -> &[IntervalRecord] {
        match rec.sublist.and_then(|isub| self.subheaders.get(isub as usize)) {
            Some(run) => &self.records[run.range()],
            None => &[],
        }
    }
}

impl RecordSource for IntervalDb {
    type Cursor = ();

    fn ntop(&self) -> usize {
        self.ntop
    }

    fn sublist(&self, isub: u32) -> Result<SublistHeader> {
        self.subheaders
            .get(isub as usize)
            .copied()
            .ok_or_else(|| NclistError::format(format!("sublist {isub} out of range")))
    }

    fn seek(&self, run: SublistHeader, query_start: i32, _cursor: &mut ()) -> Result<usize> {
        let slice = &self.records[run.range()];
        Ok(run.start + slice.partition_point(|r| r.end <= query_start))
    }

    fn record(&self, idx: usize, _cursor: &mut ()) -> Result<IntervalRecord> {
        Ok(self.records[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::iterator::IterState;

    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::{fixture, rstest};

    fn rec(start: i32, end: i32, target_id: i32) -> IntervalRecord {
        IntervalRecord::new(start, end, target_id, 0, end - start)
    }

    fn ids(records: &[IntervalRecord]) -> Vec<i32> {
        let mut ids: Vec<i32> = records.iter().map(|r| r.target_id).collect();
        ids.sort();
        ids
    }

    fn naive(records: &[IntervalRecord], start: i32, end: i32) -> Vec<i32> {
        if start >= end {
            return vec![];
        }
        let hits: Vec<IntervalRecord> = records
            .iter()
            .filter(|r| r.overlaps(start, end))
            .copied()
            .collect();
        ids(&hits)
    }

    fn random_records(rng: &mut StdRng, n: usize) -> Vec<IntervalRecord> {
        (0..n)
            .map(|i| {
                let start = rng.random_range(-2_000..2_000);
                let len = rng.random_range(0..300);
                if i % 13 == 0 {
                    // reversed coordinates are data too
                    rec(start + len, start, i as i32)
                } else {
                    rec(start, start + len, i as i32)
                }
            })
            .collect()
    }

    #[fixture]
    fn nested() -> IntervalDb {
        IntervalDb::build(vec![
            rec(0, 100, 0),
            rec(10, 50, 1),
            rec(20, 30, 2),
            rec(25, 28, 3),
            rec(60, 70, 4),
            rec(90, 150, 5),
            rec(200, 300, 6),
            rec(210, 220, 7),
        ])
        .unwrap()
    }

    #[rstest]
    fn test_basic_overlap() {
        let db = IntervalDb::build(vec![rec(0, 2, 10), rec(1, 5, 11), rec(6, 8, 12)]).unwrap();
        let hits = db.find_all(3, 7).unwrap();
        assert_eq!(ids(&hits), vec![11, 12]);
    }

    #[rstest]
    fn test_nesting_scenario() {
        let db = IntervalDb::build(vec![rec(0, 10, 0), rec(2, 4, 1)]).unwrap();

        assert_eq!(db.ntop(), 1);
        assert_eq!(db.nlists(), 1);
        let top = db.top_level()[0];
        assert_eq!(db.children(&top), &[rec(2, 4, 1)]);
        assert_eq!(db.children(&db.records()[1]).is_empty(), true);

        let hits = db.find_all(3, 5).unwrap();
        assert_eq!(ids(&hits), vec![0, 1]);
    }

    #[rstest]
    fn test_empty_db() {
        let db = IntervalDb::build(vec![]).unwrap();
        assert_eq!(db.is_empty(), true);

        let mut it = db.query_iter();
        let mut buf = [IntervalRecord::default(); 4];
        assert_eq!(it.find(i32::MIN, i32::MAX, &mut buf).unwrap(), (0, false));
        assert_eq!(it.state(), IterState::Exhausted);
    }

    #[rstest]
    #[case(5, 5)]
    #[case(50, 50)]
    #[case(40, 10)]
    fn test_empty_or_inverted_query_matches_nothing(
        nested: IntervalDb,
        #[case] start: i32,
        #[case] end: i32,
    ) {
        let mut it = nested.query_iter();
        let mut buf = [IntervalRecord::default(); 4];
        assert_eq!(it.find(start, end, &mut buf).unwrap(), (0, false));
    }

    #[rstest]
    fn test_full_span_matches_everything(nested: IntervalDb) {
        let hits = nested.find_all(i32::MIN, i32::MAX).unwrap();
        assert_eq!(hits.len(), nested.len());
    }

    #[rstest]
    #[case(26, 27, vec![0, 1, 2, 3])]
    #[case(29, 61, vec![0, 1, 2, 4])]
    #[case(95, 205, vec![0, 5, 6])]
    #[case(150, 200, vec![])]
    #[case(-5, 1, vec![0])]
    fn test_nested_queries(
        nested: IntervalDb,
        #[case] start: i32,
        #[case] end: i32,
        #[case] expected: Vec<i32>,
    ) {
        let hits = nested.find_all(start, end).unwrap();
        assert_eq!(ids(&hits), expected);
    }

    #[rstest]
    fn test_parent_precedes_children(nested: IntervalDb) {
        let hits = nested.find_all(26, 27).unwrap();
        let order: Vec<i32> = hits.iter().map(|r| r.target_id).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    fn test_small_buffers_resume(nested: IntervalDb, #[case] capacity: usize) {
        let mut it = nested.query_iter();
        let mut buf = vec![IntervalRecord::default(); capacity];
        let mut collected = Vec::new();
        let mut calls = 0;

        loop {
            let (count, more) = it.find(0, 1_000, &mut buf).unwrap();
            assert!(count <= capacity);
            collected.extend_from_slice(&buf[..count]);
            calls += 1;
            if !more {
                break;
            }
            // more is exact: a full buffer is only reported as unfinished when it is
            assert_eq!(count, capacity);
        }

        assert_eq!(ids(&collected), (0..8).collect::<Vec<i32>>());
        assert_eq!(calls, 8usize.div_ceil(capacity));
        assert_eq!(it.state(), IterState::Exhausted);
        assert_eq!(it.find(0, 1_000, &mut buf).unwrap(), (0, false));
    }

    #[rstest]
    fn test_exact_fill_reports_no_more(nested: IntervalDb) {
        let mut it = nested.query_iter();
        let mut buf = vec![IntervalRecord::default(); 8];
        assert_eq!(it.find(0, 1_000, &mut buf).unwrap(), (8, false));
    }

    #[rstest]
    fn test_zero_capacity_peeks(nested: IntervalDb) {
        let mut it = nested.query_iter();
        let mut empty: [IntervalRecord; 0] = [];
        assert_eq!(it.find(26, 27, &mut empty).unwrap(), (0, true));

        let mut buf = vec![IntervalRecord::default(); 10];
        let (count, more) = it.find(26, 27, &mut buf).unwrap();
        assert_eq!((count, more), (4, false));
    }

    #[rstest]
    fn test_reset_matches_fresh_iterator(nested: IntervalDb) {
        let mut buf = vec![IntervalRecord::default(); 2];

        let mut it = nested.query_iter();
        it.find(0, 1_000, &mut buf).unwrap();
        assert_eq!(it.state(), IterState::Active);
        let depth_before = it.depth();
        assert!(depth_before > 0);

        it.reset();
        assert_eq!(it.state(), IterState::Fresh);
        assert_eq!(it.depth(), 0);

        let mut reused = Vec::new();
        loop {
            let (count, more) = it.find(26, 27, &mut buf).unwrap();
            reused.extend_from_slice(&buf[..count]);
            if !more {
                break;
            }
        }

        assert_eq!(reused, nested.find_all(26, 27).unwrap());
    }

    #[rstest]
    fn test_new_range_restarts(nested: IntervalDb) {
        let mut it = nested.query_iter();
        let mut buf = vec![IntervalRecord::default(); 1];
        assert_eq!(it.find(0, 1_000, &mut buf).unwrap(), (1, true));

        let mut big = vec![IntervalRecord::default(); 16];
        let (count, more) = it.find(95, 205, &mut big).unwrap();
        assert_eq!(more, false);
        assert_eq!(ids(&big[..count]), vec![0, 5, 6]);
        assert_eq!(it.state(), IterState::Exhausted);
    }

    #[rstest]
    fn test_exhausted_stays_exhausted_until_reset(nested: IntervalDb) {
        let mut it = nested.query_iter();
        let mut buf = vec![IntervalRecord::default(); 16];

        let (count, more) = it.find(0, 5, &mut buf).unwrap();
        assert_eq!((count, more), (1, false));
        assert_eq!(it.state(), IterState::Exhausted);

        // a new range does not revive an exhausted iterator
        assert_eq!(it.find(200, 205, &mut buf).unwrap(), (0, false));
        assert_eq!(it.find(26, 27, &mut buf).unwrap(), (0, false));
        assert_eq!(it.state(), IterState::Exhausted);

        it.reset();
        let (count, more) = it.find(26, 27, &mut buf).unwrap();
        assert_eq!(more, false);
        assert_eq!(ids(&buf[..count]), vec![0, 1, 2, 3]);
    }

    #[rstest]
    fn test_find_iter(nested: IntervalDb) {
        let hits: Vec<IntervalRecord> = nested
            .find_iter(29, 61)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(ids(&hits), vec![0, 1, 2, 4]);
        assert_eq!(nested.find_iter(150, 200).next().is_none(), true);
    }

    #[rstest]
    #[case(11)]
    #[case(23)]
    #[case(2024)]
    fn test_matches_naive_scan(#[case] seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let records = random_records(&mut rng, 1_500);

        let mut shuffled = records.clone();
        shuffled.reverse();

        let db = IntervalDb::build(records.clone()).unwrap();
        let db_rev = IntervalDb::build(shuffled).unwrap();
        let mut it = db.query_iter();
        let mut buf = vec![IntervalRecord::default(); 7];

        for _ in 0..300 {
            let start = rng.random_range(-2_500..2_500);
            let end = start + rng.random_range(-10..400);
            let expected = naive(&records, start, end);

            let mut got = Vec::new();
            loop {
                let (count, more) = it.find(start, end, &mut buf).unwrap();
                got.extend_from_slice(&buf[..count]);
                if !more {
                    break;
                }
            }
            it.reset();

            assert_eq!(ids(&got), expected, "query [{start}, {end})");
            assert_eq!(ids(&db_rev.find_all(start, end).unwrap()), expected);
        }
    }

    #[rstest]
    fn test_concurrent_iterators(nested: IntervalDb) {
        let expected = ids(&nested.find_all(0, 1_000).unwrap());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let hits = nested.find_all(0, 1_000).unwrap();
                    assert_eq!(ids(&hits), expected);
                });
            }
        });
    }

    #[rstest]
    fn test_from_parts_round_trip(nested: IntervalDb) {
        let (ntop, records, subheaders) = nested.clone().into_parts();
        let rebuilt = IntervalDb::from_parts(ntop, records, subheaders).unwrap();
        assert_eq!(rebuilt, nested);
    }

    #[rstest]
    fn test_from_parts_rejects_bad_links(nested: IntervalDb) {
        let (ntop, mut records, subheaders) = nested.into_parts();
        records[0].sublist = Some(99);
        assert_eq!(
            IntervalDb::from_parts(ntop, records.clone(), subheaders.clone()).is_err(),
            true
        );

        records[0].sublist = None;
        assert_eq!(IntervalDb::from_parts(ntop, records, subheaders).is_err(), true);
    }

    #[rstest]
    fn test_from_parts_rejects_self_link() {
        let mut outer = rec(0, 100, 0);
        outer.sublist = Some(1);
        let mut middle = rec(10, 50, 1);
        middle.sublist = Some(0);

        // the middle record would be its own child
        let result = IntervalDb::from_parts(
            1,
            vec![outer, middle, rec(20, 30, 2)],
            vec![SublistHeader::new(1, 1), SublistHeader::new(2, 1)],
        );
        assert!(matches!(result, Err(NclistError::Format(_))));
    }
}
