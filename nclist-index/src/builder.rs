use log::debug;

use nclist_core::errors::{NclistError, Result};
use nclist_core::models::{IntervalRecord, SublistHeader};

/// The output of [`build_nested_list`]: records in nested-list order plus the
/// table describing where each record's children live.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedList {
    /// Number of records not contained in any other record. They occupy
    /// `records[..ntop]`.
    pub ntop: usize,
    pub records: Vec<IntervalRecord>,
    pub subheaders: Vec<SublistHeader>,
}

impl NestedList {
    pub fn nlists(&self) -> usize {
        self.subheaders.len()
    }
}

fn try_filled<T: Clone>(len: usize, value: T, what: &str) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|e| NclistError::allocation(what, e))?;
    v.resize(len, value);
    Ok(v)
}

///
/// Reorder `records` into a nested containment list.
///
/// Records are sorted by `start` ascending and `end` descending (ties keep their input
/// order), then a single pass with an explicit ancestor stack assigns every record to
/// the innermost record that contains it. The result places all top-level records first,
/// followed by one contiguous run per record that has children.
///
/// Any `sublist` value on the input records is ignored.
///
/// # Arguments
/// - records: unordered records to index
///
/// # Returns
/// - the reordered records and their sublist header table
///
pub fn build_nested_list(mut records: Vec<IntervalRecord>) -> Result<NestedList> {
    let n = records.len();
    if n == 0 {
        return Ok(NestedList::default());
    }

    // sort_by is stable, which keeps equal records in input order
    records.sort_by(|a, b| a.nesting_cmp(b));

    // parent[i] is the sorted index of the innermost record containing record i
    let mut parent: Vec<Option<usize>> = Vec::new();
    parent
        .try_reserve_exact(n)
        .map_err(|e| NclistError::allocation("parent links", e))?;

    let mut ancestors: Vec<usize> = Vec::new();
    let mut max_depth = 0;

    for i in 0..n {
        while let Some(&top) = ancestors.last() {
            if records[top].contains(&records[i]) {
                break;
            }
            ancestors.pop();
        }
        parent.push(ancestors.last().copied());

        ancestors
            .try_reserve(1)
            .map_err(|e| NclistError::allocation("ancestor stack", e))?;
        ancestors.push(i);
        max_depth = max_depth.max(ancestors.len());
    }

    // number the sublists in the order their first child shows up
    let mut sublist_of: Vec<Option<u32>> = try_filled(n, None, "sublist links")?;
    let mut lengths: Vec<usize> = Vec::new();
    let mut ntop = 0;

    for p in parent.iter() {
        match *p {
            None => ntop += 1,
            Some(p) => {
                let isub = match sublist_of[p] {
                    Some(isub) => isub,
                    None => {
                        let isub = u32::try_from(lengths.len()).map_err(|_| {
                            NclistError::Allocation("more than u32::MAX sublists".to_string())
                        })?;
                        lengths
                            .try_reserve(1)
                            .map_err(|e| NclistError::allocation("sublist table", e))?;
                        lengths.push(0);
                        sublist_of[p] = Some(isub);
                        isub
                    }
                };
                lengths[isub as usize] += 1;
            }
        }
    }

    let mut subheaders: Vec<SublistHeader> = Vec::new();
    subheaders
        .try_reserve_exact(lengths.len())
        .map_err(|e| NclistError::allocation("sublist table", e))?;
    let mut offset = ntop;
    for len in lengths {
        subheaders.push(SublistHeader::new(offset, len));
        offset += len;
    }

    // flatten: top-level run first, then every sublist in id order
    let mut next_slot: Vec<usize> = subheaders.iter().map(|h| h.start).collect();
    let mut next_top = 0;
    let mut ordered: Vec<IntervalRecord> = try_filled(n, IntervalRecord::default(), "record array")?;

    for (i, rec) in records.iter().enumerate() {
        let slot = match parent[i].and_then(|p| sublist_of[p]) {
            Some(isub) => {
                let slot = next_slot[isub as usize];
                next_slot[isub as usize] += 1;
                slot
            }
            None => {
                next_top += 1;
                next_top - 1
            }
        };
        ordered[slot] = IntervalRecord {
            sublist: sublist_of[i],
            ..*rec
        };
    }

    debug!(
        "built nested list: n={} ntop={} nlists={} max_depth={}",
        n,
        ntop,
        subheaders.len(),
        max_depth
    );

    Ok(NestedList {
        ntop,
        records: ordered,
        subheaders,
    })
}

///
/// Check that a sublist table describes a valid layout for `n` records with `ntop`
/// top-level records: every run is non-empty and in bounds, and together the runs
/// cover `[ntop, n)` exactly once.
///
pub fn validate_layout(n: usize, ntop: usize, subheaders: &[SublistHeader]) -> Result<()> {
    if ntop > n {
        return Err(NclistError::format(format!(
            "top-level count {ntop} exceeds record count {n}"
        )));
    }
    if n > 0 && ntop == 0 {
        return Err(NclistError::format("non-empty index without top-level records"));
    }

    let mut runs: Vec<SublistHeader> = subheaders.to_vec();
    runs.sort_unstable_by_key(|h| h.start);

    let mut expected = ntop;
    for run in runs.iter() {
        if run.is_empty() {
            return Err(NclistError::format(format!("empty sublist at {}", run.start)));
        }
        if run.start != expected {
            return Err(NclistError::format(format!(
                "sublist at {} does not follow the previous run ending at {expected}",
                run.start
            )));
        }
        expected = run.start.checked_add(run.len).ok_or_else(|| {
            NclistError::format(format!("sublist at {} overflows", run.start))
        })?;
    }

    if expected != n {
        return Err(NclistError::format(format!(
            "sublists cover records up to {expected}, expected {n}"
        )));
    }

    Ok(())
}
