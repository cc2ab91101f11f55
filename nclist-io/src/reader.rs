use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::{info, trace};

use nclist_core::consts::RECORD_SIZE;
use nclist_core::errors::{NclistError, Result};
use nclist_core::models::{IntervalRecord, SublistHeader};
use nclist_index::{IntervalDb, RecordSource, validate_layout};

use crate::format::{
    BlockExtreme, DbHeader, SubheadHeader, decode_record, read_subheader, subhead_checksum,
    truncated,
};
use crate::writer::{idb_path, subhead_path};

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ));
            }
            Ok(n) => {
                let rest = buf;
                buf = &mut rest[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// One materialized block, owned by a traversal frame.
#[derive(Debug, Default)]
pub struct BlockCursor {
    block: Option<usize>,
    first: usize,
    records: Vec<IntervalRecord>,
    raw: Vec<u8>,
}

/// A read-only interval database backed by files on disk.
///
/// Opening reads the headers, the block index and the sublist table. Records stay on
/// disk and are fetched one block at a time as queries need them, with positional reads
/// so that one open database can serve iterators on several threads at once.
///
/// # Examples
///
/// ```no_run
/// use nclist_index::RecordSource;
/// use nclist_io::IntervalDbFile;
///
/// let db = IntervalDbFile::open("alignments/chr1").unwrap();
/// for hit in db.find_iter(1_000, 2_000) {
///     println!("{:?}", hit.unwrap());
/// }
/// db.close();
/// ```
#[derive(Debug)]
pub struct IntervalDbFile {
    header: DbHeader,
    n: usize,
    ntop: usize,
    div: usize,
    blocks: Vec<BlockExtreme>,
    subheaders: Vec<SublistHeader>,
    file: File,
    path: PathBuf,
}

fn to_usize(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| NclistError::format(format!("{what} {value} does not fit in memory")))
}

impl IntervalDbFile {
    ///
    /// Open the database written under `stem`.
    ///
    /// Fails with a format error when either file is not a database, has an unsupported
    /// version, is truncated, declares counts that do not agree, or when the `.subhead`
    /// file was not written together with the `.idb` file.
    ///
    pub fn open<P: AsRef<Path>>(stem: P) -> Result<Self> {
        let stem = stem.as_ref();
        let path = idb_path(stem);

        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        let mut reader = BufReader::new(&file);
        let header = DbHeader::read_from(&mut reader)?;
        header.validate()?;

        let expected = header.expected_file_len()?;
        if file_len != expected {
            return Err(NclistError::format(format!(
                "{:?} is {} bytes, header describes {}",
                path, file_len, expected
            )));
        }

        let n = to_usize(header.n, "record count")?;
        let ntop = to_usize(header.ntop, "top-level count")?;
        let div = to_usize(u64::from(header.div), "block size")?;
        let nblocks = to_usize(header.nblocks, "block count")?;

        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(nblocks)
            .map_err(|e| NclistError::allocation("block index", e))?;
        for _ in 0..nblocks {
            blocks.push(BlockExtreme::read_from(&mut reader).map_err(|e| truncated(e, "block index"))?);
        }
        drop(reader);

        let subheaders = Self::read_subheaders(stem, &header)?;
        if subhead_checksum(&subheaders) != header.subhead_crc {
            return Err(NclistError::format(format!(
                "{:?} was not written together with {:?}",
                subhead_path(stem),
                path
            )));
        }
        validate_layout(n, ntop, &subheaders)?;

        info!(
            "opened {:?}: {} records, {} top-level, {} sublists, {} blocks of {}",
            path,
            n,
            ntop,
            subheaders.len(),
            nblocks,
            div
        );

        Ok(Self {
            header,
            n,
            ntop,
            div,
            blocks,
            subheaders,
            file,
            path,
        })
    }

    fn read_subheaders(stem: &Path, header: &DbHeader) -> Result<Vec<SublistHeader>> {
        let path = subhead_path(stem);
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        let mut reader = BufReader::new(file);
        let subhead = SubheadHeader::read_from(&mut reader)?;
        if subhead.nlists != header.nlists {
            return Err(NclistError::format(format!(
                "{:?} holds {} sublists, database expects {}",
                path, subhead.nlists, header.nlists
            )));
        }

        let expected = subhead.expected_file_len()?;
        if file_len != expected {
            return Err(NclistError::format(format!(
                "{:?} is {} bytes, header describes {}",
                path, file_len, expected
            )));
        }

        let nlists = to_usize(subhead.nlists, "sublist count")?;
        let mut subheaders = Vec::new();
        subheaders
            .try_reserve_exact(nlists)
            .map_err(|e| NclistError::allocation("sublist table", e))?;
        for _ in 0..nlists {
            subheaders.push(read_subheader(&mut reader)?);
        }

        Ok(subheaders)
    }

    /// Release the file handle.
    pub fn close(self) {
        info!("closing {:?}", self.path);
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn ntop(&self) -> usize {
        self.ntop
    }

    pub fn nlists(&self) -> usize {
        self.subheaders.len()
    }

    /// Records per block
    pub fn div(&self) -> usize {
        self.div
    }

    pub fn nblocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn header(&self) -> &DbHeader {
        &self.header
    }

    pub fn subheaders(&self) -> &[SublistHeader] {
        &self.subheaders
    }

    pub fn block_extremes(&self) -> &[BlockExtreme] {
        &self.blocks
    }

    /// Path of the `.idb` file
    pub fn path(&self) -> &Path {
        &self.path
    }

    ///
    /// Read every record into memory and return an equivalent in-memory index.
    ///
    pub fn load(&self) -> Result<IntervalDb> {
        let mut raw = Vec::new();
        raw.try_reserve_exact(self.n * RECORD_SIZE)
            .map_err(|e| NclistError::allocation("record array", e))?;
        raw.resize(self.n * RECORD_SIZE, 0);
        read_exact_at(&self.file, &mut raw, self.header.records_offset)
            .map_err(|e| truncated(e, "record section"))?;

        let records = raw
            .chunks_exact(RECORD_SIZE)
            .map(decode_record)
            .collect::<Result<Vec<_>>>()?;

        IntervalDb::from_parts(self.ntop, records, self.subheaders.clone())
    }

    /// Materialize `block` into `cursor` unless it already holds it.
    fn load_block(&self, block: usize, cursor: &mut BlockCursor) -> Result<()> {
        if cursor.block == Some(block) {
            return Ok(());
        }

        let first = block * self.div;
        if first >= self.n {
            return Err(NclistError::format(format!("block {block} out of range")));
        }
        let count = self.div.min(self.n - first);

        cursor.block = None;
        cursor.raw.resize(count * RECORD_SIZE, 0);
        let offset = self.header.records_offset + (first * RECORD_SIZE) as u64;
        read_exact_at(&self.file, &mut cursor.raw, offset)
            .map_err(|e| truncated(e, "record block"))?;

        cursor.records.clear();
        for chunk in cursor.raw.chunks_exact(RECORD_SIZE) {
            cursor.records.push(decode_record(chunk)?);
        }
        cursor.block = Some(block);
        cursor.first = first;

        trace!("loaded block {} ({} records) from {:?}", block, count, self.path);
        Ok(())
    }

    /// Lower bound of `run` within one block, if the block holds it.
    fn seek_in_block(
        &self,
        block: usize,
        run: SublistHeader,
        query_start: i32,
        cursor: &mut BlockCursor,
    ) -> Result<Option<usize>> {
        if self.blocks[block].max_end <= query_start {
            return Ok(None);
        }
        self.load_block(block, cursor)?;

        let lo = run.start.max(cursor.first);
        let hi = run.end().min(cursor.first + cursor.records.len());
        if lo >= hi {
            return Ok(None);
        }

        let window = &cursor.records[lo - cursor.first..hi - cursor.first];
        let k = window.partition_point(|r| r.end <= query_start);
        Ok((k < window.len()).then_some(lo + k))
    }
}

impl RecordSource for IntervalDbFile {
    type Cursor = BlockCursor;

    fn ntop(&self) -> usize {
        self.ntop
    }

    fn sublist(&self, isub: u32) -> Result<SublistHeader> {
        self.subheaders
            .get(isub as usize)
            .copied()
            .ok_or_else(|| NclistError::format(format!("sublist {isub} out of range")))
    }

    fn seek(
        &self,
        run: SublistHeader,
        query_start: i32,
        cursor: &mut BlockCursor,
    ) -> Result<usize> {
        if run.is_empty() {
            return Ok(run.end());
        }

        let first = run.start / self.div;
        let last = (run.end() - 1) / self.div;

        // the edge blocks may be shared with neighbouring runs, so check them directly
        if let Some(idx) = self.seek_in_block(first, run, query_start, cursor)? {
            return Ok(idx);
        }
        if last == first {
            return Ok(run.end());
        }

        // blocks strictly inside the run hold only run records, whose ends never
        // decrease, so their max_end is monotone too
        let interior = &self.blocks[first + 1..last];
        let candidate = first + 1 + interior.partition_point(|b| b.max_end <= query_start);
        if let Some(idx) = self.seek_in_block(candidate, run, query_start, cursor)? {
            return Ok(idx);
        }
        if candidate != last {
            if let Some(idx) = self.seek_in_block(last, run, query_start, cursor)? {
                return Ok(idx);
            }
        }

        Ok(run.end())
    }

    fn record(&self, idx: usize, cursor: &mut BlockCursor) -> Result<IntervalRecord> {
        self.load_block(idx / self.div, cursor)?;
        cursor
            .records
            .get(idx - cursor.first)
            .copied()
            .ok_or_else(|| NclistError::format(format!("record {idx} out of range")))
    }

    fn is_past(&self, idx: usize, query_end: i32, cursor: &BlockCursor) -> bool {
        let block = idx / self.div;
        cursor.block != Some(block)
            && self
                .blocks
                .get(block)
                .is_some_and(|b| b.min_start >= query_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use crate::writer::write_binary;

    fn rec(start: i32, end: i32, target_id: i32) -> IntervalRecord {
        IntervalRecord::new(start, end, target_id, start, end)
    }

    #[rstest]
    fn test_open_reads_tables() {
        let tempdir = tempfile::tempdir().unwrap();
        let stem = tempdir.path().join("db");

        let db = IntervalDb::build(vec![rec(0, 10, 0), rec(2, 4, 1), rec(20, 30, 2)]).unwrap();
        write_binary(&db, &stem, 2).unwrap();

        let file_db = IntervalDbFile::open(&stem).unwrap();
        assert_eq!(file_db.len(), 3);
        assert_eq!(file_db.ntop(), 2);
        assert_eq!(file_db.nlists(), 1);
        assert_eq!(file_db.div(), 2);
        assert_eq!(file_db.nblocks(), 2);
        assert_eq!(file_db.subheaders(), db.subheaders());
        assert_eq!(
            file_db.block_extremes()[0],
            BlockExtreme {
                min_start: 0,
                max_end: 30
            }
        );
        file_db.close();
    }

    #[rstest]
    fn test_cursor_reuses_loaded_block() {
        let tempdir = tempfile::tempdir().unwrap();
        let stem = tempdir.path().join("db");

        let records: Vec<IntervalRecord> = (0..10).map(|i| rec(i * 10, i * 10 + 5, i)).collect();
        let db = IntervalDb::build(records).unwrap();
        write_binary(&db, &stem, 4).unwrap();
        let file_db = IntervalDbFile::open(&stem).unwrap();

        let mut cursor = BlockCursor::default();
        assert_eq!(file_db.record(5, &mut cursor).unwrap(), db.records()[5]);
        assert_eq!(cursor.block, Some(1));
        assert_eq!(file_db.record(6, &mut cursor).unwrap(), db.records()[6]);
        assert_eq!(cursor.block, Some(1));
        assert_eq!(file_db.record(9, &mut cursor).unwrap(), db.records()[9]);
        assert_eq!(cursor.records.len(), 2);

        // block 1 starts at 40, so nothing in it can be hit by a query ending at 40
        let fresh = BlockCursor::default();
        assert_eq!(file_db.is_past(4, 40, &fresh), true);
        assert_eq!(file_db.is_past(4, 41, &fresh), false);
    }

    #[rstest]
    fn test_seek_skips_blocks() {
        let tempdir = tempfile::tempdir().unwrap();
        let stem = tempdir.path().join("db");

        let records: Vec<IntervalRecord> = (0..100).map(|i| rec(i * 10, i * 10 + 5, i)).collect();
        let db = IntervalDb::build(records).unwrap();
        write_binary(&db, &stem, 8).unwrap();
        let file_db = IntervalDbFile::open(&stem).unwrap();

        let top = SublistHeader::new(0, 100);
        let mut cursor = BlockCursor::default();
        for query_start in [-10, 0, 4, 5, 333, 995, 2_000] {
            let expected = db.seek(top, query_start, &mut ()).unwrap();
            assert_eq!(file_db.seek(top, query_start, &mut cursor).unwrap(), expected);
        }
    }
}
