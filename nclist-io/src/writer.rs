use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use nclist_core::errors::{NclistError, Result};
use nclist_core::utils::with_suffix;
use nclist_index::IntervalDb;

use crate::consts::{IDB_SUFFIX, SUBHEAD_SUFFIX, TMP_SUFFIX};
use crate::format::{
    BlockExtreme, DbHeader, SubheadHeader, subhead_checksum, write_record, write_subheader,
};

/// Path of the record file for a database stem.
pub fn idb_path<P: AsRef<Path>>(stem: P) -> PathBuf {
    with_suffix(stem, IDB_SUFFIX)
}

/// Path of the sublist header file for a database stem.
pub fn subhead_path<P: AsRef<Path>>(stem: P) -> PathBuf {
    with_suffix(stem, SUBHEAD_SUFFIX)
}

/// A file written under a temporary name and moved into place only on commit.
///
/// Dropping it uncommitted deletes the temporary file, so every early return leaves
/// nothing half-written behind.
struct PendingFile {
    tmp: PathBuf,
    dest: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl PendingFile {
    fn create(dest: PathBuf) -> Result<Self> {
        let tmp = with_suffix(&dest, TMP_SUFFIX);
        let file = File::create(&tmp)?;
        Ok(Self {
            tmp,
            dest,
            writer: Some(BufWriter::new(file)),
        })
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| NclistError::Io(std::io::Error::other("file already finished")))
    }

    /// Flush and sync the temporary file.
    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        Ok(())
    }

    fn commit(mut self) -> Result<()> {
        self.finish()?;
        fs::rename(&self.tmp, &self.dest)?;
        // nothing left to clean up
        self.tmp = PathBuf::new();
        Ok(())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if self.tmp.as_os_str().is_empty() {
            return;
        }
        self.writer.take();
        if let Err(e) = fs::remove_file(&self.tmp) {
            warn!("could not remove temporary file {:?}: {}", self.tmp, e);
        }
    }
}

///
/// Write an index to disk as `<stem>.idb` and `<stem>.subhead`.
///
/// Records are stored in nested-list order, cut into blocks of `div` records. Each block
/// gets a `(min_start, max_end)` entry in a block index stored ahead of the records so
/// that readers can skip blocks without reading them.
///
/// Both files are written under temporary names and renamed into place only after
/// everything has been written and synced. The `.idb` header carries a checksum of the
/// sublist table, so a reader can tell when the two files come from different writes.
///
/// # Arguments
/// - db: the index to persist
/// - stem: path prefix for the two output files
/// - div: records per block, at least 1
///
pub fn write_binary<P: AsRef<Path>>(db: &IntervalDb, stem: P, div: usize) -> Result<()> {
    let stem = stem.as_ref();
    let div_u32 = u32::try_from(div)
        .ok()
        .filter(|&d| d > 0)
        .ok_or_else(|| {
            NclistError::MalformedInput(format!("block size must be between 1 and {}", u32::MAX))
        })?;

    if let Some(parent) = stem.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let header = DbHeader {
        subhead_crc: subhead_checksum(db.subheaders()),
        ..DbHeader::new(
            db.len() as u64,
            db.ntop() as u64,
            db.nlists() as u64,
            div_u32,
        )
    };

    let mut subhead = PendingFile::create(subhead_path(stem))?;
    {
        let w = subhead.writer()?;
        SubheadHeader::new(header.nlists).write_to(w)?;
        for sub in db.subheaders() {
            write_subheader(w, sub)?;
        }
    }
    subhead.finish()?;

    let mut idb = PendingFile::create(idb_path(stem))?;
    {
        let w = idb.writer()?;
        header.write_to(w)?;
        for block in db.records().chunks(div) {
            BlockExtreme::of(block).write_to(w)?;
        }
        for rec in db.records() {
            write_record(w, rec)?;
        }
    }
    idb.finish()?;

    debug!(
        "synced {:?} and {:?}, moving into place",
        subhead.tmp, idb.tmp
    );
    subhead.commit()?;
    idb.commit()?;

    info!(
        "wrote {} records ({} top-level, {} sublists) in {} blocks of {} to {:?}",
        header.n,
        header.ntop,
        header.nlists,
        header.nblocks,
        div,
        stem
    );

    Ok(())
}
