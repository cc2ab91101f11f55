use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info};

use nclist_core::consts::RECORD_SIZE;
use nclist_core::errors::{NclistError, Result};
use nclist_core::models::IntervalRecord;

use crate::format::{decode_record, truncated, write_record};

///
/// Dump records as a headerless run of 24-byte rows, in the order given.
///
/// Sublist links are not written; a dump is raw input for a later build, not an index.
///
pub fn write_records<P: AsRef<Path>>(path: P, records: &[IntervalRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    for rec in records {
        write_record(&mut writer, &rec.unlinked())?;
    }
    writer.flush()?;

    info!("dumped {} records to {:?}", records.len(), path);
    Ok(())
}

///
/// Read a dump written by [`write_records`].
///
/// Fails with a format error when the file length is not a whole number of records.
///
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<IntervalRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let len = file.metadata()?.len();

    if len % RECORD_SIZE as u64 != 0 {
        return Err(NclistError::format(format!(
            "{:?} is {} bytes, not a multiple of the {}-byte record size",
            path, len, RECORD_SIZE
        )));
    }
    let count = usize::try_from(len / RECORD_SIZE as u64)
        .map_err(|_| NclistError::format(format!("{:?} holds too many records", path)))?;

    let mut records = Vec::new();
    records
        .try_reserve_exact(count)
        .map_err(|e| NclistError::allocation("record dump", e))?;

    let mut reader = BufReader::new(file);
    let mut buf = [0u8; RECORD_SIZE];
    for _ in 0..count {
        reader
            .read_exact(&mut buf)
            .map_err(|e| truncated(e, "record dump"))?;
        records.push(decode_record(&buf)?.unlinked());
    }

    debug!("read {} records from {:?}", records.len(), path);
    Ok(records)
}
