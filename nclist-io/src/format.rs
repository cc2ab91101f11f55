//! On-disk layout of an interval database.
//!
//! A database is two files sharing a stem:
//!
//! `<stem>.idb`, all little-endian:
//! - 0x00..0x04: magic `NCLS`
//! - 0x04..0x08: version (u32)
//! - 0x08..0x0C: records per block, `div` (u32)
//! - 0x0C..0x10: CRC-32 of the `.subhead` sublist table (u32), binding the two files
//! - 0x10..0x18: record count `n` (u64)
//! - 0x18..0x20: top-level count `ntop` (u64)
//! - 0x20..0x28: sublist count `nlists` (u64)
//! - 0x28..0x30: block count (u64)
//! - 0x30..0x38: block index offset (u64)
//! - 0x38..0x40: record section offset (u64)
//!
//! followed by one `(min_start, max_end)` pair of i32 per block, then the `n` records
//! as six i32 each (`start, end, target_id, target_start, target_end, sublist`, with
//! `-1` for no sublist).
//!
//! `<stem>.subhead`: magic `NCSH`, version (u32), `nlists` (u64), then `(start, len)`
//! as u64 pairs.
use std::io::{self, Read, Write};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

use nclist_core::consts::{NO_SUBLIST, RECORD_SIZE};
use nclist_core::errors::{NclistError, Result};
use nclist_core::models::{IntervalRecord, SublistHeader};

use crate::consts::{
    BLOCK_ENTRY_SIZE, FORMAT_VERSION, IDB_HEADER_SIZE, IDB_MAGIC, SUBHEAD_ENTRY_SIZE,
    SUBHEAD_HEADER_SIZE, SUBHEAD_MAGIC,
};

/// Map a short read to a format error; anything else stays an I/O error.
pub(crate) fn truncated(err: io::Error, what: &str) -> NclistError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        NclistError::format(format!("truncated {what}"))
    } else {
        NclistError::Io(err)
    }
}

/// Header of the `.idb` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbHeader {
    pub version: u32,
    pub div: u32,
    /// Checksum of the sublist table this file was written with.
    pub subhead_crc: u32,
    pub n: u64,
    pub ntop: u64,
    pub nlists: u64,
    pub nblocks: u64,
    pub block_index_offset: u64,
    pub records_offset: u64,
}

impl DbHeader {
    /// Header for `n` records cut into blocks of `div`, with section offsets filled in.
    pub fn new(n: u64, ntop: u64, nlists: u64, div: u32) -> Self {
        let nblocks = n.div_ceil(u64::from(div.max(1)));
        Self {
            version: FORMAT_VERSION,
            div,
            subhead_crc: subhead_checksum(&[]),
            n,
            ntop,
            nlists,
            nblocks,
            block_index_offset: IDB_HEADER_SIZE,
            records_offset: IDB_HEADER_SIZE.saturating_add(nblocks.saturating_mul(BLOCK_ENTRY_SIZE)),
        }
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        writer.write_all(&IDB_MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.div)?;
        writer.write_u32::<LittleEndian>(self.subhead_crc)?;
        writer.write_u64::<LittleEndian>(self.n)?;
        writer.write_u64::<LittleEndian>(self.ntop)?;
        writer.write_u64::<LittleEndian>(self.nlists)?;
        writer.write_u64::<LittleEndian>(self.nblocks)?;
        writer.write_u64::<LittleEndian>(self.block_index_offset)?;
        writer.write_u64::<LittleEndian>(self.records_offset)?;
        Ok(())
    }

    /// Read and check magic and version. Does not check the counts; see [`DbHeader::validate`].
    pub fn read_from(reader: &mut impl Read) -> Result<Self> {
        let mut buf = [0u8; IDB_HEADER_SIZE as usize];
        reader
            .read_exact(&mut buf)
            .map_err(|e| truncated(e, "database header"))?;

        if buf[0..4] != IDB_MAGIC {
            return Err(NclistError::format("not an interval database (bad magic)"));
        }

        let version = LittleEndian::read_u32(&buf[4..8]);
        if version != FORMAT_VERSION {
            return Err(NclistError::format(format!(
                "unsupported format version {version}"
            )));
        }

        Ok(Self {
            version,
            div: LittleEndian::read_u32(&buf[8..12]),
            subhead_crc: LittleEndian::read_u32(&buf[12..16]),
            n: LittleEndian::read_u64(&buf[16..24]),
            ntop: LittleEndian::read_u64(&buf[24..32]),
            nlists: LittleEndian::read_u64(&buf[32..40]),
            nblocks: LittleEndian::read_u64(&buf[40..48]),
            block_index_offset: LittleEndian::read_u64(&buf[48..56]),
            records_offset: LittleEndian::read_u64(&buf[56..64]),
        })
    }

    /// Check that the declared counts and offsets agree with each other.
    pub fn validate(&self) -> Result<()> {
        if self.div == 0 {
            return Err(NclistError::format("block size is zero"));
        }
        if self.ntop > self.n {
            return Err(NclistError::format(format!(
                "top-level count {} exceeds record count {}",
                self.ntop, self.n
            )));
        }
        if self.n > 0 && self.ntop == 0 {
            return Err(NclistError::format("records present but no top-level records"));
        }
        if self.nlists > self.n {
            return Err(NclistError::format(format!(
                "sublist count {} exceeds record count {}",
                self.nlists, self.n
            )));
        }
        if self.nblocks != self.n.div_ceil(u64::from(self.div)) {
            return Err(NclistError::format(format!(
                "{} blocks declared for {} records of block size {}",
                self.nblocks, self.n, self.div
            )));
        }
        if self.block_index_offset != IDB_HEADER_SIZE {
            return Err(NclistError::format("unexpected block index offset"));
        }
        let records_offset = self
            .nblocks
            .checked_mul(BLOCK_ENTRY_SIZE)
            .and_then(|len| len.checked_add(IDB_HEADER_SIZE));
        if records_offset != Some(self.records_offset) {
            return Err(NclistError::format("unexpected record section offset"));
        }
        self.expected_file_len()?;
        Ok(())
    }

    /// Size in bytes the `.idb` file must have.
    pub fn expected_file_len(&self) -> Result<u64> {
        self.n
            .checked_mul(RECORD_SIZE as u64)
            .and_then(|len| len.checked_add(self.records_offset))
            .ok_or_else(|| NclistError::format("record section size overflows"))
    }
}

/// Header of the `.subhead` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubheadHeader {
    pub version: u32,
    pub nlists: u64,
}

impl SubheadHeader {
    pub fn new(nlists: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            nlists,
        }
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<()> {
        writer.write_all(&SUBHEAD_MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u64::<LittleEndian>(self.nlists)?;
        Ok(())
    }

    pub fn read_from(reader: &mut impl Read) -> Result<Self> {
        let mut buf = [0u8; SUBHEAD_HEADER_SIZE as usize];
        reader
            .read_exact(&mut buf)
            .map_err(|e| truncated(e, "sublist header"))?;

        if buf[0..4] != SUBHEAD_MAGIC {
            return Err(NclistError::format("not a sublist header file (bad magic)"));
        }
        let version = LittleEndian::read_u32(&buf[4..8]);
        if version != FORMAT_VERSION {
            return Err(NclistError::format(format!(
                "unsupported sublist format version {version}"
            )));
        }

        Ok(Self {
            version,
            nlists: LittleEndian::read_u64(&buf[8..16]),
        })
    }

    pub fn expected_file_len(&self) -> Result<u64> {
        self.nlists
            .checked_mul(SUBHEAD_ENTRY_SIZE)
            .and_then(|len| len.checked_add(SUBHEAD_HEADER_SIZE))
            .ok_or_else(|| NclistError::format("sublist table size overflows"))
    }
}

/// Extremes of one block, used to skip blocks that cannot hold a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockExtreme {
    pub min_start: i32,
    pub max_end: i32,
}

impl BlockExtreme {
    /// Extremes over a non-empty block of records.
    pub fn of(block: &[IntervalRecord]) -> Self {
        block.iter().fold(
            BlockExtreme {
                min_start: i32::MAX,
                max_end: i32::MIN,
            },
            |acc, rec| BlockExtreme {
                min_start: acc.min_start.min(rec.start),
                max_end: acc.max_end.max(rec.end),
            },
        )
    }

    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_i32::<LittleEndian>(self.min_start)?;
        writer.write_i32::<LittleEndian>(self.max_end)
    }

    pub fn read_from(reader: &mut impl Read) -> io::Result<Self> {
        Ok(Self {
            min_start: reader.read_i32::<LittleEndian>()?,
            max_end: reader.read_i32::<LittleEndian>()?,
        })
    }
}

pub fn write_subheader(writer: &mut impl Write, header: &SublistHeader) -> io::Result<()> {
    writer.write_u64::<LittleEndian>(header.start as u64)?;
    writer.write_u64::<LittleEndian>(header.len as u64)
}

/// CRC-32 over the on-disk encoding of a sublist table.
pub fn subhead_checksum(subheaders: &[SublistHeader]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    let mut entry = [0u8; SUBHEAD_ENTRY_SIZE as usize];
    for header in subheaders {
        LittleEndian::write_u64(&mut entry[0..8], header.start as u64);
        LittleEndian::write_u64(&mut entry[8..16], header.len as u64);
        hasher.update(&entry);
    }
    hasher.finalize()
}

pub fn read_subheader(reader: &mut impl Read) -> Result<SublistHeader> {
    let start = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| truncated(e, "sublist table"))?;
    let len = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| truncated(e, "sublist table"))?;
    let start = usize::try_from(start)
        .map_err(|_| NclistError::format(format!("sublist offset {start} out of range")))?;
    let len = usize::try_from(len)
        .map_err(|_| NclistError::format(format!("sublist length {len} out of range")))?;
    Ok(SublistHeader::new(start, len))
}

/// Write one 24-byte record.
///
/// Fails with a format error when the sublist link does not fit the signed on-disk field.
pub fn write_record(writer: &mut impl Write, rec: &IntervalRecord) -> Result<()> {
    let sublist = match rec.sublist {
        Some(isub) => i32::try_from(isub).map_err(|_| {
            NclistError::format(format!("sublist link {isub} exceeds the on-disk limit"))
        })?,
        None => NO_SUBLIST,
    };
    writer.write_i32::<LittleEndian>(rec.start)?;
    writer.write_i32::<LittleEndian>(rec.end)?;
    writer.write_i32::<LittleEndian>(rec.target_id)?;
    writer.write_i32::<LittleEndian>(rec.target_start)?;
    writer.write_i32::<LittleEndian>(rec.target_end)?;
    writer.write_i32::<LittleEndian>(sublist)?;
    Ok(())
}

/// Decode one 24-byte record.
pub fn decode_record(buf: &[u8]) -> Result<IntervalRecord> {
    let sublist = match LittleEndian::read_i32(&buf[20..24]) {
        NO_SUBLIST => None,
        isub if isub >= 0 => Some(isub as u32),
        other => {
            return Err(NclistError::format(format!("invalid sublist link {other}")));
        }
    };

    Ok(IntervalRecord {
        start: LittleEndian::read_i32(&buf[0..4]),
        end: LittleEndian::read_i32(&buf[4..8]),
        target_id: LittleEndian::read_i32(&buf[8..12]),
        target_start: LittleEndian::read_i32(&buf[12..16]),
        target_end: LittleEndian::read_i32(&buf[16..20]),
        sublist,
    })
}
