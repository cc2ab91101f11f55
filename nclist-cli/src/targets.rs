use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use fxhash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};

use nclist_core::errors::{NclistError, Result as NclistResult};
use nclist_core::utils::with_suffix;

pub const TARGETS_SUFFIX: &str = "targets.json";

/// Path of the target name table for a database stem.
pub fn targets_path<P: AsRef<Path>>(stem: P) -> PathBuf {
    with_suffix(stem, TARGETS_SUFFIX)
}

/// Remove a target table left behind by an earlier build of `stem`.
pub fn remove_stale_targets<P: AsRef<Path>>(stem: P) -> Result<()> {
    let path = targets_path(stem);
    if path.exists() {
        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove stale target table: {:?}", path))?;
        info!("removed stale target table {:?}", path);
    }
    Ok(())
}

///
/// Maps target names from text input to the integer ids stored in records.
///
/// Ids are handed out in order of first appearance, starting at 0. Lengths are optional:
/// the record input does not carry them, so they come from a separate sizes file.
///
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TargetTable {
    names: Vec<String>,
    #[serde(default)]
    lengths: Vec<Option<u64>>,
    #[serde(skip)]
    ids: HashMap<String, i32>,
}

impl TargetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id for `name`, assigning the next free one on first sight.
    pub fn id_for(&mut self, name: &str) -> Result<i32, NclistError> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        let id = i32::try_from(self.names.len())
            .map_err(|_| NclistError::MalformedInput("too many distinct targets".to_string()))?;
        self.names.push(name.to_string());
        self.lengths.push(None);
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn name(&self, id: i32) -> Option<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.names.get(idx))
            .map(String::as_str)
    }

    /// The target's length, if a sizes file supplied one.
    pub fn length(&self, id: i32) -> Option<u64> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.lengths.get(idx).copied())
            .flatten()
    }

    ///
    /// Attach lengths from `name<TAB>length` lines, the layout of a `chrom.sizes` file.
    ///
    /// Blank lines and `#` comments are skipped. Names that no record refers to are
    /// counted and otherwise ignored, so one sizes file can serve many databases.
    ///
    /// Returns the number of targets that received a length.
    ///
    pub fn apply_sizes<R: BufRead>(&mut self, reader: R) -> NclistResult<usize> {
        let mut assigned = 0usize;
        let mut unknown = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = idx + 1;
            let trimmed = line.trim_end_matches('\r');
            if trimmed.trim().is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = trimmed.split('\t');
            let name = fields.next().map(str::trim).unwrap_or_default();
            let size = fields.next().map(str::trim).ok_or_else(|| {
                NclistError::MalformedInput(format!("sizes line {lineno}: missing length"))
            })?;
            let size = size.parse::<u64>().map_err(|_| {
                NclistError::MalformedInput(format!("sizes line {lineno}: invalid length {size:?}"))
            })?;

            match self.ids.get(name) {
                Some(&id) => {
                    self.lengths[id as usize] = Some(size);
                    assigned += 1;
                }
                None => unknown += 1,
            }
        }

        if unknown > 0 {
            warn!("{} sizes entries name targets with no records", unknown);
        }
        Ok(assigned)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Write the table next to its database, replacing any earlier one in one rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = with_suffix(path, "tmp");
        let written = self.write_json(&tmp).and_then(|()| {
            fs::rename(&tmp, path)
                .with_context(|| format!("Failed to replace target table: {:?}", path))
        });
        if written.is_err() && tmp.exists() {
            if let Err(e) = fs::remove_file(&tmp) {
                warn!("could not remove {:?}: {}", tmp, e);
            }
        }
        written
    }

    fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create target table: {:?}", path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| e.into_error())?
            .sync_all()
            .with_context(|| format!("Failed to sync target table: {:?}", path))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open target table: {:?}", path))?;
        let mut table: TargetTable = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse target table: {:?}", path))?;
        // tables written without lengths
        table.lengths.resize(table.names.len(), None);
        table.ids = table
            .names
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id as i32))
            .collect();
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn test_ids_in_order_of_appearance() {
        let mut table = TargetTable::new();
        assert_eq!(table.id_for("chr2").unwrap(), 0);
        assert_eq!(table.id_for("chr1").unwrap(), 1);
        assert_eq!(table.id_for("chr2").unwrap(), 0);
        assert_eq!(table.len(), 2);
        assert_eq!(table.name(1), Some("chr1"));
        assert_eq!(table.name(2), None);
        assert_eq!(table.name(-1), None);
    }

    #[rstest]
    fn test_save_and_load() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = targets_path(tempdir.path().join("db"));
        assert_eq!(path.file_name().unwrap(), "db.targets.json");

        let mut table = TargetTable::new();
        table.id_for("contig_a").unwrap();
        table.id_for("contig_b").unwrap();
        table.save(&path).unwrap();

        let mut loaded = TargetTable::load(&path).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.id_for("contig_b").unwrap(), 1);
        assert_eq!(loaded.id_for("contig_c").unwrap(), 2);
        assert_eq!(tempdir.path().join("db.targets.json.tmp").exists(), false);
    }

    #[rstest]
    fn test_save_replaces_existing_table() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = targets_path(tempdir.path().join("db"));

        let mut first = TargetTable::new();
        for name in ["a", "b", "c", "d"] {
            first.id_for(name).unwrap();
        }
        first.save(&path).unwrap();

        let mut second = TargetTable::new();
        second.id_for("z").unwrap();
        second.save(&path).unwrap();

        assert_eq!(TargetTable::load(&path).unwrap(), second);
    }

    #[rstest]
    fn test_remove_stale_targets() {
        let tempdir = tempfile::tempdir().unwrap();
        let stem = tempdir.path().join("db");

        // nothing to remove is fine
        remove_stale_targets(&stem).unwrap();

        let mut table = TargetTable::new();
        table.id_for("a").unwrap();
        table.save(&targets_path(&stem)).unwrap();
        remove_stale_targets(&stem).unwrap();
        assert_eq!(targets_path(&stem).exists(), false);
    }

    #[rstest]
    fn test_apply_sizes() {
        let mut table = TargetTable::new();
        table.id_for("chr2").unwrap();
        table.id_for("chr1").unwrap();
        table.id_for("chrM").unwrap();

        let sizes = "# name\tlength\nchr1\t248956422\n\nchr2\t242193529\r\nchrY\t57227415\n";
        let assigned = table.apply_sizes(std::io::Cursor::new(sizes)).unwrap();
        assert_eq!(assigned, 2);
        assert_eq!(table.length(0), Some(242193529));
        assert_eq!(table.length(1), Some(248956422));
        assert_eq!(table.length(2), None);
        assert_eq!(table.length(7), None);
    }

    #[rstest]
    #[case("chr1\n", "sizes line 1: missing length")]
    #[case("chr1\t10\nchr2\tlong\n", "sizes line 2: invalid length")]
    fn test_apply_sizes_malformed(#[case] sizes: &str, #[case] message: &str) {
        let mut table = TargetTable::new();
        table.id_for("chr1").unwrap();
        let err = table.apply_sizes(std::io::Cursor::new(sizes)).unwrap_err();
        assert!(matches!(err, NclistError::MalformedInput(_)));
        assert!(err.to_string().contains(message), "{}", err);
    }

    #[rstest]
    fn test_load_table_without_lengths() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("old.targets.json");
        std::fs::write(&path, r#"{ "names": ["a", "b"] }"#).unwrap();

        let table = TargetTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.name(1), Some("b"));
        assert_eq!(table.length(1), None);
    }
}
