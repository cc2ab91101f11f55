use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::Serialize;

use nclist_io::IntervalDbFile;

use crate::targets::{TargetTable, targets_path};

/// Summary of an open database.
#[derive(Serialize, Debug, PartialEq)]
pub struct DbInfo {
    pub path: String,
    pub version: u32,
    pub block_size: usize,
    pub records: usize,
    pub top_level: usize,
    pub sublists: usize,
    pub blocks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<usize>,
}

impl DbInfo {
    pub fn from_db(db: &IntervalDbFile, targets: Option<&TargetTable>) -> Self {
        Self {
            path: db.path().display().to_string(),
            version: db.header().version,
            block_size: db.div(),
            records: db.len(),
            top_level: db.ntop(),
            sublists: db.nlists(),
            blocks: db.nblocks(),
            targets: targets.map(TargetTable::len),
        }
    }
}

pub fn run_info(matches: &ArgMatches) -> Result<()> {
    let db_stem = matches
        .get_one::<String>("db")
        .context("A database stem is required.")?;

    let stem = Path::new(db_stem);
    let db = IntervalDbFile::open(stem)
        .with_context(|| format!("Failed to open database {:?}", stem))?;

    let names = targets_path(stem);
    let targets = match names.exists() {
        true => Some(TargetTable::load(&names)?),
        false => None,
    };

    let info = DbInfo::from_db(&db, targets.as_ref());
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &info)?;
    writeln!(stdout)?;

    db.close();
    Ok(())
}
