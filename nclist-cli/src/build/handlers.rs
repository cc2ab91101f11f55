use std::io::BufRead;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use nclist_core::errors::{NclistError, Result as NclistResult};
use nclist_core::models::IntervalRecord;
use nclist_core::utils::{get_dynamic_reader, get_dynamic_reader_w_stdin};
use nclist_index::IntervalDb;
use nclist_io::{read_records, write_binary};

use crate::config::load_config;
use crate::targets::{TargetTable, remove_stale_targets, targets_path};

const FIELDS: [&str; 5] = ["start", "end", "target", "target_start", "target_end"];

fn parse_field(value: &str, field: &str, lineno: usize) -> NclistResult<i32> {
    value.trim().parse::<i32>().map_err(|_| {
        NclistError::MalformedInput(format!("line {lineno}: invalid {field} {value:?}"))
    })
}

///
/// Read tab-separated records, resolving target names through `targets`.
///
/// Each data line is `start end target target_start target_end`. Blank lines and lines
/// starting with `#` are skipped. Columns past the fifth are ignored.
///
/// # Arguments
/// - reader: the text input
/// - targets: name table, extended with every new target seen
/// - progress: ticked as lines are read
///
pub fn parse_records<R: BufRead>(
    reader: R,
    targets: &mut TargetTable,
    progress: &ProgressBar,
) -> NclistResult<Vec<IntervalRecord>> {
    let mut records = Vec::new();
    let mut extra_columns = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = idx + 1;

        let trimmed = line.trim_end_matches('\r');
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() < FIELDS.len() {
            return Err(NclistError::MalformedInput(format!(
                "line {lineno}: expected {} tab-separated fields, found {}",
                FIELDS.len(),
                fields.len()
            )));
        }
        if fields.len() > FIELDS.len() {
            extra_columns += 1;
        }

        let start = parse_field(fields[0], FIELDS[0], lineno)?;
        let end = parse_field(fields[1], FIELDS[1], lineno)?;
        let target = fields[2].trim();
        if target.is_empty() {
            return Err(NclistError::MalformedInput(format!(
                "line {lineno}: empty target"
            )));
        }
        let target_id = targets.id_for(target)?;
        let target_start = parse_field(fields[3], FIELDS[3], lineno)?;
        let target_end = parse_field(fields[4], FIELDS[4], lineno)?;

        records.push(IntervalRecord::new(
            start,
            end,
            target_id,
            target_start,
            target_end,
        ));

        if records.len() % 10_000 == 0 {
            progress.set_position(records.len() as u64);
        }
    }

    if extra_columns > 0 {
        warn!(
            "{} lines had more than {} columns; the extra columns were ignored",
            extra_columns,
            FIELDS.len()
        );
    }
    progress.set_position(records.len() as u64);

    Ok(records)
}

pub fn run_build(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("input")
        .context("A path to an input file is required.")?;
    let output = matches
        .get_one::<String>("output")
        .context("An output stem is required.")?;

    let config = load_config(matches.get_one::<String>("config"))?
        .with_overrides(matches.get_one::<usize>("div").copied(), None)?;
    let raw = matches.get_flag("raw");
    let stem = Path::new(output);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg} ({pos} records)")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Reading {}", input));

    let mut targets = TargetTable::new();
    let records = if raw {
        read_records(input).with_context(|| format!("Failed to read record dump: {}", input))?
    } else {
        let reader = get_dynamic_reader_w_stdin(input)?;
        parse_records(reader, &mut targets, &pb)
            .with_context(|| format!("Failed to parse records from {}", input))?
    };
    pb.set_position(records.len() as u64);

    if let Some(sizes) = matches.get_one::<String>("sizes") {
        let reader = get_dynamic_reader(Path::new(sizes))?;
        let assigned = targets
            .apply_sizes(reader)
            .with_context(|| format!("Failed to read target sizes from {}", sizes))?;
        info!("{} of {} targets have a length", assigned, targets.len());
    }

    pb.set_message("Building index");
    let db = IntervalDb::build(records)?;

    pb.set_message(format!("Writing {:?}", stem));
    write_binary(&db, stem, config.build.block_size)
        .with_context(|| format!("Failed to write database {:?}", stem))?;
    // a table from an earlier build of this stem would mislabel raw records
    match targets.is_empty() {
        true => remove_stale_targets(stem)?,
        false => targets.save(&targets_path(stem))?,
    }

    pb.finish_with_message(format!("Wrote {:?}", stem));
    info!(
        "built {:?}: {} records, {} top-level, {} sublists, {} targets",
        stem,
        db.len(),
        db.ntop(),
        db.nlists(),
        targets.len()
    );

    Ok(())
}
