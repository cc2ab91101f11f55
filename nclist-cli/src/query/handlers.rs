use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::debug;
use serde::Serialize;

use nclist_core::models::IntervalRecord;
use nclist_index::RecordSource;
use nclist_io::IntervalDbFile;

use crate::config::load_config;
use crate::targets::{TargetTable, targets_path};

/// One query hit as printed with `--json`.
#[derive(Serialize, Debug)]
struct Hit<'a> {
    #[serde(flatten)]
    record: &'a IntervalRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_length: Option<u64>,
}

///
/// Write one hit, as a tab-separated line or a JSON object.
///
/// The target column shows the target's name when a name table is available and its id
/// otherwise. JSON hits also carry the target's length when one was recorded at build
/// time.
///
pub fn write_hit<W: Write>(
    writer: &mut W,
    rec: &IntervalRecord,
    targets: Option<&TargetTable>,
    json: bool,
) -> Result<()> {
    let name = targets.and_then(|t| t.name(rec.target_id));

    if json {
        let hit = Hit {
            record: rec,
            target_name: name,
            target_length: targets.and_then(|t| t.length(rec.target_id)),
        };
        serde_json::to_writer(&mut *writer, &hit)?;
        writeln!(writer)?;
        return Ok(());
    }

    match name {
        Some(name) => writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            rec.start, rec.end, name, rec.target_start, rec.target_end
        )?,
        None => writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            rec.start, rec.end, rec.target_id, rec.target_start, rec.target_end
        )?,
    }
    Ok(())
}

pub fn run_query(matches: &ArgMatches) -> Result<()> {
    let db_stem = matches
        .get_one::<String>("db")
        .context("A database stem is required.")?;
    let start = *matches
        .get_one::<i32>("start")
        .context("A query start is required.")?;
    let end = *matches
        .get_one::<i32>("end")
        .context("A query end is required.")?;
    let json = matches.get_flag("json");

    let config = load_config(matches.get_one::<String>("config"))?
        .with_overrides(None, matches.get_one::<usize>("batch").copied())?;

    let stem = Path::new(db_stem);
    let db = IntervalDbFile::open(stem)
        .with_context(|| format!("Failed to open database {:?}", stem))?;

    let names = targets_path(stem);
    let targets = match names.exists() {
        true => Some(TargetTable::load(&names)?),
        false => None,
    };

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    let mut it = db.query_iter();
    let mut buf = vec![IntervalRecord::default(); config.query.batch_size];
    let mut total = 0usize;
    loop {
        let (count, more) = it.find(start, end, &mut buf)?;
        for rec in &buf[..count] {
            write_hit(&mut writer, rec, targets.as_ref(), json)?;
        }
        total += count;
        if !more {
            break;
        }
    }
    writer.flush()?;
    drop(it);

    debug!("{} records overlap [{}, {})", total, start, end);
    db.close();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn render(rec: &IntervalRecord, targets: Option<&TargetTable>, json: bool) -> String {
        let mut out = Vec::new();
        write_hit(&mut out, rec, targets, json).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[rstest]
    fn test_write_hit_text() {
        let mut targets = TargetTable::new();
        targets.id_for("chrX").unwrap();

        let rec = IntervalRecord::new(-8, -6, 0, 3000, 3002);
        assert_eq!(render(&rec, None, false), "-8\t-6\t0\t3000\t3002\n");
        assert_eq!(render(&rec, Some(&targets), false), "-8\t-6\tchrX\t3000\t3002\n");
    }

    #[rstest]
    fn test_write_hit_json() {
        let mut targets = TargetTable::new();
        targets.id_for("chrX").unwrap();

        let mut rec = IntervalRecord::new(1, 5, 0, 2000, 2004);
        rec.sublist = Some(3);

        let line = render(&rec, Some(&targets), true);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "start": 1,
                "end": 5,
                "target_id": 0,
                "target_start": 2000,
                "target_end": 2004,
                "target_name": "chrX",
            })
        );

        let line = render(&rec, None, true);
        assert_eq!(line.contains("target_name"), false);
        assert_eq!(line.contains("target_length"), false);
    }

    #[rstest]
    fn test_write_hit_json_with_length() {
        let mut targets = TargetTable::new();
        targets.id_for("chrX").unwrap();
        targets
            .apply_sizes(std::io::Cursor::new("chrX\t156040895\n"))
            .unwrap();

        let rec = IntervalRecord::new(1, 5, 0, 2000, 2004);
        let value: serde_json::Value =
            serde_json::from_str(&render(&rec, Some(&targets), true)).unwrap();
        assert_eq!(value["target_name"], "chrX");
        assert_eq!(value["target_length"], 156040895);

        // text output keeps its five columns
        assert_eq!(render(&rec, Some(&targets), false), "1\t5\tchrX\t2000\t2004\n");
    }
}
