use clap::{Arg, ArgAction, Command, value_parser};

pub const BUILD_CMD: &str = "build";

pub fn create_build_cli() -> Command {
    Command::new(BUILD_CMD)
        .about("Build an interval database from tab-separated records")
        .arg_required_else_help(true)
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .required(true)
                .help("Records as `start end target target_start target_end` (.tsv, .tsv.gz, or - for stdin)"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .required(true)
                .help("Output stem; writes <stem>.idb, <stem>.subhead and <stem>.targets.json"),
        )
        .arg(
            Arg::new("div")
                .long("div")
                .value_parser(value_parser!(usize))
                .help("Records per on-disk block (overrides the config file)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Path to a TOML config file"),
        )
        .arg(
            Arg::new("raw")
                .long("raw")
                .action(ArgAction::SetTrue)
                .help("Read the input as a raw binary record dump instead of text"),
        )
        .arg(
            Arg::new("sizes")
                .long("sizes")
                .conflicts_with("raw")
                .help("Target lengths as `name<TAB>length` lines, stored with the target table"),
        )
}
