use clap::{Arg, ArgAction, Command, value_parser};

pub const QUERY_CMD: &str = "query";

pub fn create_query_cli() -> Command {
    Command::new(QUERY_CMD)
        .about("Print every record overlapping [start, end)")
        .arg_required_else_help(true)
        .arg(
            Arg::new("db")
                .long("db")
                .short('d')
                .required(true)
                .help("Database stem given to `build`"),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .short('s')
                .required(true)
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i32))
                .help("Query start (inclusive)"),
        )
        .arg(
            Arg::new("end")
                .long("end")
                .short('e')
                .required(true)
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i32))
                .help("Query end (exclusive)"),
        )
        .arg(
            Arg::new("batch")
                .long("batch")
                .value_parser(value_parser!(usize))
                .help("Records fetched per batch (overrides the config file)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Path to a TOML config file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print one JSON object per record instead of tab-separated text"),
        )
}
