use clap::{Arg, Command};

pub const INFO_CMD: &str = "info";

pub fn create_info_cli() -> Command {
    Command::new(INFO_CMD)
        .about("Print the header counts of a database as JSON")
        .arg_required_else_help(true)
        .arg(
            Arg::new("db")
                .long("db")
                .short('d')
                .required(true)
                .help("Database stem given to `build`"),
        )
}
