use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

mod info;
mod verify;

fn init_logging(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;
    Ok(())
}

fn main() -> Result<()> {
    let matches = Command::new("prezr_dump")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Utility to inspect and verify packed bitmap resources")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("-v - info, -vv - debug, -vvv - trace."),
        )
        .subcommand(info::command())
        .subcommand(verify::command())
        .get_matches();

    init_logging(matches.get_count("verbose"))?;

    match matches.subcommand() {
        Some(("info", sub)) => info::run(sub),
        Some(("verify", sub)) => verify::run(sub),
        _ => unreachable!("subcommand_required"),
    }
}
