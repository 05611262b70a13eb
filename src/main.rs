use std::process::ExitCode;

use clap::Parser;
use maplegend::{cli, logger};

fn main() -> ExitCode {
    logger::init();
    let args = cli::CliArgs::parse();
    cli::run(args)
}
