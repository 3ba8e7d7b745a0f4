use std::process::ExitCode;

use clap::Parser;

use fluidcanvas::cli::{self, CliArgs};
use fluidcanvas::logger;

fn main() -> ExitCode {
    logger::init();
    let args = CliArgs::parse();
    cli::run(args)
}
