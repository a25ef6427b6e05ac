use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use broadcastfx::cli::{self, CliArgs};
use broadcastfx::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    logger::init(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    log::info!("BroadcastFX {} starting", broadcastfx::version::CURRENT);
    if args.verbose
        && let Some(path) = logger::log_path()
    {
        println!("log: {}", path.display());
    }

    cli::run(args)
}
