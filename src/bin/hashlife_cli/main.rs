mod run;
mod stats;
mod util;

use clap::{Parser, Subcommand};
use run::{run_run, RunArgs};
use stats::{run_stats, StatsArgs};

#[derive(Parser, Debug)]
#[command(version, about)]
struct CLIParser {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Advance a pattern by a number of steps of 2^step generations each
    Run(RunArgs),
    /// Load a pattern and print its population and bounding box
    Stats(StatsArgs),
}

fn main() -> anyhow::Result<()> {
    util::init_tracing();
    let args = CLIParser::parse();

    match args.action {
        Action::Run(args) => run_run(args),
        Action::Stats(args) => run_stats(args),
    }
}
