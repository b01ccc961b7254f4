use crate::util::{print_stats, PatternArgs};
use anyhow::{Context, Result};
use clap::Args;
use hashlife_universe::{Error, Universe, UniverseConfig};

#[derive(Args, Debug)]
pub(super) struct RunArgs {
    #[command(flatten)]
    pattern: PatternArgs,

    /// Each advance moves the pattern by 2^step generations
    #[arg(short, long, default_value_t = 10)]
    step: u32,

    /// How many advances to run
    #[arg(short, long, default_value_t = 1)]
    advances: u32,

    /// Maximum memory (in MiB) allocated to the node table
    #[arg(short, long, default_value_t = 1024)]
    mem_limit_mib: u32,

    /// The number of worker threads; 0 runs everything on the main thread
    #[arg(short, long, default_value_t = 0)]
    workers: usize,
}

pub(super) fn run_run(args: RunArgs) -> Result<()> {
    let config = UniverseConfig::from_mem_limit_mib(args.mem_limit_mib).with_workers(args.workers);
    let mut universe = Universe::with_config(config).context("failed to create universe")?;

    let timer = std::time::Instant::now();
    let pattern = args.pattern.build()?;
    universe.load_pattern(&pattern)?;
    println!(
        "Loaded {} cells in {:.3} secs",
        pattern.population(),
        timer.elapsed().as_secs_f64()
    );

    let timer = std::time::Instant::now();
    let mut step = args.step;
    universe.set_step(step);
    let mut done = 0;
    while done < args.advances {
        match universe.advance() {
            Ok(()) => {
                done += 1;
                println!("Generation {}", universe.generation());
            }
            Err(Error::TableFull { .. }) if step >= 2 => {
                // smaller steps touch fewer distinct nodes
                step -= 2;
                println!("Overfilled node table, reducing step to {step}");
                universe.set_step(step);
            }
            Err(e) => return Err(e).context("advance failed"),
        }
    }
    println!(
        "Ran {} advances in {:.3} secs",
        done,
        timer.elapsed().as_secs_f64()
    );
    print_stats(&universe.stats())
}
