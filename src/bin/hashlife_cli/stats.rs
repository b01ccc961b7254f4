use crate::util::{format_number, print_stats, PatternArgs};
use anyhow::Result;
use clap::Args;
use hashlife_universe::Universe;

#[derive(Args, Debug)]
pub(super) struct StatsArgs {
    #[command(flatten)]
    pattern: PatternArgs,
}

pub(super) fn run_stats(args: StatsArgs) -> Result<()> {
    let pattern = args.pattern.build()?;
    let mut universe = Universe::new();
    universe.load_pattern(&pattern)?;

    print_stats(&universe.stats())?;
    let bounds = universe.root_bounds();
    println!(
        "    bounds: x {}..={}, y {}..={}",
        format_number(&bounds.left)?,
        format_number(&bounds.right)?,
        format_number(&bounds.top)?,
        format_number(&bounds.bottom)?
    );
    println!("     nodes: {}", universe.node_count());
    Ok(())
}
