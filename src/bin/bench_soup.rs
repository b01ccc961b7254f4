use anyhow::Result;
use hashlife_universe::{Pattern, Universe, UniverseConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SEED: u64 = 42;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let pattern = Pattern::random(512, 512, 0.5, Some(SEED));
    for workers in [0, 4] {
        for step in [4, 8, 12] {
            let config = UniverseConfig::from_mem_limit_mib(2 << 10).with_workers(workers);
            let mut universe = Universe::with_config(config)?;
            universe.load_pattern(&pattern)?;
            universe.set_step(step);

            let timer = std::time::Instant::now();
            for _ in 0..4 {
                universe.advance()?;
            }
            let elapsed = timer.elapsed();
            info!(workers, step, nodes = universe.node_count(), "finished");
            println!(
                "workers={} step={} generation={} population={} time={}",
                workers,
                step,
                universe.generation(),
                universe.population(),
                elapsed.as_secs_f64()
            );
        }
    }
    Ok(())
}
