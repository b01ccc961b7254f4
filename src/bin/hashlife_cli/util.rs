use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use hashlife_universe::{Number, Pattern, Rule};
use num_format::{CustomFormat, Grouping, ToFormattedString};
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;

pub(super) fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(super) enum Source {
    /// Random soup of `width x height` cells
    Soup,
    /// A single glider heading south-east
    Glider,
}

/// Where the initial cells come from.
#[derive(Args, Debug)]
pub(super) struct PatternArgs {
    /// Kind of the initial pattern, default is a soup
    #[arg(long, value_enum, default_value_t = Source::Soup)]
    source: Source,

    /// Width of the soup
    #[arg(long, default_value_t = 256)]
    width: u32,

    /// Height of the soup
    #[arg(long, default_value_t = 256)]
    height: u32,

    /// Probability of a soup cell being alive
    #[arg(long, default_value_t = 0.5)]
    density: f64,

    /// Seed of the soup; random if omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Rule in B/S notation
    #[arg(short, long, default_value = "B3/S23")]
    rule: String,
}

impl PatternArgs {
    pub(super) fn build(&self) -> Result<Pattern> {
        let rule: Rule = self
            .rule
            .parse()
            .with_context(|| format!("bad rule {:?}", self.rule))?;
        let pattern = match self.source {
            Source::Soup => Pattern::random(self.width, self.height, self.density, self.seed),
            Source::Glider => Pattern::from_cells(&[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]),
        };
        Ok(pattern.with_rule(rule))
    }
}

pub(super) fn format_number(value: &Number) -> Result<String> {
    let fmt = CustomFormat::builder()
        .grouping(Grouping::Standard)
        .separator("_")
        .build()?;
    Ok(value.to_bigint().to_formatted_string(&fmt))
}

pub(super) fn print_stats(stats: &BTreeMap<&'static str, Number>) -> Result<()> {
    for (key, value) in stats {
        println!("{key:>10}: {}", format_number(value)?);
    }
    Ok(())
}
