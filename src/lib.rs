#![warn(clippy::all)]

mod bounds;
mod config;
mod error;
mod number;
mod pattern;
mod quadtree;
mod rule;

pub use num_bigint::BigInt;

pub use bounds::Bounds;
pub use config::UniverseConfig;
pub use error::{Error, Result};
pub use number::Number;
pub use pattern::Pattern;
pub use quadtree::{Node, NodeId, Universe, MIN_ROOT_LEVEL};
pub use rule::{Rule, B3S23};

pub const VERSION: &str = "0.1.0";
