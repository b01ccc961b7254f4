use thiserror::Error;

/// Recoverable failures of the universe.
///
/// Broken preconditions (children of different levels, advancing a node that
/// is too small) are defects of the caller and panic instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("coordinate lists differ in length: {x} x-values, {y} y-values")]
    CoordinateLengthMismatch { x: usize, y: usize },

    #[error("invalid rule {0:?}")]
    InvalidRule(String),

    #[error("node table is full at 2^{capacity_log2} buckets, try a smaller step")]
    TableFull { capacity_log2: u32 },

    #[error("universe would grow to level {level}, the limit is {max_level}")]
    LevelOverflow { level: u32, max_level: u32 },

    #[error("world coordinates do not fit into a machine integer")]
    CoordinateOutOfRange,

    #[error("failed to start worker threads: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
