use crate::quadtree::Node;

/// Sizing and scheduling knobs of a [`Universe`](crate::Universe).
///
/// The defaults suit interactive use: a small table that doubles on demand,
/// a single thread.
#[derive(Clone, Debug, PartialEq)]
pub struct UniverseConfig {
    /// The node table starts with `2^initial_capacity_log2` buckets.
    pub initial_capacity_log2: u32,
    /// The node table never grows beyond `2^max_capacity_log2` buckets.
    pub max_capacity_log2: u32,
    /// Garbage collection is requested once the number of nodes exceeds
    /// `buckets * load_factor`.
    pub load_factor: f64,
    /// Largest quadtree level the universe may expand to.
    pub max_level: u32,
    /// Number of tokio worker threads used by `advance`; 0 keeps everything
    /// on the calling thread.
    pub workers: usize,
    /// Nodes with fewer live cells are advanced inline instead of spawning tasks.
    pub spawn_population_threshold: u64,
    /// Nodes below this level are advanced inline instead of spawning tasks.
    pub min_spawn_level: u32,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            initial_capacity_log2: 16,
            max_capacity_log2: 22,
            load_factor: 0.95,
            max_level: 2048,
            workers: 0,
            spawn_population_threshold: 4096,
            min_spawn_level: 12,
        }
    }
}

impl UniverseConfig {
    /// Hashtables bigger than 2^30 buckets are not supported.
    pub const CAPACITY_LOG2_LIMIT: u32 = 30;

    /// Picks the largest table that fits into `mem_limit_mib`.
    ///
    /// Note that this is not a hard limit: big-integer populations of huge
    /// nodes and the relocation map of the garbage collector are not counted.
    pub fn from_mem_limit_mib(mem_limit_mib: u32) -> Self {
        let slot_bytes = std::mem::size_of::<Node>() as u64 * 2 + 4;
        let nodes = ((mem_limit_mib as u64) << 20) / slot_bytes;
        // previous power of two
        let max_capacity_log2 = nodes.max(2).ilog2().min(Self::CAPACITY_LOG2_LIMIT);
        let defaults = Self::default();
        Self {
            initial_capacity_log2: defaults.initial_capacity_log2.min(max_capacity_log2),
            max_capacity_log2,
            ..defaults
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_capacity_log2(mut self, initial: u32, max: u32) -> Self {
        self.initial_capacity_log2 = initial;
        self.max_capacity_log2 = max;
        self
    }

    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn with_spawn_threshold(mut self, population: u64, min_level: u32) -> Self {
        self.spawn_population_threshold = population;
        self.min_spawn_level = min_level;
        self
    }

    /// Clamps inconsistent values instead of failing later inside the store.
    pub(crate) fn normalized(mut self) -> Self {
        self.max_capacity_log2 = self.max_capacity_log2.clamp(4, Self::CAPACITY_LOG2_LIMIT);
        self.initial_capacity_log2 = self
            .initial_capacity_log2
            .clamp(4, self.max_capacity_log2);
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            self.load_factor = Self::default().load_factor;
        }
        self.max_level = self.max_level.max(4);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_limit() {
        let small = UniverseConfig::from_mem_limit_mib(1);
        let large = UniverseConfig::from_mem_limit_mib(1024);
        assert!(small.max_capacity_log2 < large.max_capacity_log2);
        assert!(small.initial_capacity_log2 <= small.max_capacity_log2);
        assert!(large.max_capacity_log2 <= UniverseConfig::CAPACITY_LOG2_LIMIT);
    }

    #[test]
    fn test_normalized() {
        let config = UniverseConfig {
            initial_capacity_log2: 40,
            max_capacity_log2: 2,
            load_factor: 7.0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.max_capacity_log2, 4);
        assert_eq!(config.initial_capacity_log2, 4);
        assert_eq!(config.load_factor, 0.95);
    }
}
