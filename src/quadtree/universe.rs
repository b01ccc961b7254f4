use super::{BlankNodes, Node, NodeId, NodeStore, Relocator, Stepper, MIN_ROOT_LEVEL};
use crate::{Bounds, Error, Number, Pattern, Result, Rule, UniverseConfig};
use ahash::AHashMap as HashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const MASK_TOP: u8 = 1;
const MASK_LEFT: u8 = 2;
const MASK_BOTTOM: u8 = 4;
const MASK_RIGHT: u8 = 8;
const MASK_ALL: u8 = MASK_TOP | MASK_LEFT | MASK_BOTTOM | MASK_RIGHT;

/// An infinite plane of cells evolving under a life-like rule, stored as a
/// canonical quadtree.
///
/// The root of level `L` covers `[-2^(L-1), 2^(L-1))` on both axes, `y`
/// growing downward. Every operation that builds nodes either completes or
/// leaves the universe as it was.
pub struct Universe {
    config: UniverseConfig,
    store: Arc<NodeStore>,
    root: NodeId,
    generation: Number,
    /// `advance` moves by `2^step` generations
    step: u32,
    rule: Rule,
    /// stamp of the memoized results that are still valid
    version: u32,
    blank_nodes: BlankNodes,
    level1: [NodeId; 16],
    /// level-2 nodes by their 16-bit cell set, filled by `new_life`
    level2: HashMap<u16, NodeId>,
    rewind: Option<(NodeId, Number)>,
    runtime: Option<tokio::runtime::Runtime>,
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl Universe {
    /// Empty single-threaded universe with the default configuration.
    pub fn new() -> Self {
        Self::build(UniverseConfig::default().normalized(), None)
    }

    /// Empty universe; starts the worker threads if `config.workers > 0`.
    pub fn with_config(config: UniverseConfig) -> Result<Self> {
        let config = config.normalized();
        let runtime = if config.workers > 0 {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(config.workers)
                .thread_name("hashlife-worker")
                .build()
                .map_err(|e| Error::Runtime(e.to_string()))?;
            Some(runtime)
        } else {
            None
        };
        Ok(Self::build(config, runtime))
    }

    fn build(config: UniverseConfig, runtime: Option<tokio::runtime::Runtime>) -> Self {
        let store = NodeStore::with_capacity(config.initial_capacity_log2, config.load_factor);
        let level1 = store.level1_table();
        let mut blank_nodes = BlankNodes::new();
        let root = blank_nodes.get(MIN_ROOT_LEVEL, &store);
        Self {
            config,
            store: Arc::new(store),
            root,
            generation: Number::ZERO,
            step: 0,
            rule: Rule::default(),
            version: 1,
            blank_nodes,
            level1,
            level2: HashMap::new(),
            rewind: None,
            runtime,
        }
    }

    pub fn config(&self) -> &UniverseConfig {
        &self.config
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a reference to the node with the given id.
    ///
    /// # Panics
    /// Panics if `id` is not a node of this universe; ids are invalidated by
    /// garbage collection.
    pub fn node(&self, id: NodeId) -> &Node {
        self.store.get(id)
    }

    pub fn level(&self) -> u32 {
        self.store.get(self.root).level
    }

    pub fn population(&self) -> Number {
        self.store.get(self.root).population.clone()
    }

    pub fn generation(&self) -> &Number {
        &self.generation
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    /// Makes every following `advance` move by `2^step` generations.
    pub fn set_step(&mut self, step: u32) {
        if step != self.step {
            self.step = step;
            self.bump_version();
        }
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn set_rule(&mut self, rule: Rule) {
        if rule != self.rule {
            self.rule = rule;
            self.bump_version();
        }
    }

    /// Number of nodes in the table, garbage included.
    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    pub fn capacity_log2(&self) -> u32 {
        self.store.capacity_log2()
    }

    pub fn bytes_total(&self) -> usize {
        self.store.bytes_total()
    }

    /// Invalidates every memoized result at once.
    fn bump_version(&mut self) {
        match self.version.checked_add(1) {
            Some(version) => self.version = version,
            None => {
                // old stamps could come back to life, so forget them all
                self.version = 1;
                self.collect_garbage(false, false);
            }
        }
    }

    /// Runs `op` until it completes on an unpoisoned store.
    ///
    /// A poisoned attempt is thrown away, the table is rebuilt bigger and `op`
    /// runs again. At the size limit `op` gets one more attempt on a table
    /// without memoized results before giving up.
    fn with_retry<T>(&mut self, mut op: impl FnMut(&mut Self) -> Result<T>) -> Result<T> {
        if self.store.gc_requested() {
            self.collect_garbage(true, true);
        }
        let mut last_attempt = false;
        loop {
            let result = op(self);
            if !self.store.poisoned() {
                return result;
            }
            let capacity_log2 = self.store.capacity_log2();
            self.collect_garbage(true, false);
            if last_attempt {
                return Err(Error::TableFull { capacity_log2 });
            }
            last_attempt = capacity_log2 >= self.config.max_capacity_log2;
        }
    }

    /// Moves the live nodes into a new table, optionally twice as big.
    ///
    /// Memoized results are carried over only if `warm` is set and the old
    /// table is neither poisoned nor already at its size limit.
    fn collect_garbage(&mut self, grow: bool, warm: bool) {
        let timer = Instant::now();
        let old = Arc::clone(&self.store);
        let max_capacity_log2 = self.config.max_capacity_log2;
        let keep_caches = warm && !old.poisoned() && old.capacity_log2() < max_capacity_log2;
        let capacity_log2 = if grow {
            (old.capacity_log2() + 1).min(max_capacity_log2)
        } else {
            old.capacity_log2()
        };

        let new = NodeStore::with_capacity(capacity_log2, self.config.load_factor);
        let level1 = new.level1_table();
        let mut relocator = Relocator::new(&old, &new, keep_caches);
        let root = relocator.relocate(self.root);
        let rewind = self
            .rewind
            .take()
            .map(|(root, generation)| (relocator.relocate(root), generation));
        let relocated = relocator.relocated();

        if new.gc_requested() && capacity_log2 >= max_capacity_log2 {
            // nowhere to grow, asking again at every safe point is pointless
            new.clear_gc_request();
        }
        self.store = Arc::new(new);
        self.root = root;
        self.rewind = rewind;
        self.level1 = level1;
        self.blank_nodes.clear();
        self.level2.clear();

        if keep_caches {
            debug!(
                from = old.capacity_log2(),
                to = capacity_log2,
                nodes_before = old.len(),
                nodes_after = relocated,
                elapsed = ?timer.elapsed(),
                "garbage collection"
            );
        } else {
            warn!(
                from = old.capacity_log2(),
                to = capacity_log2,
                nodes_before = old.len(),
                nodes_after = relocated,
                poisoned = old.poisoned(),
                elapsed = ?timer.elapsed(),
                "garbage collection dropped all memoized results"
            );
        }
    }

    /// Compacts the node table, keeping memoized results when possible.
    ///
    /// Node ids obtained before the call are no longer valid.
    pub fn run_gc(&mut self) {
        self.collect_garbage(false, true);
    }

    /// Doubles the side of `id` keeping its content in the centre.
    fn expand(&mut self, id: NodeId) -> Result<NodeId> {
        let store = &*self.store;
        let n = store.get(id);
        if n.level >= self.config.max_level {
            return Err(Error::LevelOverflow {
                level: n.level + 1,
                max_level: self.config.max_level,
            });
        }
        let b = self.blank_nodes.get(n.level - 1, store);
        let expanded = store.canonicalize(
            store.canonicalize(b, b, b, n.nw),
            store.canonicalize(b, b, n.ne, b),
            store.canonicalize(b, n.sw, b, b),
            store.canonicalize(n.se, b, b, b),
        );
        debug!(level = n.level + 1, "expanded universe");
        Ok(expanded)
    }

    /// Whether `id` is too small to be advanced by `2^step` generations
    /// without losing cells that leave its centre.
    fn needs_expansion(&self, id: NodeId) -> bool {
        let store = &*self.store;
        let n = store.get(id);
        if n.level < self.step.saturating_add(3) {
            return true;
        }
        let [nw, ne, sw, se] = n.parts().map(|x| store.get(x));
        let inner = |q: NodeId, corner: fn(&Node) -> NodeId| {
            let q = store.get(q);
            &store.get(corner(store.get(corner(q)))).population
        };
        nw.population != *inner(n.nw, Node::se)
            || ne.population != *inner(n.ne, Node::sw)
            || sw.population != *inner(n.sw, Node::ne)
            || se.population != *inner(n.se, Node::nw)
    }

    fn stepper(&self) -> Stepper {
        Stepper {
            store: Arc::clone(&self.store),
            rule: self.rule,
            level1: self.level1,
            step: self.step,
            version: self.version,
            spawn_population: Number::from(self.config.spawn_population_threshold),
            min_spawn_level: self.config.min_spawn_level,
        }
    }

    /// Advances the universe by `2^step` generations.
    ///
    /// On error the universe is left unchanged. With worker threads this
    /// must not be called from inside an async runtime.
    pub fn advance(&mut self) -> Result<()> {
        let timer = Instant::now();
        let max_level = self.config.max_level;
        match self.step.checked_add(3) {
            Some(level) if level <= max_level => {}
            level => {
                return Err(Error::LevelOverflow {
                    level: level.unwrap_or(u32::MAX),
                    max_level,
                })
            }
        }
        let root = self.with_retry(|u| {
            let mut root = u.root;
            while !u.store.poisoned() && u.needs_expansion(root) {
                root = u.expand(root)?;
            }
            if u.store.poisoned() {
                return Ok(NodeId::DEAD);
            }
            let stepper = u.stepper();
            Ok(match &u.runtime {
                Some(runtime) => runtime.block_on(Stepper::advance_task(Arc::new(stepper), root)),
                None => stepper.advance(root),
            })
        })?;
        self.root = root;
        self.generation = &self.generation + &Number::pow2(self.step);
        debug!(
            generation = %self.generation,
            level = self.level(),
            population = %self.population(),
            elapsed = ?timer.elapsed(),
            "advanced"
        );
        Ok(())
    }

    /// Replaces the content of the universe with the given live cells and
    /// resets the generation counter.
    pub fn new_life(&mut self, field_x: &[i32], field_y: &[i32]) -> Result<()> {
        if field_x.len() != field_y.len() {
            return Err(Error::CoordinateLengthMismatch {
                x: field_x.len(),
                y: field_y.len(),
            });
        }
        let level = Bounds::from_cells(field_x, field_y)
            .map_or(MIN_ROOT_LEVEL, |b| b.level().max(MIN_ROOT_LEVEL));
        let offset = 1i64 << (level - 1);

        let root = self.with_retry(|u| {
            let mut xs: Vec<u64> = field_x.iter().map(|&x| (x as i64 + offset) as u64).collect();
            let mut ys: Vec<u64> = field_y.iter().map(|&y| (y as i64 + offset) as u64).collect();
            let mut builder = FieldBuilder {
                store: &u.store,
                blank_nodes: &mut u.blank_nodes,
                level1: &u.level1,
                level2: &mut u.level2,
            };
            Ok(builder.build(&mut xs, &mut ys, level))
        })?;
        self.root = root;
        self.generation = Number::ZERO;
        self.rewind = None;
        debug!(
            cells = field_x.len(),
            level,
            population = %self.population(),
            "loaded field"
        );
        Ok(())
    }

    /// Loads the cells of `pattern` and switches to its rule.
    pub fn load_pattern(&mut self, pattern: &Pattern) -> Result<()> {
        self.new_life(&pattern.field_x, &pattern.field_y)?;
        self.set_rule(pattern.rule);
        Ok(())
    }

    /// Removes every cell; rule and step are kept.
    pub fn clear(&mut self) -> Result<()> {
        self.new_life(&[], &[])
    }

    fn root_contains(&self, root: NodeId, x: &Number, y: &Number) -> bool {
        let half = Number::pow2(self.store.get(root).level - 1);
        let min = -&half;
        &min <= x && x < &half && &min <= y && y < &half
    }

    pub fn set_cell(&mut self, x: i64, y: i64, alive: bool) -> Result<()> {
        let (x, y) = (Number::from(x), Number::from(y));
        let root = self.with_retry(|u| {
            let mut root = u.root;
            while !u.store.poisoned() && !u.root_contains(root, &x, &y) {
                root = u.expand(root)?;
            }
            let half = Number::pow2(u.store.get(root).level.max(1) - 1);
            Ok(u.set_cell_recursive(root, &x + &half, &y + &half, alive))
        })?;
        self.root = root;
        Ok(())
    }

    /// `x` and `y` are relative to the top-left corner of `id`.
    fn set_cell_recursive(&self, id: NodeId, x: Number, y: Number, alive: bool) -> NodeId {
        let n = self.store.get(id);
        if n.level == 0 {
            return NodeId::leaf(alive);
        }
        let half = Number::pow2(n.level - 1);
        let (east, x) = if x >= half { (true, &x - &half) } else { (false, x) };
        let (south, y) = if y >= half { (true, &y - &half) } else { (false, y) };
        let mut parts = n.parts();
        let i = usize::from(east) | usize::from(south) << 1;
        parts[i] = self.set_cell_recursive(parts[i], x, y, alive);
        self.store.canonicalize(parts[0], parts[1], parts[2], parts[3])
    }

    pub fn get_cell(&self, x: i64, y: i64) -> bool {
        let (x, y) = (Number::from(x), Number::from(y));
        if !self.root_contains(self.root, &x, &y) {
            return false;
        }
        let half = Number::pow2(self.level() - 1);
        let (mut x, mut y) = (&x + &half, &y + &half);
        let mut id = self.root;
        loop {
            let n = self.store.get(id);
            if n.population.is_zero() {
                return false;
            }
            if n.level == 0 {
                return true;
            }
            let half = Number::pow2(n.level - 1);
            let mut i = 0;
            if x >= half {
                x = &x - &half;
                i |= 1;
            }
            if y >= half {
                y = &y - &half;
                i |= 2;
            }
            id = n.parts()[i];
        }
    }

    /// Coordinates of every live cell, sorted by `y` and then `x`.
    pub fn live_cells(&self) -> Result<Vec<(i64, i64)>> {
        let half = Number::pow2(self.level() - 1);
        let origin = -&half;
        let mut cells = vec![];
        self.collect_cells(self.root, &origin, &origin, &mut cells)?;
        cells.sort_unstable_by_key(|&(x, y)| (y, x));
        Ok(cells)
    }

    fn collect_cells(
        &self,
        id: NodeId,
        left: &Number,
        top: &Number,
        cells: &mut Vec<(i64, i64)>,
    ) -> Result<()> {
        let n = self.store.get(id);
        if n.population.is_zero() {
            return Ok(());
        }
        if n.level == 0 {
            let x = left.to_i64().ok_or(Error::CoordinateOutOfRange)?;
            let y = top.to_i64().ok_or(Error::CoordinateOutOfRange)?;
            cells.push((x, y));
            return Ok(());
        }
        let half = Number::pow2(n.level - 1);
        let (right, bottom) = (left + &half, top + &half);
        self.collect_cells(n.nw, left, top, cells)?;
        self.collect_cells(n.ne, &right, top, cells)?;
        self.collect_cells(n.sw, left, &bottom, cells)?;
        self.collect_cells(n.se, &right, &bottom, cells)
    }

    /// Tight bounding box of the live cells; all zeros if there are none.
    pub fn root_bounds(&self) -> Bounds {
        let n = self.store.get(self.root);
        let Some(b) = n.bounds() else {
            return Bounds::default();
        };
        let origin = -Number::pow2(n.level - 1);
        let bounds = Bounds::new(
            &b.top + &origin,
            &b.left + &origin,
            &b.bottom + &origin,
            &b.right + &origin,
        );
        debug_assert_eq!(bounds, self.scan_bounds());
        bounds
    }

    /// Same as [`Self::root_bounds`], found by walking the tree instead of
    /// reading the box cached in the root.
    fn scan_bounds(&self) -> Bounds {
        let n = self.store.get(self.root);
        if n.population.is_zero() {
            return Bounds::default();
        }
        let origin = -Number::pow2(n.level - 1);
        let mut found = None;
        self.node_bounds(self.root, &origin, &origin, MASK_ALL, &mut found);
        found.unwrap_or_default()
    }

    /// Extends `found` by the cells of `id` that may still move a side in `mask`.
    fn node_bounds(
        &self,
        id: NodeId,
        left: &Number,
        top: &Number,
        mask: u8,
        found: &mut Option<Bounds>,
    ) {
        let n = self.store.get(id);
        if mask == 0 || n.population.is_zero() {
            return;
        }
        if n.level == 0 {
            let b = found.get_or_insert_with(|| {
                Bounds::new(top.clone(), left.clone(), top.clone(), left.clone())
            });
            b.top = b.top.clone().min(top.clone());
            b.bottom = b.bottom.clone().max(top.clone());
            b.left = b.left.clone().min(left.clone());
            b.right = b.right.clone().max(left.clone());
            return;
        }

        let last = &Number::pow2(n.level) - &Number::ONE;
        if let Some(b) = found.as_ref() {
            if &b.left <= left
                && &b.top <= top
                && left + &last <= b.right
                && top + &last <= b.bottom
            {
                return;
            }
        }

        let [nw, ne, sw, se] = n.parts().map(|x| !self.store.get(x).population.is_zero());
        let [mut mask_nw, mut mask_ne, mut mask_sw, mut mask_se] = [mask; 4];
        if nw {
            mask_sw &= !MASK_TOP;
            mask_ne &= !MASK_LEFT;
            mask_se &= !(MASK_TOP | MASK_LEFT);
        }
        if sw {
            mask_se &= !MASK_LEFT;
            mask_nw &= !MASK_BOTTOM;
            mask_ne &= !(MASK_BOTTOM | MASK_LEFT);
        }
        if ne {
            mask_nw &= !MASK_RIGHT;
            mask_se &= !MASK_TOP;
            mask_sw &= !(MASK_TOP | MASK_RIGHT);
        }
        if se {
            mask_sw &= !MASK_RIGHT;
            mask_ne &= !MASK_BOTTOM;
            mask_nw &= !(MASK_BOTTOM | MASK_RIGHT);
        }

        let half = Number::pow2(n.level - 1);
        let (right, bottom) = (left + &half, top + &half);
        self.node_bounds(n.nw, left, top, mask_nw, found);
        self.node_bounds(n.ne, &right, top, mask_ne, found);
        self.node_bounds(n.sw, left, &bottom, mask_sw, found);
        self.node_bounds(n.se, &right, &bottom, mask_se, found);
    }

    /// Remembers the current root and generation.
    pub fn save_rewind_state(&mut self) {
        self.rewind = Some((self.root, self.generation.clone()));
    }

    /// Goes back to the last saved state; returns `false` if there is none.
    pub fn restore_rewind_state(&mut self) -> bool {
        match &self.rewind {
            Some((root, generation)) => {
                self.root = *root;
                self.generation = generation.clone();
                true
            }
            None => false,
        }
    }

    pub fn has_rewind_state(&self) -> bool {
        self.rewind.is_some()
    }

    /// `level`, `step`, `generation`, `population`, `width` and `height`.
    pub fn stats(&self) -> BTreeMap<&'static str, Number> {
        let population = self.population();
        let (width, height) = if population.is_zero() {
            (Number::ZERO, Number::ZERO)
        } else {
            let bounds = self.root_bounds();
            (bounds.width(), bounds.height())
        };
        BTreeMap::from([
            ("level", Number::from(self.level())),
            ("step", Number::from(self.step)),
            ("generation", self.generation.clone()),
            ("population", population),
            ("width", width),
            ("height", height),
        ])
    }
}

/// Builds a tree from cell coordinates translated into `[0, 2^level)`.
struct FieldBuilder<'a> {
    store: &'a NodeStore,
    blank_nodes: &'a mut BlankNodes,
    level1: &'a [NodeId; 16],
    level2: &'a mut HashMap<u16, NodeId>,
}

impl FieldBuilder<'_> {
    fn build(&mut self, xs: &mut [u64], ys: &mut [u64], level: u32) -> NodeId {
        if xs.is_empty() {
            return self.blank_nodes.get(level, self.store);
        }
        if level == 2 {
            let set = xs.iter().zip(ys.iter()).fold(0u16, |set, (&x, &y)| {
                set | 1 << ((x & 1) | (y & 1) << 1 | (x & 2) << 1 | (y & 2) << 2)
            });
            let (store, level1) = (self.store, self.level1);
            return *self.level2.entry(set).or_insert_with(|| {
                store.canonicalize(
                    level1[(set & 0xF) as usize],
                    level1[(set >> 4 & 0xF) as usize],
                    level1[(set >> 8 & 0xF) as usize],
                    level1[(set >> 12 & 0xF) as usize],
                )
            });
        }

        let bit = 1u64 << (level - 1);
        let middle = partition(ys, xs, bit);
        let (top_x, bottom_x) = xs.split_at_mut(middle);
        let (top_y, bottom_y) = ys.split_at_mut(middle);
        let top_middle = partition(top_x, top_y, bit);
        let bottom_middle = partition(bottom_x, bottom_y, bit);
        let (nw_x, ne_x) = top_x.split_at_mut(top_middle);
        let (nw_y, ne_y) = top_y.split_at_mut(top_middle);
        let (sw_x, se_x) = bottom_x.split_at_mut(bottom_middle);
        let (sw_y, se_y) = bottom_y.split_at_mut(bottom_middle);

        let nw = self.build(nw_x, nw_y, level - 1);
        let ne = self.build(ne_x, ne_y, level - 1);
        let sw = self.build(sw_x, sw_y, level - 1);
        let se = self.build(se_x, se_y, level - 1);
        self.store.canonicalize(nw, ne, sw, se)
    }
}

/// Moves the pairs whose `keys` value has `bit` clear to the front, permuting
/// `other` alongside; returns how many there are.
fn partition(keys: &mut [u64], other: &mut [u64], bit: u64) -> usize {
    let mut front = 0;
    for i in 0..keys.len() {
        if keys[i] & bit == 0 {
            keys.swap(front, i);
            other.swap(front, i);
            front += 1;
        }
    }
    front
}
