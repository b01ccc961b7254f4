use crate::{Bounds, Number};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Location of a node in the [`NodeStore`](super::NodeStore) that created it.
///
/// Ids are only meaningful for one store: garbage collection relocates every
/// live node and hands out new ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The dead cell. Also returned as a placeholder by a poisoned store.
    pub const DEAD: NodeId = NodeId(0);
    /// The live cell.
    pub const ALIVE: NodeId = NodeId(1);
    /// End of a hash chain.
    pub(crate) const NIL: u32 = u32::MAX;
    /// Number of ids reserved for the two leaves.
    pub(crate) const RESERVED: u32 = 2;

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn is_leaf(self) -> bool {
        self.0 < Self::RESERVED
    }

    pub(crate) fn leaf(alive: bool) -> Self {
        if alive {
            Self::ALIVE
        } else {
            Self::DEAD
        }
    }
}

/// Memoized result of a node, tagged with the cache version it was computed for.
///
/// Packs `version << 32 | id` into one word so readers never observe a result
/// paired with the wrong version. Version 0 means "never computed".
#[derive(Debug, Default)]
pub(crate) struct CacheSlot(AtomicU64);

impl CacheSlot {
    pub(crate) fn get(&self, version: u32) -> Option<NodeId> {
        let packed = self.0.load(Ordering::Acquire);
        ((packed >> 32) as u32 == version).then_some(NodeId(packed as u32))
    }

    pub(crate) fn set(&self, value: NodeId, version: u32) {
        let packed = (version as u64) << 32 | value.0 as u64;
        self.0.store(packed, Ordering::Release);
    }

    /// The stored result and its version, whatever the version is.
    pub(crate) fn raw(&self) -> Option<(NodeId, u32)> {
        let packed = self.0.load(Ordering::Acquire);
        let version = (packed >> 32) as u32;
        (version != 0).then_some((NodeId(packed as u32), version))
    }
}

/// A node of the quadtree.
///
/// Leaves have level 0 and point at themselves; a node of level `L > 0`
/// covers a `2^L x 2^L` square and its four children have level `L - 1`.
/// Everything except the caches is immutable once the node is published.
#[derive(Debug)]
pub struct Node {
    pub(crate) nw: NodeId,
    pub(crate) ne: NodeId,
    pub(crate) sw: NodeId,
    pub(crate) se: NodeId,
    pub(crate) level: u32,
    pub(crate) population: Number,
    /// live cells relative to the top-left corner, `None` when empty
    pub(crate) bounds: Option<Bounds>,
    /// next node of the same hash chain
    pub(crate) next: AtomicU32,
    /// centre advanced by `2^step` generations
    pub(crate) next_gen: CacheSlot,
    /// centre advanced by `2^(level - 2)` generations
    pub(crate) step: CacheSlot,
}

impl Node {
    pub(crate) fn leaf(alive: bool) -> Self {
        let id = NodeId::leaf(alive);
        Self {
            nw: id,
            ne: id,
            sw: id,
            se: id,
            level: 0,
            population: if alive { Number::ONE } else { Number::ZERO },
            bounds: alive.then(Bounds::default),
            next: AtomicU32::new(NodeId::NIL),
            next_gen: CacheSlot::default(),
            step: CacheSlot::default(),
        }
    }

    pub(crate) fn hash(nw: NodeId, ne: NodeId, sw: NodeId, se: NodeId) -> usize {
        let h = 0u32
            .wrapping_add((nw.0).wrapping_mul(5))
            .wrapping_add((ne.0).wrapping_mul(17))
            .wrapping_add((sw.0).wrapping_mul(257))
            .wrapping_add((se.0).wrapping_mul(65537));
        h.wrapping_add(h >> 11) as usize
    }

    /// Box of the live cells of a node with the given children, relative to
    /// its top-left corner.
    pub(crate) fn combined_bounds(children: [&Node; 4]) -> Option<Bounds> {
        let half = Number::pow2(children[0].level);
        let shift = |v: &Number, far: bool| if far { v + &half } else { v.clone() };
        children
            .into_iter()
            .zip([(false, false), (true, false), (false, true), (true, true)])
            .filter_map(|(n, (east, south))| {
                let b = n.bounds.as_ref()?;
                Some(Bounds::new(
                    shift(&b.top, south),
                    shift(&b.left, east),
                    shift(&b.bottom, south),
                    shift(&b.right, east),
                ))
            })
            .reduce(|acc, b| {
                Bounds::new(
                    acc.top.min(b.top),
                    acc.left.min(b.left),
                    acc.bottom.max(b.bottom),
                    acc.right.max(b.right),
                )
            })
    }

    pub fn parts(&self) -> [NodeId; 4] {
        [self.nw, self.ne, self.sw, self.se]
    }

    pub fn nw(&self) -> NodeId {
        self.nw
    }

    pub fn ne(&self) -> NodeId {
        self.ne
    }

    pub fn sw(&self) -> NodeId {
        self.sw
    }

    pub fn se(&self) -> NodeId {
        self.se
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn population(&self) -> &Number {
        &self.population
    }

    /// Tight box of the live cells with `(0, 0)` at the node's top-left
    /// corner, `None` if the node is empty.
    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    pub fn is_leaf(&self) -> bool {
        self.level == 0
    }
}
