use super::{Node, NodeId};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::OnceLock;
use tracing::warn;

/// Hash-consing table that owns every node of a universe.
///
/// Nodes are appended to write-once slots and linked into per-bucket chains,
/// so lookups never block and a published node never moves. There are twice
/// as many slots as buckets: crossing `buckets * load_factor` nodes asks the
/// owner to collect garbage at the next safe point, and running out of slots
/// poisons the store. A poisoned store answers every request with
/// [`NodeId::DEAD`] and must be discarded by whoever started the computation.
pub(crate) struct NodeStore {
    slots: Box<[OnceLock<Node>]>,
    /// heads of the hash chains
    buckets: Box<[AtomicU32]>,
    /// number of slots handed out, orphaned ones included
    len: AtomicU32,
    capacity_log2: u32,
    gc_threshold: u32,
    gc_requested: AtomicBool,
    poisoned: AtomicBool,
}

impl NodeStore {
    /// Create a store with `2^capacity_log2` buckets.
    pub(crate) fn with_capacity(capacity_log2: u32, load_factor: f64) -> Self {
        assert!(
            capacity_log2 <= 30,
            "Hashtables bigger than 2^30 are not supported"
        );
        let buckets = 1usize << capacity_log2;
        let slots: Box<[OnceLock<Node>]> = (0..buckets * 2).map(|_| OnceLock::new()).collect();
        for alive in [false, true] {
            let _ = slots[NodeId::leaf(alive).0 as usize].set(Node::leaf(alive));
        }
        Self {
            slots,
            buckets: (0..buckets).map(|_| AtomicU32::new(NodeId::NIL)).collect(),
            len: AtomicU32::new(NodeId::RESERVED),
            capacity_log2,
            gc_threshold: (buckets as f64 * load_factor) as u32,
            gc_requested: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
        }
    }

    /// Get a reference to the node with the given id.
    ///
    /// # Panics
    /// Panics if `id` was not handed out by this store.
    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> &Node {
        match self.slots.get(id.0 as usize).and_then(OnceLock::get) {
            Some(node) => node,
            None => panic!("{id:?} does not belong to this store"),
        }
    }

    /// Find the node with the given children; if it is not present, it is created.
    ///
    /// # Panics
    /// Panics if the children are of different levels, unless the store is
    /// poisoned, in which case [`NodeId::DEAD`] is returned.
    pub(crate) fn canonicalize(&self, nw: NodeId, ne: NodeId, sw: NodeId, se: NodeId) -> NodeId {
        if self.poisoned() {
            return NodeId::DEAD;
        }

        let [a, b, c, d] = [nw, ne, sw, se].map(|x| self.get(x));
        assert!(
            a.level == b.level && a.level == c.level && a.level == d.level,
            "children of different levels: {} {} {} {}",
            a.level,
            b.level,
            c.level,
            d.level
        );

        let key = [nw, ne, sw, se];
        let hash = Node::hash(nw, ne, sw, se);
        let bucket = &self.buckets[hash & (self.buckets.len() - 1)];
        let mut head = bucket.load(Ordering::Acquire);
        if let Some(found) = self.find_in_chain(head, NodeId::NIL, key) {
            return found;
        }

        let index = self.len.fetch_add(1, Ordering::Relaxed);
        if index as usize >= self.slots.len() {
            self.poison();
            return NodeId::DEAD;
        }
        if index == self.gc_threshold {
            self.gc_requested.store(true, Ordering::Relaxed);
        }

        let population = &(&(&a.population + &b.population) + &c.population) + &d.population;
        let bounds = Node::combined_bounds([a, b, c, d]);
        let node = Node {
            nw,
            ne,
            sw,
            se,
            level: a.level + 1,
            population,
            bounds,
            next: AtomicU32::new(head),
            next_gen: Default::default(),
            step: Default::default(),
        };
        if self.slots[index as usize].set(node).is_err() {
            panic!("slot {index} was handed out twice");
        }
        let node = self.get(NodeId(index));

        loop {
            match bucket.compare_exchange_weak(head, index, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return NodeId(index),
                Err(new_head) => {
                    // somebody else may have inserted the same node meanwhile;
                    // if so, our slot stays orphaned until the next collection
                    if let Some(found) = self.find_in_chain(new_head, head, key) {
                        return found;
                    }
                    node.next.store(new_head, Ordering::Relaxed);
                    head = new_head;
                }
            }
        }
    }

    /// Walk a chain from `start` until `stop`, looking for a node with the given children.
    fn find_in_chain(&self, start: u32, stop: u32, key: [NodeId; 4]) -> Option<NodeId> {
        let mut index = start;
        while index != stop && index != NodeId::NIL {
            let n = self.get(NodeId(index));
            if n.parts() == key {
                return Some(NodeId(index));
            }
            index = n.next.load(Ordering::Acquire);
        }
        None
    }

    /// Level-1 node whose cells are bits 0..4 of `mask` in nw, ne, sw, se order.
    pub(crate) fn level1_create(&self, mask: u8) -> NodeId {
        let [nw, ne, sw, se] = [0, 1, 2, 3].map(|i| NodeId::leaf(mask >> i & 1 != 0));
        self.canonicalize(nw, ne, sw, se)
    }

    /// All sixteen level-1 nodes, indexed by their cell mask.
    pub(crate) fn level1_table(&self) -> [NodeId; 16] {
        std::array::from_fn(|mask| self.level1_create(mask as u8))
    }

    fn poison(&self) {
        if !self.poisoned.swap(true, Ordering::SeqCst) {
            warn!(
                capacity_log2 = self.capacity_log2,
                "node store ran out of slots, result will be discarded"
            );
        }
    }

    pub(crate) fn poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    pub(crate) fn gc_requested(&self) -> bool {
        self.gc_requested.load(Ordering::Relaxed)
    }

    pub(crate) fn clear_gc_request(&self) {
        self.gc_requested.store(false, Ordering::Relaxed);
    }

    /// Number of nodes created so far, leaves included.
    pub(crate) fn len(&self) -> usize {
        (self.len.load(Ordering::Relaxed) as usize).min(self.slots.len())
    }

    pub(crate) fn capacity_log2(&self) -> u32 {
        self.capacity_log2
    }

    pub(crate) fn bytes_total(&self) -> usize {
        self.slots.len() * std::mem::size_of::<OnceLock<Node>>()
            + self.buckets.len() * std::mem::size_of::<AtomicU32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bounds;
    use std::sync::Arc;

    #[test]
    fn test_canonical_identity() {
        let store = NodeStore::with_capacity(4, 0.95);
        let a = store.level1_create(0b0110);
        let b = store.level1_create(0b0110);
        assert_eq!(a, b);
        assert_ne!(a, store.level1_create(0b0111));

        let n = store.get(a);
        assert_eq!(n.level, 1);
        assert_eq!(n.population, 2.into());
        assert_eq!(n.parts(), [NodeId::DEAD, NodeId::ALIVE, NodeId::ALIVE, NodeId::DEAD]);

        let parent = store.canonicalize(a, a, a, a);
        assert_eq!(store.get(parent).level, 2);
        assert_eq!(store.get(parent).population, 8.into());
        assert_eq!(store.canonicalize(a, a, a, a), parent);
    }

    #[test]
    fn test_cached_bounds() {
        let store = NodeStore::with_capacity(6, 0.95);
        let table = store.level1_table();
        let diagonal = store.get(table[0b0110]);
        assert_eq!(diagonal.bounds(), Some(&Bounds::new(0.into(), 0.into(), 1.into(), 1.into())));
        assert_eq!(store.get(table[0]).bounds(), None);

        // ne cell of the ne quadrant, se cell of the sw quadrant
        let empty = table[0];
        let l2 = store.canonicalize(empty, table[0b0010], table[0b1000], empty);
        assert_eq!(
            store.get(l2).bounds(),
            Some(&Bounds::new(0.into(), 1.into(), 3.into(), 3.into()))
        );
        let blank2 = store.canonicalize(empty, empty, empty, empty);
        let l3 = store.canonicalize(blank2, blank2, blank2, l2);
        assert_eq!(
            store.get(l3).bounds(),
            Some(&Bounds::new(4.into(), 5.into(), 7.into(), 7.into()))
        );
        assert_eq!(store.get(blank2).bounds(), None);
    }

    #[test]
    #[should_panic(expected = "children of different levels")]
    fn test_mixed_levels_panic() {
        let store = NodeStore::with_capacity(4, 0.95);
        let a = store.level1_create(1);
        store.canonicalize(a, a, a, NodeId::DEAD);
    }

    #[test]
    fn test_gc_request_and_poison() {
        // 16 buckets, 32 slots, 2 of them reserved
        let store = NodeStore::with_capacity(4, 0.5);
        let table = store.level1_table();
        assert!(store.gc_requested());
        assert!(!store.poisoned());
        assert_eq!(store.len(), 18);

        let mut created = 0;
        'outer: for a in table {
            for b in table {
                if store.canonicalize(a, b, a, b) == NodeId::DEAD {
                    break 'outer;
                }
                created += 1;
            }
        }
        assert_eq!(created, 14);
        assert!(store.poisoned());
        assert_eq!(store.canonicalize(table[0], table[0], table[0], table[0]), NodeId::DEAD);
        assert_eq!(store.len(), 32);
    }

    #[test]
    fn test_concurrent_canonicalize() {
        let store = Arc::new(NodeStore::with_capacity(12, 0.95));
        let table = store.level1_table();
        let results: Vec<Vec<NodeId>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let store = &store;
                    s.spawn(move || {
                        let mut ids = vec![];
                        for a in table {
                            for b in table {
                                ids.push(store.canonicalize(a, b, b, a));
                            }
                        }
                        ids
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for other in &results[1..] {
            assert_eq!(&results[0], other);
        }
        for (i, id) in results[0].iter().enumerate() {
            let n = store.get(*id);
            assert_eq!(n.parts(), [table[i / 16], table[i % 16], table[i % 16], table[i / 16]]);
        }
    }
}
