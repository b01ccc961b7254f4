use super::{NodeId, NodeStore};
use ahash::AHashMap as HashMap;

/// Copies the nodes reachable from a set of roots into a fresh store.
///
/// With `keep_caches` the memoized results of every copied node are copied
/// too, together with the nodes they point at, so stale entries survive with
/// their original version stamps. Leaves keep their reserved ids.
pub(crate) struct Relocator<'a> {
    old: &'a NodeStore,
    new: &'a NodeStore,
    keep_caches: bool,
    map: HashMap<NodeId, NodeId>,
}

impl<'a> Relocator<'a> {
    pub(crate) fn new(old: &'a NodeStore, new: &'a NodeStore, keep_caches: bool) -> Self {
        Self {
            old,
            new,
            keep_caches,
            map: HashMap::new(),
        }
    }

    /// Returns the id of `id`'s copy in the new store.
    pub(crate) fn relocate(&mut self, id: NodeId) -> NodeId {
        if id.is_leaf() {
            return id;
        }
        if let Some(&moved) = self.map.get(&id) {
            return moved;
        }

        let (old, new) = (self.old, self.new);
        let n = old.get(id);
        let [nw, ne, sw, se] = n.parts().map(|x| self.relocate(x));
        let moved = new.canonicalize(nw, ne, sw, se);
        self.map.insert(id, moved);

        if self.keep_caches {
            let m = new.get(moved);
            for (from, to) in [(&n.next_gen, &m.next_gen), (&n.step, &m.step)] {
                if let Some((result, version)) = from.raw() {
                    to.set(self.relocate(result), version);
                }
            }
        }
        moved
    }

    /// Number of distinct non-leaf nodes copied so far.
    pub(crate) fn relocated(&self) -> usize {
        self.map.len()
    }
}
