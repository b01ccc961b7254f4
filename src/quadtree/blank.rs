use super::{NodeId, NodeStore};

/// Empty trees of every level built so far, `data[level]`.
///
/// Must be cleared whenever the store it was filled from is replaced.
pub(crate) struct BlankNodes {
    data: Vec<NodeId>,
}

impl BlankNodes {
    pub(crate) fn new() -> Self {
        Self { data: vec![] }
    }

    pub(crate) fn get(&mut self, level: u32, store: &NodeStore) -> NodeId {
        let i = level as usize;
        let v = &mut self.data;
        while v.len() <= i {
            if let Some(&b) = v.last() {
                v.push(store.canonicalize(b, b, b, b));
            } else {
                v.push(NodeId::DEAD);
            };
        }
        v[i]
    }

    pub(crate) fn clear(&mut self) {
        self.data.clear();
    }
}
