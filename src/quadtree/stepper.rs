use super::{Node, NodeId, NodeStore};
use crate::{Number, Rule};
use std::{future::Future, pin::Pin, sync::Arc};
use tokio::task::JoinHandle;
use tracing::trace;

/// Everything one `advance` needs, shared between worker tasks.
///
/// Results are memoized in the nodes under `version`; the owner bumps the
/// version whenever `step` or `rule` changes.
pub(crate) struct Stepper {
    pub(crate) store: Arc<NodeStore>,
    pub(crate) rule: Rule,
    /// level-1 nodes indexed by cell mask
    pub(crate) level1: [NodeId; 16],
    /// `advance` moves by `2^step` generations
    pub(crate) step: u32,
    pub(crate) version: u32,
    pub(crate) spawn_population: Number,
    pub(crate) min_spawn_level: u32,
}

impl Stepper {
    /// Centre of a level-2 node after one generation.
    fn level2_next(&self, n: &Node) -> NodeId {
        let store = &*self.store;
        let [nw, ne, sw, se] = n.parts().map(|x| store.get(x));
        let rows = [
            [nw.nw, nw.ne, ne.nw, ne.ne],
            [nw.sw, nw.se, ne.sw, ne.se],
            [sw.nw, sw.ne, se.nw, se.ne],
            [sw.sw, sw.se, se.sw, se.se],
        ];
        let cells = rows
            .iter()
            .flatten()
            .fold(0u16, |acc, &x| acc << 1 | u16::from(x == NodeId::ALIVE));
        self.level1[self.rule.next_inner_2x2(cells) as usize]
    }

    /// Nine level `L-1` squares of a level `L` node, each offset by a quarter
    /// of the node's size from its neighbours.
    fn nine_children_overlapping(&self, n: &Node) -> [NodeId; 9] {
        let store = &*self.store;
        let [nw_, ne_, sw_, se_] = n.parts().map(|x| store.get(x));
        [
            n.nw,
            store.canonicalize(nw_.ne, ne_.nw, nw_.se, ne_.sw),
            n.ne,
            store.canonicalize(nw_.sw, nw_.se, sw_.nw, sw_.ne),
            store.canonicalize(nw_.se, ne_.sw, sw_.ne, se_.nw),
            store.canonicalize(ne_.sw, ne_.se, se_.nw, se_.ne),
            n.sw,
            store.canonicalize(sw_.ne, se_.nw, sw_.se, se_.sw),
            n.se,
        ]
    }

    /// Nine level `L-2` squares of a level `L` node that tile its centre
    /// `3/4 x 3/4` without overlapping.
    fn nine_children_disjoint(&self, n: &Node) -> [NodeId; 9] {
        let store = &*self.store;
        let [
            [nwnw, nwne, nwsw, nwse],
            [nenw, nene, nesw, nese],
            [swnw, swne, swsw, swse],
            [senw, sene, sesw, sese],
        ] = n.parts().map(|x| store.get(x).parts().map(|y| store.get(y)));

        [
            [nwnw, nwne, nwsw, nwse],
            [nwne, nenw, nwse, nesw],
            [nenw, nene, nesw, nese],
            [nwsw, nwse, swnw, swne],
            [nwse, nesw, swne, senw],
            [nesw, nese, senw, sene],
            [swnw, swne, swsw, swse],
            [swne, senw, swse, sesw],
            [senw, sene, sesw, sese],
        ]
        .map(|[nw, ne, sw, se]| store.canonicalize(nw.se, ne.sw, sw.ne, se.nw))
    }

    fn four_children_overlapping(&self, arr: &[NodeId; 9]) -> [NodeId; 4] {
        let store = &*self.store;
        [
            store.canonicalize(arr[0], arr[1], arr[3], arr[4]),
            store.canonicalize(arr[1], arr[2], arr[4], arr[5]),
            store.canonicalize(arr[3], arr[4], arr[6], arr[7]),
            store.canonicalize(arr[4], arr[5], arr[7], arr[8]),
        ]
    }

    fn should_spawn(&self, n: &Node) -> bool {
        n.level >= self.min_spawn_level && n.population >= self.spawn_population
    }

    /// Centre of `id` advanced by `2^step` generations.
    ///
    /// # Panics
    /// Panics if the node's level is not greater than `step + 1`.
    pub(crate) fn advance(&self, id: NodeId) -> NodeId {
        if self.store.poisoned() {
            return NodeId::DEAD;
        }
        let n = self.store.get(id);
        assert!(
            n.level >= self.step.saturating_add(2),
            "cannot advance a level-{} node by 2^{} generations",
            n.level,
            self.step
        );
        if n.level == self.step.saturating_add(2) {
            return self.step_advance(id);
        }
        if let Some(cached) = n.next_gen.get(self.version) {
            return cached;
        }

        let arr9 = self.nine_children_disjoint(n);
        let arr4 = self.four_children_overlapping(&arr9).map(|x| self.advance(x));
        let result = self.store.canonicalize(arr4[0], arr4[1], arr4[2], arr4[3]);
        n.next_gen.set(result, self.version);
        result
    }

    /// Centre of `id` advanced by `2^(level - 2)` generations.
    ///
    /// # Panics
    /// Panics if the node's level is less than 2.
    pub(crate) fn step_advance(&self, id: NodeId) -> NodeId {
        if self.store.poisoned() {
            return NodeId::DEAD;
        }
        let n = self.store.get(id);
        assert!(n.level >= 2, "cannot advance a level-{} node", n.level);
        if let Some(cached) = n.step.get(self.version) {
            return cached;
        }

        let result = if n.level == 2 {
            self.level2_next(n)
        } else {
            let arr9 = self
                .nine_children_overlapping(n)
                .map(|x| self.step_advance(x));
            let arr4 = self
                .four_children_overlapping(&arr9)
                .map(|x| self.step_advance(x));
            self.store.canonicalize(arr4[0], arr4[1], arr4[2], arr4[3])
        };
        n.step.set(result, self.version);
        result
    }

    /// Same as [`Self::advance`], but big subtrees are advanced in parallel tasks.
    pub(crate) fn advance_task(
        self: Arc<Self>,
        id: NodeId,
    ) -> Pin<Box<dyn Future<Output = NodeId> + Send>> {
        Box::pin(async move {
            let n = self.store.get(id);
            if self.store.poisoned() || !self.should_spawn(n) {
                return self.advance(id);
            }
            if n.level == self.step.saturating_add(2) {
                return Self::step_advance_task(self.clone(), id).await;
            }
            if let Some(cached) = n.next_gen.get(self.version) {
                return cached;
            }

            let arr9 = self.nine_children_disjoint(n);
            let arr4 = self.four_children_overlapping(&arr9);
            trace!(level = n.level, "spawning 4 tasks");
            let handles = arr4.map(|x| tokio::spawn(Self::advance_task(self.clone(), x)));
            let arr4 = join_all(handles).await;

            let result = self.store.canonicalize(arr4[0], arr4[1], arr4[2], arr4[3]);
            self.store.get(id).next_gen.set(result, self.version);
            result
        })
    }

    /// Same as [`Self::step_advance`], but big subtrees are advanced in parallel tasks.
    pub(crate) fn step_advance_task(
        self: Arc<Self>,
        id: NodeId,
    ) -> Pin<Box<dyn Future<Output = NodeId> + Send>> {
        Box::pin(async move {
            let n = self.store.get(id);
            if self.store.poisoned() || n.level <= 2 || !self.should_spawn(n) {
                return self.step_advance(id);
            }
            if let Some(cached) = n.step.get(self.version) {
                return cached;
            }

            let arr9 = self.nine_children_overlapping(n);
            trace!(level = n.level, "spawning 9 tasks");
            let handles = arr9.map(|x| tokio::spawn(Self::step_advance_task(self.clone(), x)));
            let arr9 = join_all(handles).await;

            let arr4 = self.four_children_overlapping(&arr9);
            trace!(level = n.level, "spawning 4 tasks");
            let handles = arr4.map(|x| tokio::spawn(Self::step_advance_task(self.clone(), x)));
            let arr4 = join_all(handles).await;

            let result = self.store.canonicalize(arr4[0], arr4[1], arr4[2], arr4[3]);
            self.store.get(id).step.set(result, self.version);
            result
        })
    }
}

/// Awaits every handle; a panic inside a task is resumed on the caller.
async fn join_all<const N: usize>(handles: [JoinHandle<NodeId>; N]) -> [NodeId; N] {
    let mut results = [NodeId::DEAD; N];
    for (result, handle) in results.iter_mut().zip(handles) {
        *result = match handle.await {
            Ok(id) => id,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => panic!("advance task did not finish: {e}"),
        };
    }
    results
}
