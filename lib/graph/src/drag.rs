//! Coalescing of drag-position updates.
//!
//! Pointer moves arrive far faster than frames are drawn. Deltas are
//! accumulated per node and written to the store once per frame by
//! [`DragCoalescer::flush`]. Any other mutation that interleaves with a
//! drag goes through [`DragCoalescer::apply_immediate`], which flushes
//! first so the store never sees the two out of order.

use crate::node::Position;
use crate::store::GraphStore;
use flowcanvas_core::NodeId;
use std::collections::BTreeMap;

/// Pending per-node position deltas.
#[derive(Debug, Clone, Default)]
pub struct DragCoalescer {
    pending: BTreeMap<NodeId, (f64, f64)>,
}

impl DragCoalescer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates a move of `node_id` by `(dx, dy)`.
    pub fn queue(&mut self, node_id: NodeId, dx: f64, dy: f64) {
        let delta = self.pending.entry(node_id).or_insert((0.0, 0.0));
        delta.0 += dx;
        delta.1 += dy;
    }

    /// Returns true if deltas are waiting to be flushed.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Writes all pending deltas in one store update.
    ///
    /// Returns the number of nodes moved. Deltas for nodes that no longer
    /// exist are discarded.
    pub fn flush(&mut self, store: &mut GraphStore) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let pending = std::mem::take(&mut self.pending);
        let graph = store.current();
        let positions: Vec<(NodeId, Position)> = pending
            .into_iter()
            .filter_map(|(node_id, (dx, dy))| {
                let position = graph.node(&node_id)?.position.offset(dx, dy);
                Some((node_id, position))
            })
            .collect();
        store.set_positions(positions)
    }

    /// Flushes pending deltas, then applies `change` right away.
    pub fn apply_immediate<R>(&mut self, store: &mut GraphStore, change: impl FnOnce(&mut GraphStore) -> R) -> R {
        self.flush(store);
        change(store)
    }
}
