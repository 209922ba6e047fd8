//! Left-to-right layered auto-layout.
//!
//! The engine runs in three stages:
//!   1. Base layout: longest-path ranks, one barycenter sweep, stacked columns
//!   2. Anchoring: translate so the anchor node keeps its current position
//!   3. Fix-ups: branch ordering, overlap push-down, pinned-node avoidance
//!
//! Pinned nodes still occupy slots in the base layout so spacing accounts
//! for them, but their positions are never changed when pinning is
//! respected.
//!
//! An unpinned anchor can be moved by the fix-ups (a branch target being
//! reordered, say), so the whole layout is translated back onto it once
//! more at the end. Running the layout twice with no graph change then
//! yields identical positions.

use crate::graph::GraphDocument;
use crate::node::{Dimensions, Position};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet, VecDeque};

/// Spacing constants for [`auto_layout`].
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    /// Horizontal gap between adjacent ranks.
    pub rank_gap: f64,
    /// Vertical gap between nodes stacked in one rank.
    pub node_gap: f64,
    /// Minimum vertical clearance enforced by overlap resolution, and the
    /// padding around pinned nodes.
    pub overlap_padding: f64,
    /// Nodes whose X differs from a bucket's first X by at most this much
    /// are treated as one column during overlap resolution.
    pub bucket_tolerance: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            rank_gap: 120.0,
            node_gap: 40.0,
            overlap_padding: 20.0,
            bucket_tolerance: 60.0,
        }
    }
}

/// Returns `graph` with recomputed node positions.
///
/// Edges, node order and node data are unchanged. When `respect_pinned` is
/// set, pinned nodes keep their positions and the first of them anchors
/// the layout; otherwise every node is repositioned.
#[must_use]
pub fn auto_layout(graph: &GraphDocument, respect_pinned: bool, options: &LayoutOptions) -> GraphDocument {
    let fixed: Vec<bool> = graph
        .nodes
        .iter()
        .map(|n| respect_pinned && n.pinned)
        .collect();
    if fixed.iter().all(|&f| f) {
        return graph.clone();
    }

    let dims: Vec<Dimensions> = graph.nodes.iter().map(|n| n.dimensions()).collect();
    let original: Vec<Position> = graph.nodes.iter().map(|n| n.position).collect();
    let computed = base_layout(graph, &dims, options);

    let anchor = fixed
        .iter()
        .position(|&f| f)
        .or_else(|| graph.nodes.iter().position(|n| n.kind.is_trigger()))
        .unwrap_or(0);
    let dx = original[anchor].x - computed[anchor].x;
    let dy = original[anchor].y - computed[anchor].y;

    let mut positions: Vec<Position> = computed
        .iter()
        .zip(&original)
        .zip(&fixed)
        .map(|((c, o), &f)| if f { *o } else { c.offset(dx, dy) })
        .collect();

    reorder_siblings(graph, &fixed, &mut positions);
    resolve_overlaps(&fixed, &dims, &mut positions, options);
    avoid_pinned(&fixed, &dims, &mut positions, options);

    // A fixed anchor never moves, and with an unfixed anchor nothing is
    // fixed, so a uniform shift keeps the fix-up results intact.
    if !fixed[anchor] {
        let dx = original[anchor].x - positions[anchor].x;
        let dy = original[anchor].y - positions[anchor].y;
        for position in &mut positions {
            *position = position.offset(dx, dy);
        }
    }

    tracing::debug!(
        nodes = graph.nodes.len(),
        anchor = %graph.nodes[anchor].id,
        "Computed auto-layout"
    );

    let mut laid_out = graph.clone();
    for (node, position) in laid_out.nodes.iter_mut().zip(positions) {
        node.position = position;
    }
    laid_out
}

/// Assigns ranks by longest path from the sources.
///
/// Nodes left unvisited because they sit on a cycle go one rank past the
/// deepest visited node.
fn assign_ranks(graph: &GraphDocument) -> Vec<usize> {
    let (digraph, _) = graph.to_digraph();
    let n = digraph.node_count();

    let mut in_degree: Vec<usize> = digraph
        .node_indices()
        .map(|ix| digraph.edges_directed(ix, Direction::Incoming).count())
        .collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&v| in_degree[v] == 0).collect();
    let mut ranks = vec![0usize; n];
    let mut visited = vec![false; n];

    while let Some(u) = queue.pop_front() {
        visited[u] = true;
        for edge in digraph.edges_directed(NodeIndex::new(u), Direction::Outgoing) {
            let v = edge.target().index();
            ranks[v] = ranks[v].max(ranks[u] + 1);
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                queue.push_back(v);
            }
        }
    }

    if visited.iter().any(|&v| !v) {
        let max_rank = ranks
            .iter()
            .zip(&visited)
            .filter(|(_, v)| **v)
            .map(|(r, _)| *r)
            .max()
            .unwrap_or(0);
        for (rank, _) in ranks.iter_mut().zip(&visited).filter(|(_, v)| !**v) {
            *rank = max_rank + 1;
        }
    }
    ranks
}

/// Computes un-anchored positions for every node.
fn base_layout(graph: &GraphDocument, dims: &[Dimensions], options: &LayoutOptions) -> Vec<Position> {
    let ranks = assign_ranks(graph);
    let rank_count = ranks.iter().copied().max().map_or(0, |r| r + 1);

    let mut columns: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
    for (v, &r) in ranks.iter().enumerate() {
        columns[r].push(v);
    }

    let index_of: HashMap<_, _> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (&n.id, i))
        .rev()
        .collect();
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];
    for edge in &graph.edges {
        if let (Some(&s), Some(&t)) = (index_of.get(&edge.source), index_of.get(&edge.target)) {
            predecessors[t].push(s);
        }
    }

    // Single forward barycenter sweep against the previous column.
    for r in 1..rank_count {
        let slot: HashMap<usize, usize> = columns[r - 1]
            .iter()
            .enumerate()
            .map(|(slot, &v)| (v, slot))
            .collect();
        let mut scored: Vec<(usize, f64)> = columns[r]
            .iter()
            .enumerate()
            .map(|(current, &v)| {
                let slots: Vec<usize> = predecessors[v]
                    .iter()
                    .filter_map(|p| slot.get(p).copied())
                    .collect();
                let score = if slots.is_empty() {
                    current as f64
                } else {
                    slots.iter().sum::<usize>() as f64 / slots.len() as f64
                };
                (v, score)
            })
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        columns[r] = scored.into_iter().map(|(v, _)| v).collect();
    }

    let mut positions = vec![Position::default(); graph.nodes.len()];
    let mut x = 0.0;
    for column in &columns {
        let total: f64 = column.iter().map(|&v| dims[v].height).sum::<f64>()
            + options.node_gap * column.len().saturating_sub(1) as f64;
        let mut y = -total / 2.0;
        for &v in column {
            positions[v] = Position::new(x, y);
            y += dims[v].height + options.node_gap;
        }
        let width = column
            .iter()
            .map(|&v| dims[v].width)
            .fold(0.0, f64::max);
        x += width + options.rank_gap;
    }
    positions
}

/// Orders the targets of branching nodes by handle priority.
///
/// The targets' existing Y values are reused in ascending order, so the
/// set of occupied rows is unchanged.
fn reorder_siblings(graph: &GraphDocument, fixed: &[bool], positions: &mut [Position]) {
    let index_of: HashMap<_, _> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (&n.id, i))
        .rev()
        .collect();

    for source in &graph.nodes {
        let schema = source.handle_schema();
        if !schema.is_ordered() {
            continue;
        }

        let mut seen = HashSet::new();
        let mut targets: Vec<(usize, usize, usize)> = graph
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.source == source.id)
            .filter_map(|(edge_ix, e)| {
                let t = *index_of.get(&e.target)?;
                (!fixed[t] && seen.insert(t)).then(|| (schema.order_of(e.source_handle()), edge_ix, t))
            })
            .collect();
        if targets.len() < 2 {
            continue;
        }

        let mut ys: Vec<f64> = targets.iter().map(|&(_, _, t)| positions[t].y).collect();
        ys.sort_by(f64::total_cmp);
        targets.sort_by_key(|&(order, edge_ix, _)| (order, edge_ix));
        for ((_, _, t), y) in targets.into_iter().zip(ys) {
            positions[t].y = y;
        }
    }
}

/// Pushes nodes down within each column so none overlaps the one above.
fn resolve_overlaps(fixed: &[bool], dims: &[Dimensions], positions: &mut [Position], options: &LayoutOptions) {
    let mut by_x: Vec<usize> = (0..positions.len()).collect();
    by_x.sort_by(|&a, &b| positions[a].x.total_cmp(&positions[b].x).then(a.cmp(&b)));

    let mut buckets: Vec<Vec<usize>> = Vec::new();
    let mut bucket_x = f64::NEG_INFINITY;
    for v in by_x {
        match buckets.last_mut() {
            Some(bucket) if positions[v].x - bucket_x <= options.bucket_tolerance => bucket.push(v),
            _ => {
                bucket_x = positions[v].x;
                buckets.push(vec![v]);
            }
        }
    }

    for mut bucket in buckets {
        bucket.sort_by(|&a, &b| positions[a].y.total_cmp(&positions[b].y).then(a.cmp(&b)));
        let mut previous_bottom: Option<f64> = None;
        for v in bucket {
            if let Some(bottom) = previous_bottom {
                let min_y = bottom + options.overlap_padding;
                if !fixed[v] && positions[v].y < min_y {
                    positions[v].y = min_y;
                }
            }
            previous_bottom = Some(positions[v].y + dims[v].height);
        }
    }
}

/// Moves unpinned nodes that collide with a pinned node to its right.
fn avoid_pinned(fixed: &[bool], dims: &[Dimensions], positions: &mut [Position], options: &LayoutOptions) {
    let pad = options.overlap_padding;
    let pinned: Vec<usize> = (0..fixed.len()).filter(|&v| fixed[v]).collect();
    if pinned.is_empty() {
        return;
    }

    for v in (0..fixed.len()).filter(|&v| !fixed[v]) {
        for &p in &pinned {
            let (a, b) = (positions[v], positions[p]);
            let intersects = a.x < b.x + dims[p].width + pad
                && a.x + dims[v].width > b.x - pad
                && a.y < b.y + dims[p].height + pad
                && a.y + dims[v].height > b.y - pad;
            if intersects {
                positions[v].x = b.x + dims[p].width + pad;
            }
        }
    }
}
