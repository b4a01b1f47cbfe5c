use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::collections::{BinaryHeap, HashMap};
use std::cmp::Ordering;

use petgraph::algo::Measure;
use petgraph::graph::{EdgeIndex, EdgeReference, NodeIndex, UnGraph};
use petgraph::visit::{EdgeRef, VisitMap, Visitable};


/// Dijkstra's algorithm from `start`, remembering the edge used to reach each node.  Based on
/// the implementation in the petgraph library, which only returns path costs.
///
/// Edge costs must be non-negative.  Nodes that can't be reached from `start` appear in
/// neither map.
///
/// Returns two `HashMap`s: the first maps each reached node to its path cost, and the second
/// maps each reached node other than `start` to the edge taken to reach it.
pub fn dijkstra_with_paths<N, E, F, K>(
    graph: &UnGraph<N, E>,
    start: NodeIndex,
    mut edge_cost: F,
) -> (HashMap<NodeIndex, K>, HashMap<NodeIndex, EdgeIndex>)
where
    F: FnMut(EdgeReference<E>) -> K,
    K: Measure + Copy,
{
    let mut visited = graph.visit_map();
    let mut scores = HashMap::new();
    let mut edges_used = HashMap::new();
    let zero_score = K::default();
    scores.insert(start, zero_score);

    let mut visit_next = BinaryHeap::new();
    visit_next.push(MinScored(zero_score, start));
    while let Some(MinScored(node_score, node)) = visit_next.pop() {
        if visited.is_visited(&node) {
            continue;
        }
        for edge in graph.edges(node) {
            // edges of an undirected graph may be stored either way round
            let next = if edge.source() == node { edge.target() } else { edge.source() };
            if visited.is_visited(&next) {
                continue;
            }
            let next_score = node_score + edge_cost(edge);
            match scores.entry(next) {
                Occupied(ent) => {
                    if next_score < *ent.get() {
                        *ent.into_mut() = next_score;
                        visit_next.push(MinScored(next_score, next));
                        edges_used.insert(next, edge.id());
                    }
                }
                Vacant(ent) => {
                    ent.insert(next_score);
                    visit_next.push(MinScored(next_score, next));
                    edges_used.insert(next, edge.id());
                }
            }
        }
        visited.visit(node);
    }
    (scores, edges_used)
}

/// Follows the edges returned by `dijkstra_with_paths` back from `goal` to the search start.
/// Returns the edges in travel order, or `None` if `goal` was never reached.
pub fn trace_path<N, E>(graph: &UnGraph<N, E>, start: NodeIndex, goal: NodeIndex,
                        edges_used: &HashMap<NodeIndex, EdgeIndex>) -> Option<Vec<EdgeIndex>> {
    let mut path = vec![];
    let mut node = goal;
    while node != start {
        let edge = *edges_used.get(&node)?;
        let (aa, bb) = graph.edge_endpoints(edge)?;
        node = if aa == node { bb } else { aa };
        path.push(edge);
    }
    path.reverse();
    Some(path)
}


#[derive(Copy, Clone, Debug)]
pub struct MinScored<K, T>(pub K, pub T);

impl<K: PartialOrd, T> PartialEq for MinScored<K, T> {
    #[inline]
    fn eq(&self, other: &MinScored<K, T>) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: PartialOrd, T> Eq for MinScored<K, T> {}

impl<K: PartialOrd, T> PartialOrd for MinScored<K, T> {
    #[inline]
    fn partial_cmp(&self, other: &MinScored<K, T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: PartialOrd, T> Ord for MinScored<K, T> {
    #[inline]
    fn cmp(&self, other: &MinScored<K, T>) -> Ordering {
        let a = &self.0;
        let b = &other.0;
        if a == b {
            Ordering::Equal
        } else if a < b {
            Ordering::Greater
        } else if a > b {
            Ordering::Less
        } else if a.ne(a) && b.ne(b) {
            // these are the NaN cases
            Ordering::Equal
        } else if a.ne(a) {
            // Order NaN less, so that it is last in the MinScore order
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}
