//! DAG utilities shared by the input data graph and ranking.

use std::cmp::Ord;
use std::collections::{BTreeMap, BTreeSet};

type Edge<N> = (N, N);
/// Successors of each node.
pub type AdjacencyMap<N> = BTreeMap<N, BTreeSet<N>>;

/// Computes an adjacency map from a set of directed edges.
///
/// A node j is included in adj[i] if there is a directed edge from i to j.
pub fn adjacency_map<'a, N>(edges: impl Iterator<Item = &'a Edge<N>>) -> AdjacencyMap<N>
where
    N: Copy + Ord + 'a,
{
    let mut adj: AdjacencyMap<N> = BTreeMap::new();
    for (v1, v2) in edges {
        adj.entry(*v1).or_default().insert(*v2);
    }
    adj
}

/// Computes the adjacency map for the transpose of a directed graph.
pub fn invert_adjacency_map<N>(adj: &AdjacencyMap<N>) -> AdjacencyMap<N>
where
    N: Copy + Ord,
{
    let mut inv: AdjacencyMap<N> = BTreeMap::new();
    for (v1, vs) in adj {
        for v2 in vs {
            inv.entry(*v2).or_default().insert(*v1);
        }
    }
    inv
}

/// Computes a topological order of a directed acyclic graph.
///
/// Among nodes that are ready at the same time, the smallest comes first, so the order is fully
/// determined by the graph. Nodes on a cycle are left out.
pub fn topological_sort<N>(adj: &AdjacencyMap<N>) -> Vec<N>
where
    N: Copy + Ord,
{
    let mut in_degree: BTreeMap<N, usize> = BTreeMap::new();
    for (n1, ns) in adj {
        in_degree.entry(*n1).or_insert(0);
        for n2 in ns {
            *in_degree.entry(*n2).or_insert(0) += 1;
        }
    }
    let mut ready: BTreeSet<N> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(n, _)| *n)
        .collect();
    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(n) = ready.pop_first() {
        order.push(n);
        if let Some(succ) = adj.get(&n) {
            for n2 in succ {
                if let Some(deg) = in_degree.get_mut(n2) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.insert(*n2);
                    }
                }
            }
        }
    }
    order
}

/// Finds the highest valued path between two nodes of a directed acyclic graph.
///
/// The value of a path is built back to front: `join(edge_value(v, w), value_of_rest)`, with
/// `empty` as the value of the path that has already arrived at `end`. Returns `None` if `end`
/// is unreachable from `start`.
pub fn best_path<N, V, F, J>(
    start: N,
    end: N,
    adj: &AdjacencyMap<N>,
    empty: V,
    mut edge_value: F,
    join: J,
) -> Option<(V, Vec<Edge<N>>)>
where
    N: Copy + Ord,
    V: Ord + Clone,
    F: FnMut(&N, &N) -> V,
    J: Fn(&V, &V) -> V,
{
    let order = topological_sort(adj);
    let mut best: BTreeMap<N, (V, Option<N>)> = BTreeMap::new();
    best.insert(end, (empty, None));
    for v in order.iter().rev() {
        if *v == end {
            continue;
        }
        let Some(succ) = adj.get(v) else {
            continue;
        };
        let mut best_here: Option<(V, N)> = None;
        for w in succ {
            let Some((rest, _)) = best.get(w) else {
                continue;
            };
            let value = join(&edge_value(v, w), rest);
            // strict comparison keeps the smallest successor among equals
            if best_here.as_ref().map_or(true, |(b, _)| value > *b) {
                best_here = Some((value, *w));
            }
        }
        if let Some((value, w)) = best_here {
            best.insert(*v, (value, Some(w)));
        }
    }

    let (value, _) = best.get(&start)?.clone();
    let mut path = Vec::new();
    let mut curr = start;
    while curr != end {
        let next = best.get(&curr)?.1?;
        path.push((curr, next));
        curr = next;
    }
    Some((value, path))
}
