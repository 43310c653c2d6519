//! Version spaces: every concatenation of atoms consistent with the examples seen so far.
//!
//! A version space is a DAG kept in an arena. Each node is a sub-goal, identified by how much
//! of each example's output has been produced so far; an edge from one sub-goal to another
//! carries the atom sets that produce the output between them. Any path from the root (nothing
//! produced) to the finish (everything produced) is a consistent program.
//!
//! The space for one example is built by asking the witness functions for every segment of the
//! output. Spaces for several examples are combined by structural intersection: a node of the
//! intersection pairs one node from each side, keyed by the concatenation of their sub-goals,
//! and its edges are the pairwise intersections of the sides' edges.

use super::input_graph::InputDataGraph;
use super::witness::{self, AtomSet};
use crate::budget::Budget;
use crate::config::{cap_hit, SynthesisConfig};
use crate::region::{Row, RowId};
use crate::Result;
use std::collections::{BTreeSet, HashMap};

/// Index of a node in a version space's arena.
pub type NodeId = usize;

/// Output offsets reached, one per example.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubGoal(pub Vec<usize>);

impl SubGoal {
    fn join(&self, other: &SubGoal) -> SubGoal {
        SubGoal(self.0.iter().chain(other.0.iter()).copied().collect())
    }
}

/// Every atom leading from one sub-goal to another.
#[derive(Debug, Clone)]
pub struct VsEdge {
    /// The sub-goal reached.
    pub target: NodeId,
    /// The atoms producing the output between the two sub-goals.
    pub atoms: Vec<AtomSet>,
}

#[derive(Debug, Clone)]
struct VsNode {
    goal: SubGoal,
    edges: Vec<VsEdge>,
}

/// The programs consistent with a set of examples, as a DAG over sub-goals.
#[derive(Debug, Clone)]
pub struct VersionSpace {
    nodes: Vec<VsNode>,
    index: HashMap<SubGoal, NodeId>,
    root: NodeId,
    finish: NodeId,
    examples: Vec<RowId>,
}

impl VersionSpace {
    fn empty(examples: Vec<RowId>) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            root: 0,
            finish: 0,
            examples,
        }
    }

    /// Returns the node for `goal`, allocating it on first use.
    fn intern(&mut self, goal: SubGoal) -> (NodeId, bool) {
        if let Some(id) = self.index.get(&goal) {
            return (*id, false);
        }
        let id = self.nodes.len();
        self.index.insert(goal.clone(), id);
        self.nodes.push(VsNode {
            goal,
            edges: Vec::new(),
        });
        (id, true)
    }

    /// Builds the version space of programs turning `row` into `output`.
    ///
    /// Returns `None` when the output is longer than the configured cap.
    pub fn learn(
        row: &Row,
        output: &str,
        graph: &InputDataGraph,
        config: &SynthesisConfig,
        budget: &Budget,
    ) -> Result<Option<Self>> {
        if output.len() > config.max_output_len {
            cap_hit!(
                config,
                row = row.id().0,
                len = output.len(),
                "output_length_cap"
            );
            return Ok(None);
        }
        let boundaries: Vec<usize> = output
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(output.len()))
            .collect();

        let mut space = Self::empty(vec![row.id()]);
        let (root, _) = space.intern(SubGoal(vec![0]));
        let (finish, _) = space.intern(SubGoal(vec![output.len()]));
        space.root = root;
        space.finish = finish;

        let mut pending = vec![0usize];
        let mut seen = BTreeSet::from([0usize]);
        while let Some(i) = pending.pop() {
            budget.check()?;
            let (from, _) = space.intern(SubGoal(vec![i]));
            for &j in boundaries.iter().filter(|j| **j > i) {
                let segment = &output[i..j];
                let mut atoms = vec![witness::constant(segment)];
                atoms.extend(witness::substrings(row, segment, graph, config));
                atoms.extend(witness::case_converted(row, segment, graph, config));
                let (to, _) = space.intern(SubGoal(vec![j]));
                space.nodes[from].edges.push(VsEdge { target: to, atoms });
                if seen.insert(j) {
                    pending.push(j);
                }
            }
        }
        tracing::debug!(
            row = row.id().0,
            nodes = space.nodes.len(),
            edges = space.edge_count(),
            "version_space_built"
        );
        Ok(Some(space))
    }

    /// Intersects two version spaces, keeping only sub-goals reachable from the root that can
    /// still reach the finish.
    ///
    /// Returns `None` if the intersection is empty or grows past the configured edge cap.
    pub fn intersection(
        &self,
        other: &Self,
        config: &SynthesisConfig,
        budget: &Budget,
    ) -> Result<Option<Self>> {
        let mut examples = self.examples.clone();
        examples.extend(other.examples.iter().copied());
        let mut space = Self::empty(examples);

        let key = |a: NodeId, b: NodeId| self.nodes[a].goal.join(&other.nodes[b].goal);
        let (root, _) = space.intern(key(self.root, other.root));
        let (finish, _) = space.intern(key(self.finish, other.finish));
        space.root = root;
        space.finish = finish;

        let mut pending = vec![(self.root, other.root)];
        let mut edges = 0usize;
        while let Some((a, b)) = pending.pop() {
            budget.check()?;
            let (from, _) = space.intern(key(a, b));
            for e1 in &self.nodes[a].edges {
                for e2 in &other.nodes[b].edges {
                    let atoms: Vec<AtomSet> = e1
                        .atoms
                        .iter()
                        .flat_map(|s1| e2.atoms.iter().filter_map(move |s2| s1.intersection(s2)))
                        .collect();
                    if atoms.is_empty() {
                        continue;
                    }
                    edges += 1;
                    if edges > config.max_version_space_edges {
                        cap_hit!(config, edges, "version_space_edge_cap");
                        return Ok(None);
                    }
                    let (to, fresh) = space.intern(key(e1.target, e2.target));
                    space.nodes[from].edges.push(VsEdge { target: to, atoms });
                    if fresh {
                        pending.push((e1.target, e2.target));
                    }
                }
            }
        }
        Ok(space.pruned())
    }

    /// Drops nodes that cannot reach the finish. `None` if the root is among them.
    fn pruned(self) -> Option<Self> {
        let mut reverse: Vec<Vec<NodeId>> = vec![Vec::new(); self.nodes.len()];
        for (from, node) in self.nodes.iter().enumerate() {
            for edge in &node.edges {
                reverse[edge.target].push(from);
            }
        }
        let mut alive = vec![false; self.nodes.len()];
        let mut pending = vec![self.finish];
        alive[self.finish] = true;
        while let Some(n) = pending.pop() {
            for &p in &reverse[n] {
                if !alive[p] {
                    alive[p] = true;
                    pending.push(p);
                }
            }
        }
        if !alive[self.root] {
            return None;
        }

        let mut renumber: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        let mut next = 0;
        for (old, is_alive) in alive.iter().enumerate() {
            if *is_alive {
                renumber[old] = Some(next);
                next += 1;
            }
        }
        let mut space = Self::empty(self.examples);
        for (old, node) in self.nodes.into_iter().enumerate() {
            if !alive[old] {
                continue;
            }
            let edges = node
                .edges
                .into_iter()
                .filter_map(|e| {
                    renumber[e.target].map(|target| VsEdge {
                        target,
                        atoms: e.atoms,
                    })
                })
                .collect();
            let (id, _) = space.intern(node.goal);
            space.nodes[id].edges = edges;
        }
        space.root = renumber[self.root]?;
        space.finish = renumber[self.finish]?;
        Some(space)
    }

    /// The sub-goal where no output has been produced.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The sub-goal where every output is complete.
    pub fn finish(&self) -> NodeId {
        self.finish
    }

    /// Rows of the examples this space is consistent with, in sub-goal order.
    pub fn examples(&self) -> &[RowId] {
        &self.examples
    }

    /// Number of sub-goals.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.edges.len()).sum()
    }

    /// The sub-goal of `node`.
    pub fn goal(&self, node: NodeId) -> &SubGoal {
        &self.nodes[node].goal
    }

    /// Edges leaving `node`.
    pub fn edges(&self, node: NodeId) -> &[VsEdge] {
        &self.nodes[node].edges
    }

    /// Looks a sub-goal up by identity.
    pub fn node(&self, goal: &SubGoal) -> Option<NodeId> {
        self.index.get(goal).copied()
    }

    /// Every edge as `(from, edge)`, in arena order.
    pub fn all_edges(&self) -> impl Iterator<Item = (NodeId, &VsEdge)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(from, node)| node.edges.iter().map(move |e| (from, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::language::Atom;

    fn setup(strs: &[&str]) -> (Vec<Row>, InputDataGraph) {
        let rows: Vec<Row> = strs
            .iter()
            .enumerate()
            .map(|(i, s)| Row::new(RowId(i), [*s]))
            .collect();
        let refs: Vec<&Row> = rows.iter().collect();
        let graph = InputDataGraph::new(&refs, 16);
        (rows, graph)
    }

    fn learn(row: &Row, output: &str, graph: &InputDataGraph) -> VersionSpace {
        VersionSpace::learn(
            row,
            output,
            graph,
            &SynthesisConfig::default(),
            &Budget::unlimited(),
        )
        .unwrap()
        .unwrap()
    }

    fn direct(space: &VersionSpace, graph: &InputDataGraph) -> BTreeSet<Atom> {
        space
            .edges(space.root())
            .iter()
            .filter(|e| e.target == space.finish())
            .flat_map(|e| e.atoms.iter().flat_map(|a| a.denote(graph)))
            .collect()
    }

    #[test]
    fn single_example_space() {
        let (rows, graph) = setup(&["Mumbai, India"]);
        let space = learn(&rows[0], "India", &graph);
        // one node per output boundary, one edge per segment
        assert_eq!(space.node_count(), 6);
        assert_eq!(space.edge_count(), 15);
        let segment = space
            .node(&SubGoal(vec![3]))
            .map(|n| space.goal(n).clone());
        assert_eq!(segment, Some(SubGoal(vec![3])));
        assert!(direct(&space, &graph).contains(&Atom::ConstantString(String::from("India"))));
    }

    #[test]
    fn intersection_keeps_consistent_programs() {
        let (rows, graph) = setup(&[
            "Mumbai, India",
            "Los Angeles, United States of America",
            "Newark, United States",
            "New Delhi, India",
        ]);
        let a = learn(&rows[0], "India", &graph);
        let b = learn(&rows[1], "United States of America", &graph);
        let space = a
            .intersection(&b, &SynthesisConfig::default(), &Budget::unlimited())
            .unwrap()
            .unwrap();
        assert_eq!(space.examples(), &[RowId(0), RowId(1)]);
        let atoms = direct(&space, &graph);
        assert!(!atoms.is_empty());
        for atom in &atoms {
            assert_eq!(atom.eval(&rows[0]).unwrap(), "India");
            assert_eq!(atom.eval(&rows[1]).unwrap(), "United States of America");
        }
    }

    #[test]
    fn contradictory_constants_intersect_to_nothing() {
        let (rows, graph) = setup(&["abc"]);
        let a = learn(&rows[0], "X", &graph);
        let b = learn(&rows[0], "Y", &graph);
        let space = a
            .intersection(&b, &SynthesisConfig::default(), &Budget::unlimited())
            .unwrap();
        assert!(space.is_none());
    }

    #[test]
    fn long_outputs_are_capped() {
        let (rows, graph) = setup(&["abc"]);
        let config = SynthesisConfig {
            max_output_len: 2,
            ..SynthesisConfig::default()
        };
        let space =
            VersionSpace::learn(&rows[0], "abc", &graph, &config, &Budget::unlimited()).unwrap();
        assert!(space.is_none());
    }

    #[test]
    fn edge_cap_gives_up() {
        let (rows, graph) = setup(&["abcdef", "abcdef"]);
        let a = learn(&rows[0], "abcdef", &graph);
        let b = learn(&rows[1], "abcdef", &graph);
        let config = SynthesisConfig {
            max_version_space_edges: 3,
            ..SynthesisConfig::default()
        };
        assert!(a
            .intersection(&b, &config, &Budget::unlimited())
            .unwrap()
            .is_none());
    }

    #[test]
    fn cancelled_budget_stops_learning() {
        let (rows, graph) = setup(&["abc"]);
        let token = crate::budget::CancellationToken::new();
        token.cancel();
        let budget = Budget::new(token, None);
        let result = VersionSpace::learn(
            &rows[0],
            "abc",
            &graph,
            &SynthesisConfig::default(),
            &budget,
        );
        assert!(matches!(result, Err(crate::Error::Cancelled)));
    }
}
