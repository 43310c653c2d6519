//! Picks the single best program out of a version space.
//!
//! Each edge of the version space is reduced to its best concrete atom, scored from static
//! features: substrings beat constants, longer pieces beat shorter ones (quadratically),
//! preferred columns beat others, and case conversion pays a small penalty. A path's score is
//! the sum of its atoms' scores. Ties go to the path with fewer operations, then to the path
//! whose rendering sorts first, so learning is reproducible.

use super::input_graph::{Id, InputDataGraph, Node};
use super::language::{Atom, Direction, Position, TransformProgram};
use super::version_space::{NodeId, VersionSpace, VsEdge};
use super::witness::{AtomSet, PositionSet};
use crate::constraint::ColumnPriority;
use crate::graph::{self, AdjacencyMap};
use crate::region::{ColumnIndex, Row};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

const EPSILON: i64 = 1;
const KAPPA: i64 = 15; // BlinkFill Section 7.3
const CASE_PENALTY: i64 = 10;

/// Value of a (partial) path; larger is better.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PathValue {
    score: i64,
    size: Reverse<usize>,
    text: Reverse<String>,
}

impl PathValue {
    fn empty() -> Self {
        Self {
            score: 0,
            size: Reverse(0),
            text: Reverse(String::new()),
        }
    }

    fn join(&self, rest: &Self) -> Self {
        let mut text = self.text.0.clone();
        text.push('\n');
        text.push_str(&rest.text.0);
        Self {
            score: self.score + rest.score,
            size: Reverse(self.size.0 + rest.size.0),
            text: Reverse(text),
        }
    }
}

/// Scores the atoms of a version space against an input data graph.
pub struct Ranker<'a> {
    graph: &'a InputDataGraph,
    ranks: BTreeMap<Node, usize>,
    adj: AdjacencyMap<Node>,
    inv: AdjacencyMap<Node>,
    lengths: BTreeMap<Id, usize>,
    priority: Option<&'a ColumnPriority>,
}

impl<'a> Ranker<'a> {
    /// `rows` are the inputs the graph was built from.
    pub fn new(
        graph: &'a InputDataGraph,
        rows: &[&Row],
        priority: Option<&'a ColumnPriority>,
    ) -> Self {
        let distances = graph.distances();
        let ranks = graph.rank_nodes(&distances);
        let adj = graph::adjacency_map(graph.edges());
        let inv = graph::invert_adjacency_map(&adj);
        let lengths = rows
            .iter()
            .flat_map(|row| {
                row.cells()
                    .iter()
                    .enumerate()
                    .map(move |(ci, cell)| (Id::new(row.id(), ColumnIndex(ci)), cell.len()))
            })
            .collect();
        Self {
            graph,
            ranks,
            adj,
            inv,
            lengths,
            priority,
        }
    }

    /// The highest ranked program in `space`, or `None` if no path resolves.
    pub fn top_program(&self, space: &VersionSpace) -> Option<TransformProgram> {
        let mut best_by_edge: BTreeMap<(NodeId, NodeId), (PathValue, Atom)> = BTreeMap::new();
        for (from, edge) in space.all_edges() {
            if let Some((score, atom)) = self.best_atom(space, from, edge) {
                let value = PathValue {
                    score,
                    size: Reverse(atom.size()),
                    text: Reverse(atom.to_string()),
                };
                let key = (from, edge.target);
                let better = best_by_edge
                    .get(&key)
                    .map_or(true, |(existing, _)| value > *existing);
                if better {
                    best_by_edge.insert(key, (value, atom));
                }
            }
        }
        let adj = graph::adjacency_map(best_by_edge.keys());
        let (value, path) = graph::best_path(
            space.root(),
            space.finish(),
            &adj,
            PathValue::empty(),
            |v1, v2| {
                best_by_edge
                    .get(&(*v1, *v2))
                    .map(|(value, _)| value.clone())
                    .unwrap_or_else(PathValue::empty)
            },
            PathValue::join,
        )?;
        tracing::debug!(
            score = value.score,
            atoms = path.len(),
            "transform_program_ranked"
        );
        let atoms = path
            .iter()
            .filter_map(|e| best_by_edge.remove(e).map(|(_, atom)| atom))
            .collect();
        Some(TransformProgram(atoms))
    }

    fn best_atom(&self, space: &VersionSpace, from: NodeId, edge: &VsEdge) -> Option<(i64, Atom)> {
        let start = &space.goal(from).0;
        let end = &space.goal(edge.target).0;
        let n = start.len().max(1) as i64;
        let len: i64 = start
            .iter()
            .zip(end.iter())
            .map(|(s, e)| (e - s) as i64)
            .sum::<i64>()
            / n;

        let mut best: Option<(i64, Reverse<String>, Atom)> = None;
        for set in &edge.atoms {
            let Some((score, atom)) = self.score(set, len) else {
                continue;
            };
            let candidate = (score, Reverse(atom.to_string()), atom);
            if best
                .as_ref()
                .map_or(true, |b| (candidate.0, &candidate.1) > (b.0, &b.1))
            {
                best = Some(candidate);
            }
        }
        best.map(|(score, _, atom)| (score, atom))
    }

    fn score(&self, set: &AtomSet, len: i64) -> Option<(i64, Atom)> {
        match set {
            AtomSet::ConstantString(s) => {
                let len = s.len() as i64;
                Some((len * len * EPSILON, Atom::ConstantString(s.clone())))
            }
            AtomSet::SubstringSet(ci, p_l, p_r) => {
                let (l, r) = self.choose_positions(*ci, p_l, p_r)?;
                Some((len * len * KAPPA * self.column_factor(*ci), Atom::Substring(*ci, l, r)))
            }
            AtomSet::CaseSet(case, ci, p_l, p_r) => {
                let (l, r) = self.choose_positions(*ci, p_l, p_r)?;
                let score = len * len * KAPPA * self.column_factor(*ci) - CASE_PENALTY;
                Some((score, Atom::CaseConvert(*case, *ci, l, r)))
            }
        }
    }

    fn column_factor(&self, col: ColumnIndex) -> i64 {
        match self.priority {
            None => 1,
            Some(priority) => match priority.tier(col) {
                Some(tier) => (priority.0.len() - tier + 1) as i64,
                None => 1,
            },
        }
    }

    /// Picks the best pair of positions that yields a non-empty substring on every input the
    /// graph knows about.
    fn choose_positions(
        &self,
        col: ColumnIndex,
        p_l: &BTreeSet<PositionSet>,
        p_r: &BTreeSet<PositionSet>,
    ) -> Option<(Position, Position)> {
        let lefts = self.by_key(p_l);
        let rights = self.by_key(p_r);
        for l in &lefts {
            for r in &rights {
                if self.valid_pair(col, l, r) {
                    return Some((self.sample(l)?, self.sample(r)?));
                }
            }
        }
        None
    }

    fn by_key<'s>(&self, set: &'s BTreeSet<PositionSet>) -> Vec<&'s PositionSet> {
        let mut sorted: Vec<&PositionSet> = set.iter().collect();
        // stable sort keeps BTreeSet order among equal keys
        sorted.sort_by_key(|p| Reverse(self.key(p)));
        sorted
    }

    fn key(&self, p: &PositionSet) -> (usize, usize) {
        match p {
            PositionSet::GraphNode(v) => (1, self.ranks.get(v).copied().unwrap_or(0)),
            PositionSet::ConstantPosition(k) => (0, usize::from(k.0 > 0)),
        }
    }

    fn index_of(&self, p: &PositionSet, id: Id) -> Option<usize> {
        match p {
            PositionSet::GraphNode(v) => self.graph.labels.get(v)?.get(&id).map(|i| i.0),
            PositionSet::ConstantPosition(k) => {
                let n = *self.lengths.get(&id)? as isize;
                let k = if k.0 > 0 { k.0 } else { n + k.0 + 1 };
                (0 < k && k <= n + 1).then_some(k as usize)
            }
        }
    }

    fn valid_pair(&self, col: ColumnIndex, l: &PositionSet, r: &PositionSet) -> bool {
        self.lengths
            .keys()
            .filter(|id| id.col == col)
            .all(|id| match (self.index_of(l, *id), self.index_of(r, *id)) {
                (Some(l), Some(r)) => 0 < l && l < r,
                _ => false,
            })
    }

    /// Turns a position set into one concrete position, preferring heavier tokens and
    /// occurrences near either end of the string.
    fn sample(&self, p: &PositionSet) -> Option<Position> {
        let v = match p {
            PositionSet::ConstantPosition(k) => return Some(Position::ConstantPosition(*k)),
            PositionSet::GraphNode(v) => *v,
        };
        let mut best: Option<((isize, isize), Position)> = None;
        let incoming = self
            .inv
            .get(&v)
            .into_iter()
            .flatten()
            .map(|vs| ((*vs, v), Direction::End));
        let outgoing = self
            .adj
            .get(&v)
            .into_iter()
            .flatten()
            .map(|vf| ((v, *vf), Direction::Start));
        for (edge, dir) in incoming.chain(outgoing) {
            for (tok, occ) in self.graph.tokens.get(&edge).into_iter().flatten() {
                let weight = (tok.weight(), occ.weight());
                if best.as_ref().map_or(true, |(w, _)| weight > *w) {
                    best = Some((weight, Position::Match(tok.clone(), *occ, dir)));
                }
            }
        }
        best.map(|(_, p)| p)
    }
}
