//! The input data graph: which token matches line up across every learning input.
//!
//! Each node is a position that exists in every input of a column (labelled with its index in
//! each of them), and each edge carries the `(token, occurrence)` pairs that span exactly
//! between its two positions in every input. Substring positions learned against this graph are
//! therefore meaningful for all inputs, not only for the examples.

use super::language::{Occurrence, StringIndex};
use super::token::{Token, ALL_RE_TOKENS};
use crate::graph;
use crate::region::{ColumnIndex, Row, RowId};
use std::cmp;
use std::collections::{BTreeMap, BTreeSet};

/// One column of one input row.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct Id {
    /// The row.
    pub row: RowId,
    /// The column.
    pub col: ColumnIndex,
}

impl Id {
    /// The input at `col` of `row`.
    pub fn new(row: RowId, col: ColumnIndex) -> Id {
        Id { row, col }
    }
}

/// A graph node: a position shared by every input of a column.
pub type Node = usize;
type Edge = (Node, Node);
/// The labels of an edge: every token match spanning it, with its occurrence.
pub type TokenSet = BTreeSet<(Token, Occurrence)>;

/// Positions shared by a set of inputs and the token matches between them.
#[derive(Debug, Default)]
pub struct InputDataGraph {
    /// The position each node stands for in each input.
    pub labels: BTreeMap<Node, BTreeMap<Id, StringIndex>>,
    /// The token matches between adjacent positions.
    pub tokens: BTreeMap<Edge, TokenSet>,
    by_label: BTreeMap<(Id, StringIndex), BTreeSet<Node>>,
}

impl InputDataGraph {
    /// Builds the graph over `rows`, one component per column. Literal tokens longer than
    /// `max_literal_len` bytes are not considered.
    pub fn new(rows: &[&Row], max_literal_len: usize) -> Self {
        let Some(first) = rows.first() else {
            return Self::default();
        };
        let cols = first.len();
        let mut graph = Self::union((0..cols).filter_map(|col| {
            let col = ColumnIndex(col);
            rows.iter()
                .map(|row| {
                    Self::from_str(
                        row.text(col).unwrap_or(""),
                        Id::new(row.id(), col),
                        max_literal_len,
                    )
                })
                .reduce(|acc, x| acc.intersection(&x))
        }));
        graph.index_labels();
        tracing::debug!(
            rows = rows.len(),
            nodes = graph.labels.len(),
            edges = graph.tokens.len(),
            "input_graph_built"
        );
        graph
    }

    fn index_labels(&mut self) {
        self.by_label.clear();
        for (v, labels) in &self.labels {
            for (id, index) in labels {
                self.by_label.entry((*id, *index)).or_default().insert(*v);
            }
        }
    }

    /// Every node.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &Node> + '_ {
        self.labels.keys()
    }

    /// Every edge.
    pub fn edges(&self) -> impl ExactSizeIterator<Item = &Edge> + '_ {
        self.tokens.keys()
    }

    /// Nodes that sit at `index` in the input identified by `id`.
    pub fn nodes_at(&self, id: Id, index: StringIndex) -> impl Iterator<Item = Node> + '_ {
        self.by_label
            .get(&(id, index))
            .into_iter()
            .flat_map(|nodes| nodes.iter().copied())
    }

    /// Whether `id` is one of the inputs the graph was built from.
    pub fn covers(&self, id: Id) -> bool {
        self.labels.values().any(|labels| labels.contains_key(&id))
    }

    fn from_str(s: &str, id: Id, max_literal_len: usize) -> Self {
        let mut labels = BTreeMap::new();
        let mut tokens: BTreeMap<Edge, TokenSet> = BTreeMap::new();

        for i in 0..s.len() + 3 {
            labels.insert(i, BTreeMap::from([(id, StringIndex(i))]));
        }

        // start and end match exactly once in any string, so occurrence -1 would always
        // accompany occurrence 1 and is left out
        tokens.insert((0, 1), BTreeSet::from([(Token::Start, Occurrence(1))]));
        tokens.insert(
            (s.len() + 1, s.len() + 2),
            BTreeSet::from([(Token::End, Occurrence(1))]),
        );

        // this is in terms of adjusted indices
        for token in ALL_RE_TOKENS {
            let matches = token.all_matches(s);
            let n = matches.len() as isize;
            for (i, span) in matches.iter().enumerate() {
                let set = tokens.entry((span.start, span.end)).or_default();
                let i = i as isize;
                set.insert((token.clone(), Occurrence(i + 1)));
                set.insert((token.clone(), Occurrence(i - n)));
            }
        }

        for (left, _) in s.char_indices() {
            let longest = cmp::min(s.len(), left + max_literal_len);
            for right in (left + 1..=longest).filter(|r| s.is_char_boundary(*r)) {
                let (i, j) = (left + 1, right + 1);
                let lit_tok = Token::Literal(String::from(&s[left..right]));
                let lit_tok_matches = lit_tok.all_matches(s);
                let lit_tok_matches_n = lit_tok_matches.len() as isize;
                if let Some(span_idx) = lit_tok_matches
                    .iter()
                    .position(|span| span.start == i && span.end == j)
                {
                    let set = tokens.entry((i, j)).or_default();
                    let span_idx = span_idx as isize;
                    set.insert((lit_tok.clone(), Occurrence(span_idx + 1)));
                    set.insert((lit_tok, Occurrence(span_idx - lit_tok_matches_n)));
                }
            }
        }

        Self {
            labels,
            tokens,
            by_label: BTreeMap::new(),
        }
    }

    fn intersection(&self, other: &Self) -> Self {
        let mut renumber: BTreeMap<Edge, Node> = BTreeMap::new();
        let mut number = |n1: Node, n2: Node| -> Node {
            let next = renumber.len();
            *renumber.entry((n1, n2)).or_insert(next)
        };

        let mut tokens = BTreeMap::new();
        for ((v1s, v1f), t1) in &self.tokens {
            for ((v2s, v2f), t2) in &other.tokens {
                let intersection: TokenSet = t1.intersection(t2).cloned().collect();
                if !intersection.is_empty() {
                    let vs = number(*v1s, *v2s);
                    let vf = number(*v1f, *v2f);
                    tokens.insert((vs, vf), intersection);
                }
            }
        }

        let mut labels = BTreeMap::new();
        for ((v1, v2), v) in &renumber {
            if let (Some(l1), Some(l2)) = (self.labels.get(v1), other.labels.get(v2)) {
                let mut union = l1.clone();
                union.extend(l2.iter().map(|(id, index)| (*id, *index)));
                labels.insert(*v, union);
            }
        }

        Self {
            labels,
            tokens,
            by_label: BTreeMap::new(),
        }
    }

    fn union(graphs: impl Iterator<Item = Self>) -> Self {
        let mut labels = BTreeMap::new();
        let mut tokens = BTreeMap::new();

        let mut curr = 0;
        for graph in graphs {
            let mut renumber: BTreeMap<Node, Node> = BTreeMap::new();
            let mut number = |n| -> Node {
                *renumber.entry(n).or_insert_with(|| {
                    let v = curr;
                    curr += 1;
                    v
                })
            };
            for (n, l) in graph.labels {
                labels.insert(number(n), l);
            }
            for ((v1, v2), t) in graph.tokens {
                tokens.insert((number(v1), number(v2)), t);
            }
        }

        Self {
            labels,
            tokens,
            by_label: BTreeMap::new(),
        }
    }

    /// Summed index distance between every pair of nodes, over the inputs they share.
    pub fn distances(&self) -> BTreeMap<Edge, usize> {
        let mut result = BTreeMap::new();
        for (v1, l1) in &self.labels {
            for (v2, l2) in &self.labels {
                // nodes of different columns share no inputs and get distance 0; such pairs are
                // never used
                let dist = l1
                    .iter()
                    .filter_map(|(id, index1)| {
                        l2.get(id).map(|index2| index1.0.abs_diff(index2.0))
                    })
                    .sum();
                result.insert((*v1, *v2), dist);
            }
        }
        result
    }

    /// Ranks nodes by the longest token-path distance passing through them.
    pub fn rank_nodes(&self, distances: &BTreeMap<Edge, usize>) -> BTreeMap<Node, usize> {
        let mut v_out: BTreeMap<Node, usize> = self.nodes().map(|n| (*n, 0)).collect();
        let mut v_in: BTreeMap<Node, usize> = v_out.clone();
        let adj = graph::adjacency_map(self.edges());
        let inv = graph::invert_adjacency_map(&adj);
        let topo = graph::topological_sort(&adj);
        let dist = |a: Node, b: Node| distances.get(&(a, b)).copied().unwrap_or(0);
        for v in &topo {
            for vi in inv.get(v).into_iter().flatten() {
                let candidate = v_in.get(vi).copied().unwrap_or(0) + dist(*vi, *v);
                let here = v_in.entry(*v).or_insert(0);
                *here = cmp::max(*here, candidate);
            }
        }
        for v in topo.iter().rev() {
            for vo in adj.get(v).into_iter().flatten() {
                let candidate = v_out.get(vo).copied().unwrap_or(0) + dist(*v, *vo);
                let here = v_out.entry(*v).or_insert(0);
                *here = cmp::max(*here, candidate);
            }
        }
        // total the score in v_out (instead of allocating a separate map)
        for (v, score_out) in &mut v_out {
            *score_out += v_in.get(v).copied().unwrap_or(0);
        }
        v_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(row: usize) -> Id {
        Id::new(RowId(row), ColumnIndex(0))
    }

    fn single(strs: &[&str]) -> Vec<Row> {
        strs.iter()
            .enumerate()
            .map(|(i, s)| Row::new(RowId(i), [*s]))
            .collect()
    }

    #[test]
    fn generate_from_string_1() {
        // Figure 6 of the BlinkFill paper
        let graph = InputDataGraph::from_str("1 lb", id(0), 16);
        assert_eq!(graph.nodes().len(), 7);
        assert_eq!(graph.edges().len(), 12);
        let toks: TokenSet = vec![
            (Token::Digits, Occurrence(1)),
            (Token::Digits, Occurrence(-1)),
            (Token::Alphanumeric, Occurrence(1)),
            (Token::Alphanumeric, Occurrence(-2)),
            (Token::Literal(String::from("1")), Occurrence(1)),
            (Token::Literal(String::from("1")), Occurrence(-1)),
        ]
        .into_iter()
        .collect();
        assert_eq!(graph.tokens.get(&(1, 2)).unwrap(), &toks);
        assert_eq!(graph.tokens.get(&(3, 5)).unwrap().len(), 12);
    }

    #[test]
    fn literal_length_is_capped() {
        let graph = InputDataGraph::from_str("1 lb", id(0), 1);
        // only single-character literals remain, alongside the class tokens
        assert!(graph
            .tokens
            .values()
            .flatten()
            .all(|(tok, _)| !matches!(tok, Token::Literal(s) if s.len() > 1)));
    }

    #[test]
    fn multibyte_text_is_handled() {
        let graph = InputDataGraph::from_str("né à", id(0), 16);
        assert!(graph.tokens.contains_key(&(1, 4)));
        assert!(!graph.tokens.contains_key(&(1, 3)));
    }

    #[test]
    fn intersection() {
        // Figure 9 of the BlinkFill paper
        let g1 = InputDataGraph::from_str("1 lb", id(0), 16);
        let g2 = InputDataGraph::from_str("23 g", id(1), 16);
        let graph = g1.intersection(&g2);
        assert_eq!(graph.nodes().len(), 6);
        assert_eq!(graph.edges().len(), 6);
        let toks: TokenSet = vec![
            (Token::Literal(String::from(" ")), Occurrence(1)),
            (Token::Literal(String::from(" ")), Occurrence(-1)),
            (Token::Whitespace, Occurrence(1)),
            (Token::Whitespace, Occurrence(-1)),
        ]
        .into_iter()
        .collect();
        assert!(graph.tokens.values().any(|v| *v == toks));
    }

    #[test]
    fn new_single_column() {
        let rows = single(&["1 lb", "23 g"]);
        let refs: Vec<&Row> = rows.iter().collect();
        let graph = InputDataGraph::new(&refs, 16);
        assert_eq!(graph.nodes().len(), 6);
        assert_eq!(graph.edges().len(), 6);
        assert!(graph.covers(id(1)));
        assert!(!graph.covers(id(2)));
    }

    #[test]
    fn new_multi_column() {
        let rows = vec![
            Row::new(RowId(0), ["1 lb", "1 lb"]),
            Row::new(RowId(1), ["1 lb", "23 g"]),
        ];
        let refs: Vec<&Row> = rows.iter().collect();
        let graph = InputDataGraph::new(&refs, 16);
        assert_eq!(graph.nodes().len(), 7 + 6);
        assert_eq!(graph.edges().len(), 12 + 6);
    }

    #[test]
    fn nodes_at_finds_labels() {
        let rows = single(&["1 lb", "23 g"]);
        let refs: Vec<&Row> = rows.iter().collect();
        let graph = InputDataGraph::new(&refs, 16);
        // the space sits at index 2 in "1 lb" and index 3 in "23 g"
        let a: Vec<_> = graph.nodes_at(id(0), StringIndex(2)).collect();
        let b: Vec<_> = graph.nodes_at(id(1), StringIndex(3)).collect();
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
    }
}
