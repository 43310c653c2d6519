//! Witness functions: from a desired output segment back to every atom that produces it.
//!
//! Witnesses are exact. Every atom they describe evaluates to the requested segment on the input
//! it was learned from. They are incomplete only where a cap applies: literal tokens longer than
//! the configured length are never anchors, and a segment yields at most
//! [`SynthesisConfig::max_atoms_per_segment`] atom sets.

use super::input_graph::{Id, InputDataGraph, Node};
use super::language::{Case, Occurrence, StringIndex, ALL_CASES};
#[cfg(test)]
use super::language::{Atom, Direction, Position};
use crate::config::{cap_hit, SynthesisConfig};
use crate::region::{ColumnIndex, Row};
use std::collections::BTreeSet;

/// A set of positions, all denoting the same index in the inputs they were learned from.
#[derive(Debug, PartialEq, Eq, Clone, PartialOrd, Ord)]
pub enum PositionSet {
    /// A fixed index.
    ConstantPosition(Occurrence),
    /// Every position an input data graph node stands for.
    GraphNode(Node),
}

/// A compact set of atoms sharing a shape.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AtomSet {
    /// Fixed text.
    ConstantString(String),
    /// Substrings of a column between any left and any right position.
    SubstringSet(ColumnIndex, BTreeSet<PositionSet>, BTreeSet<PositionSet>),
    /// Case-converted substrings of a column.
    CaseSet(
        Case,
        ColumnIndex,
        BTreeSet<PositionSet>,
        BTreeSet<PositionSet>,
    ),
}

use AtomSet::*;
use PositionSet::*;

/// Witness for the constant operation: the segment itself.
pub fn constant(segment: &str) -> AtomSet {
    ConstantString(String::from(segment))
}

/// Witness for substring extraction: one set per occurrence of `segment` in any column of `row`,
/// overlapping occurrences included.
pub fn substrings(
    row: &Row,
    segment: &str,
    graph: &InputDataGraph,
    config: &SynthesisConfig,
) -> Vec<AtomSet> {
    let mut sets = Vec::new();
    for (ci, cell) in row.cells().iter().enumerate() {
        let col = ColumnIndex(ci);
        let id = Id::new(row.id(), col);
        for l in occurrences(cell.value(), segment) {
            if sets.len() >= config.max_atoms_per_segment {
                cap_hit!(config, row = row.id().0, segment, "substring_witness_cap");
                return sets;
            }
            let (p_l, p_r) = position_sets(id, l, l + segment.len(), cell.len(), graph);
            sets.push(SubstringSet(col, p_l, p_r));
        }
    }
    sets
}

/// Witness for case conversion: substrings whose converted form is `segment` but whose
/// original form is not, since those are already covered by [`substrings`].
pub fn case_converted(
    row: &Row,
    segment: &str,
    graph: &InputDataGraph,
    config: &SynthesisConfig,
) -> Vec<AtomSet> {
    let mut sets = Vec::new();
    if !segment.chars().any(char::is_alphabetic) {
        return sets;
    }
    for case in ALL_CASES {
        if case.apply(segment) != segment {
            continue;
        }
        for (ci, cell) in row.cells().iter().enumerate() {
            let col = ColumnIndex(ci);
            let id = Id::new(row.id(), col);
            let text = cell.value();
            let converted = case.apply(text);
            for l in occurrences(&converted, segment) {
                let r = l + segment.len();
                // converted text keeps byte offsets, so l..r are boundaries of `text` too
                if text.get(l..r) == Some(segment) {
                    continue;
                }
                if sets.len() >= config.max_atoms_per_segment {
                    cap_hit!(config, row = row.id().0, segment, "case_witness_cap");
                    return sets;
                }
                let (p_l, p_r) = position_sets(id, l, r, cell.len(), graph);
                sets.push(CaseSet(*case, col, p_l, p_r));
            }
        }
    }
    sets
}

/// Byte offsets of every occurrence of `needle` in `haystack`, including overlapping ones.
fn occurrences<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    haystack
        .char_indices()
        .map(|(i, _)| i)
        .filter(move |i| !needle.is_empty() && haystack[*i..].starts_with(needle))
}

/// Position sets for the byte range `l..r` of an input of length `len`.
fn position_sets(
    id: Id,
    l: usize,
    r: usize,
    len: usize,
    graph: &InputDataGraph,
) -> (BTreeSet<PositionSet>, BTreeSet<PositionSet>) {
    let (l, r) = (StringIndex(l + 1), StringIndex(r + 1));
    let mut v_l: BTreeSet<PositionSet> = graph.nodes_at(id, l).map(GraphNode).collect();
    let mut v_r: BTreeSet<PositionSet> = graph.nodes_at(id, r).map(GraphNode).collect();
    for (index, set) in [(l, &mut v_l), (r, &mut v_r)] {
        set.insert(ConstantPosition(Occurrence(index.0 as isize)));
        set.insert(ConstantPosition(Occurrence(
            index.0 as isize - len as isize - 1,
        )));
    }
    (v_l, v_r)
}

impl AtomSet {
    /// The atoms in both sets, or `None` if there are none.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (ConstantString(s1), ConstantString(s2)) if s1 == s2 => {
                Some(ConstantString(s1.clone()))
            }
            (SubstringSet(c1, p1_l, p1_r), SubstringSet(c2, p2_l, p2_r)) if c1 == c2 => {
                let (p_l, p_r) = intersect_positions(p1_l, p1_r, p2_l, p2_r)?;
                Some(SubstringSet(*c1, p_l, p_r))
            }
            (CaseSet(k1, c1, p1_l, p1_r), CaseSet(k2, c2, p2_l, p2_r)) if k1 == k2 && c1 == c2 => {
                let (p_l, p_r) = intersect_positions(p1_l, p1_r, p2_l, p2_r)?;
                Some(CaseSet(*k1, *c1, p_l, p_r))
            }
            _ => None,
        }
    }

    /// Every concrete atom this set stands for.
    #[cfg(test)]
    pub fn denote(&self, graph: &InputDataGraph) -> BTreeSet<Atom> {
        let mut set = BTreeSet::new();
        match self {
            ConstantString(s) => {
                set.insert(Atom::ConstantString(s.clone()));
            }
            SubstringSet(ci, p_l, p_r) | CaseSet(_, ci, p_l, p_r) => {
                for p_l in p_l.iter().flat_map(|p| p.denote(graph)) {
                    for p_r in p_r.iter().flat_map(|p| p.denote(graph)) {
                        set.insert(match self {
                            CaseSet(case, ..) => Atom::CaseConvert(*case, *ci, p_l.clone(), p_r),
                            _ => Atom::Substring(*ci, p_l.clone(), p_r),
                        });
                    }
                }
            }
        }
        set
    }
}

fn intersect_positions(
    p1_l: &BTreeSet<PositionSet>,
    p1_r: &BTreeSet<PositionSet>,
    p2_l: &BTreeSet<PositionSet>,
    p2_r: &BTreeSet<PositionSet>,
) -> Option<(BTreeSet<PositionSet>, BTreeSet<PositionSet>)> {
    let p_l: BTreeSet<_> = p1_l.intersection(p2_l).cloned().collect();
    if p_l.is_empty() {
        return None;
    }
    let p_r: BTreeSet<_> = p1_r.intersection(p2_r).cloned().collect();
    if p_r.is_empty() {
        return None;
    }
    Some((p_l, p_r))
}

impl PositionSet {
    /// Every concrete position this set stands for.
    #[cfg(test)]
    pub fn denote(&self, graph: &InputDataGraph) -> BTreeSet<Position> {
        let mut set = BTreeSet::new();
        match self {
            ConstantPosition(k) => {
                set.insert(Position::ConstantPosition(*k));
            }
            GraphNode(v) => {
                for ((vs, vf), tok_occs) in &graph.tokens {
                    if vs == v {
                        for (tok, occ) in tok_occs {
                            set.insert(Position::Match(tok.clone(), *occ, Direction::Start));
                        }
                    } else if vf == v {
                        for (tok, occ) in tok_occs {
                            set.insert(Position::Match(tok.clone(), *occ, Direction::End));
                        }
                    }
                }
            }
        }
        set
    }
}
