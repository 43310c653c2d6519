//! Constraints a caller places on a session, and their normalised form.

use crate::region::{ColumnIndex, RowId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The desired output for an example row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExampleOutput {
    /// The whole transformed text.
    Text(String),
    /// The ordered cells a split should produce.
    Cells(Vec<String>),
}

/// A row paired with the output the learned program must produce for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Example {
    /// The example row.
    pub row: RowId,
    /// What the program must produce for it.
    pub output: ExampleOutput,
}

impl Example {
    /// A transformation example.
    pub fn text(row: RowId, output: impl Into<String>) -> Self {
        Self {
            row,
            output: ExampleOutput::Text(output.into()),
        }
    }

    /// A split example giving every cell of the row, in order.
    pub fn cells<S: Into<String>>(row: RowId, cells: impl IntoIterator<Item = S>) -> Self {
        Self {
            row,
            output: ExampleOutput::Cells(cells.into_iter().map(Into::into).collect()),
        }
    }
}

/// Ordered tiers of columns; earlier tiers are preferred as substring sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnPriority(pub Vec<Vec<ColumnIndex>>);

impl ColumnPriority {
    /// Tier of a column, or `None` if the column is in no tier.
    pub fn tier(&self, column: ColumnIndex) -> Option<usize> {
        self.0.iter().position(|tier| tier.contains(&column))
    }
}

/// An instruction accumulated by a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constraint {
    /// An input/output example.
    Example(Example),
    /// Column preference for substring sources and split columns.
    ColumnPriority(ColumnPriority),
    /// Whether split delimiters are emitted as cells of their own.
    IncludeDelimiters(bool),
    /// Cell `index` of the split of `row` must be `text`.
    OrderedCell {
        /// The row being split.
        row: RowId,
        /// Zero-based cell index.
        index: usize,
        /// The cell's text.
        text: String,
    },
}

impl Constraint {
    /// The row a constraint refers to, if it refers to one.
    pub fn row(&self) -> Option<RowId> {
        match self {
            Constraint::Example(e) => Some(e.row),
            Constraint::OrderedCell { row, .. } => Some(*row),
            Constraint::ColumnPriority(_) | Constraint::IncludeDelimiters(_) => None,
        }
    }
}

impl From<Example> for Constraint {
    fn from(e: Example) -> Self {
        Constraint::Example(e)
    }
}

impl From<ColumnPriority> for Constraint {
    fn from(p: ColumnPriority) -> Self {
        Constraint::ColumnPriority(p)
    }
}

/// Known cells of one row's split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellExample {
    /// The row being split.
    pub row: RowId,
    /// Pinned cells by index.
    pub cells: BTreeMap<usize, String>,
}

/// The accumulated constraints of a session, folded into the shape learners consume.
///
/// Repeating an example is a no-op. Giving the same row (or the same cell of a row) two
/// different outputs marks that row as contradictory. The latest column priority and delimiter
/// flag win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    examples: Vec<(RowId, String)>,
    cells: Vec<CellExample>,
    contradictions: BTreeSet<RowId>,
    column_priority: Option<ColumnPriority>,
    include_delimiters: bool,
}

impl ConstraintSet {
    /// Folds `constraints`, in insertion order.
    pub fn new<'a>(constraints: impl IntoIterator<Item = &'a Constraint>) -> Self {
        let mut set = Self::default();
        for c in constraints {
            set.add(c);
        }
        set
    }

    fn add(&mut self, constraint: &Constraint) {
        match constraint {
            Constraint::Example(Example {
                row,
                output: ExampleOutput::Text(text),
            }) => match self.examples.iter().find(|(r, _)| r == row) {
                Some((_, existing)) if existing != text => {
                    tracing::warn!(row = row.0, "contradictory_example");
                    self.contradictions.insert(*row);
                }
                Some(_) => {}
                None => self.examples.push((*row, text.clone())),
            },
            Constraint::Example(Example {
                row,
                output: ExampleOutput::Cells(cells),
            }) => {
                for (index, text) in cells.iter().enumerate() {
                    self.add_cell(*row, index, text);
                }
            }
            Constraint::OrderedCell { row, index, text } => self.add_cell(*row, *index, text),
            Constraint::ColumnPriority(p) => self.column_priority = Some(p.clone()),
            Constraint::IncludeDelimiters(b) => self.include_delimiters = *b,
        }
    }

    fn add_cell(&mut self, row: RowId, index: usize, text: &str) {
        let pos = match self.cells.iter().position(|c| c.row == row) {
            Some(pos) => pos,
            None => {
                self.cells.push(CellExample {
                    row,
                    cells: BTreeMap::new(),
                });
                self.cells.len() - 1
            }
        };
        let entry = &mut self.cells[pos];
        match entry.cells.get(&index) {
            Some(existing) if existing != text => {
                tracing::warn!(row = row.0, index, "contradictory_cell");
                self.contradictions.insert(row);
            }
            Some(_) => {}
            None => {
                entry.cells.insert(index, String::from(text));
            }
        }
    }

    /// Text examples in insertion order.
    pub fn examples(&self) -> &[(RowId, String)] {
        &self.examples
    }

    /// Split examples in insertion order.
    pub fn cell_examples(&self) -> &[CellExample] {
        &self.cells
    }

    /// The latest column priority, if any.
    pub fn column_priority(&self) -> Option<&ColumnPriority> {
        self.column_priority.as_ref()
    }

    /// The latest delimiter flag; `false` when never given.
    pub fn include_delimiters(&self) -> bool {
        self.include_delimiters
    }

    /// Whether some row was given two different outputs.
    pub fn is_contradictory(&self) -> bool {
        !self.contradictions.is_empty()
    }

    /// Every row referenced by an example, in first-mention order.
    pub fn example_rows(&self) -> Vec<RowId> {
        let mut seen = BTreeSet::new();
        self.examples
            .iter()
            .map(|(r, _)| *r)
            .chain(self.cells.iter().map(|c| c.row))
            .filter(|r| seen.insert(*r))
            .collect()
    }

    /// The same constraints with every example for `row` removed.
    pub fn without_row(&self, row: RowId) -> Self {
        Self {
            examples: self
                .examples
                .iter()
                .filter(|(r, _)| *r != row)
                .cloned()
                .collect(),
            cells: self.cells.iter().filter(|c| c.row != row).cloned().collect(),
            contradictions: self
                .contradictions
                .iter()
                .filter(|r| **r != row)
                .cloned()
                .collect(),
            column_priority: self.column_priority.clone(),
            include_delimiters: self.include_delimiters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_examples_collapse() {
        let cs = vec![
            Constraint::from(Example::text(RowId(0), "x")),
            Constraint::from(Example::text(RowId(0), "x")),
        ];
        let set = ConstraintSet::new(&cs);
        assert_eq!(set.examples().len(), 1);
        assert!(!set.is_contradictory());
    }

    #[test]
    fn conflicting_examples_contradict() {
        let cs = vec![
            Constraint::from(Example::text(RowId(0), "X")),
            Constraint::from(Example::text(RowId(0), "Y")),
        ];
        let set = ConstraintSet::new(&cs);
        assert!(set.is_contradictory());
        assert!(!set.without_row(RowId(0)).is_contradictory());
    }

    #[test]
    fn cell_examples_merge_per_row() {
        let cs = vec![
            Constraint::OrderedCell {
                row: RowId(2),
                index: 1,
                text: String::from("b"),
            },
            Constraint::from(Example::cells(RowId(2), vec!["a", "b"])),
            Constraint::IncludeDelimiters(true),
        ];
        let set = ConstraintSet::new(&cs);
        assert_eq!(set.cell_examples().len(), 1);
        assert_eq!(set.cell_examples()[0].cells.len(), 2);
        assert!(set.include_delimiters());
        assert_eq!(set.example_rows(), vec![RowId(2)]);
    }

    #[test]
    fn latest_priority_wins() {
        let cs = vec![
            Constraint::from(ColumnPriority(vec![vec![ColumnIndex(0)]])),
            Constraint::from(ColumnPriority(vec![vec![ColumnIndex(2)]])),
        ];
        let set = ConstraintSet::new(&cs);
        assert_eq!(set.column_priority().unwrap().tier(ColumnIndex(2)), Some(0));
        assert_eq!(set.column_priority().unwrap().tier(ColumnIndex(0)), None);
    }
}
