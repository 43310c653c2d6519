//! Learning column splits from example cells.
//!
//! A split example pins some cells of one row's split. The witness for an example is every
//! `(column, delimiter)` pair whose split of that row reproduces the pinned cells, with literal
//! delimiters drawn from the row's own text (up to
//! [`SynthesisConfig::max_literal_token_len`] bytes) and the whitespace class. The version space
//! is that candidate set, intersected across examples; ranking prefers, in order, columns in
//! earlier priority tiers, punctuation over words, delimiters occurring in more of the learning
//! rows, delimiters giving those rows fewer distinct cell counts, and longer delimiters.

mod program;

pub use program::{Delimiter, SplitProgram};

use crate::budget::Budget;
use crate::config::{cap_hit, SynthesisConfig};
use crate::constraint::{CellExample, Constraint, ConstraintSet, ExampleOutput};
use crate::region::{ColumnIndex, Row, RowId, RowSet};
use crate::{Error, Program, Result, Synthesizer};
use std::cmp::{self, Reverse};
use std::collections::BTreeSet;
use tracing::{debug, info};

type Candidate = (ColumnIndex, Delimiter);

/// Learns a [`SplitProgram`] from ordered-cell constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitSynthesizer;

impl Synthesizer for SplitSynthesizer {
    type Program = SplitProgram;

    fn kind(&self) -> &'static str {
        "split"
    }

    fn accepts(&self, constraint: &Constraint) -> bool {
        match constraint {
            Constraint::Example(e) => matches!(e.output, ExampleOutput::Cells(_)),
            Constraint::OrderedCell { .. }
            | Constraint::IncludeDelimiters(_)
            | Constraint::ColumnPriority(_) => true,
        }
    }

    fn learn(
        &self,
        rows: &RowSet,
        inputs: &[RowId],
        constraints: &ConstraintSet,
        config: &SynthesisConfig,
        budget: &Budget,
    ) -> Result<Option<SplitProgram>> {
        let examples = constraints.cell_examples();
        if examples.is_empty() {
            debug!("split_learn_without_examples");
            return Ok(None);
        }
        if constraints.is_contradictory() {
            info!(examples = examples.len(), "split_learn_contradictory");
            return Ok(None);
        }
        let include_delimiters = constraints.include_delimiters();

        let mut space: Option<BTreeSet<Candidate>> = None;
        let mut learning_rows = Vec::new();
        for example in examples {
            budget.check()?;
            let row = rows.get(example.row).ok_or_else(|| {
                Error::precondition(format!("example refers to unknown {}", example.row))
            })?;
            learning_rows.push(row);
            let candidates = witness(row, example, include_delimiters, config, budget)?;
            let narrowed: BTreeSet<Candidate> = match space {
                None => candidates,
                Some(space) => space.intersection(&candidates).cloned().collect(),
            };
            debug!(
                row = example.row.0,
                candidates = narrowed.len(),
                "split_space_narrowed"
            );
            if narrowed.is_empty() {
                info!(row = example.row.0, "split_space_empty");
                return Ok(None);
            }
            space = Some(narrowed);
        }
        let Some(space) = space else {
            return Ok(None);
        };

        if config.use_inputs_in_learn {
            learning_rows.extend(
                inputs
                    .iter()
                    .filter(|id| examples.iter().all(|e| e.row != **id))
                    .filter_map(|id| rows.get(*id)),
            );
        }
        let best = space
            .into_iter()
            .map(|(column, delimiter)| SplitProgram {
                column,
                delimiter,
                include_delimiters,
            })
            .max_by_key(|program| score(program, &learning_rows, constraints));
        if let Some(program) = &best {
            info!(program = %program, "split_learned");
        }
        Ok(best)
    }
}

/// Every candidate whose split of `row` agrees with the example's pinned cells, at most
/// [`SynthesisConfig::max_atoms_per_segment`] of them.
fn witness(
    row: &Row,
    example: &CellExample,
    include_delimiters: bool,
    config: &SynthesisConfig,
    budget: &Budget,
) -> Result<BTreeSet<Candidate>> {
    let mut result = BTreeSet::new();
    for (ci, cell) in row.cells().iter().enumerate() {
        let column = ColumnIndex(ci);
        let text = cell.value();
        let mut delimiters: BTreeSet<Delimiter> = BTreeSet::new();
        if !Delimiter::Whitespace.occurrences(text).is_empty() {
            delimiters.insert(Delimiter::Whitespace);
        }
        for (left, _) in text.char_indices() {
            let longest = cmp::min(text.len(), left + config.max_literal_token_len);
            for right in (left + 1..=longest).filter(|r| text.is_char_boundary(*r)) {
                delimiters.insert(Delimiter::Literal(String::from(&text[left..right])));
            }
        }
        for delimiter in delimiters {
            budget.check()?;
            let program = SplitProgram {
                column,
                delimiter,
                include_delimiters,
            };
            let cells = program.split(text);
            let consistent = example
                .cells
                .iter()
                .all(|(index, want)| cells.get(*index) == Some(want));
            if !consistent {
                continue;
            }
            if result.len() == config.max_atoms_per_segment {
                cap_hit!(config, row = row.id().0, "split_witness_cap");
                return Ok(result);
            }
            result.insert((column, program.delimiter));
        }
    }
    Ok(result)
}

type Score = (Reverse<usize>, bool, usize, Reverse<usize>, usize, Reverse<String>);

fn score(program: &SplitProgram, rows: &[&Row], constraints: &ConstraintSet) -> Score {
    let tier = constraints
        .column_priority()
        .and_then(|p| p.tier(program.column))
        .unwrap_or(usize::MAX);
    let mut coverage = 0;
    let mut shapes = BTreeSet::new();
    for row in rows {
        if let Some(text) = row.text(program.column) {
            let n = program.delimiter.occurrences(text).len();
            if n > 0 {
                coverage += 1;
            }
            shapes.insert(n);
        }
    }
    let len = match &program.delimiter {
        Delimiter::Literal(d) => d.chars().count(),
        Delimiter::Whitespace => 1,
    };
    (
        Reverse(tier),
        program.delimiter.is_punctuation(),
        coverage,
        Reverse(shapes.len()),
        len,
        Reverse(program.to_string()),
    )
}

impl Program for SplitProgram {
    type Output = Vec<String>;
    type Aligned = Vec<Option<String>>;

    fn run(&self, row: &Row) -> Option<Vec<String>> {
        self.eval(row)
    }

    /// Pads every row to the widest row's cell count; rows that could not be split are all
    /// `None`.
    fn align(outputs: Vec<Option<Vec<String>>>) -> Vec<Vec<Option<String>>> {
        let width = outputs
            .iter()
            .flatten()
            .map(Vec::len)
            .max()
            .unwrap_or(0);
        outputs
            .into_iter()
            .map(|cells| {
                let mut cells: Vec<Option<String>> =
                    cells.into_iter().flatten().map(Some).collect();
                cells.resize(width, None);
                cells
            })
            .collect()
    }

    fn describe(&self) -> String {
        SplitProgram::describe(self)
    }

    fn to_python(&self) -> String {
        SplitProgram::to_python(self)
    }
}

impl crate::private::Sealed for SplitProgram {}
impl crate::private::Sealed for SplitSynthesizer {}
