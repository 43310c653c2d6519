//! Learning text transformations from input-output examples.
//!
//! This module implements the BlinkFill algorithm, described in the paper [BlinkFill:
//! Semi-supervised Programming By Example for Syntactic String
//! Transformations](http://www.vldb.org/pvldb/vol9/p816-singh.pdf), extended with letter-case
//! conversion.
//!
//! Learning runs in four steps:
//!
//! 1. An [input data graph](input_graph) is built over the example inputs and, optionally, a
//!    sample of the other inputs. Its nodes are positions that every one of those inputs shares,
//!    so positions anchored to it generalise to the unlabelled rows.
//! 2. For each example, the [witness functions](witness) decompose the output into segments and
//!    list every atom producing each segment. The result is that example's
//!    [version space](version_space).
//! 3. The per-example spaces are intersected, smallest first.
//! 4. The [ranker](ranking) picks the best path through the intersection.

pub mod input_graph;
pub mod language;
pub mod ranking;
pub mod token;
pub mod translate;
pub mod version_space;
pub mod witness;

use crate::budget::Budget;
use crate::config::SynthesisConfig;
use crate::constraint::{Constraint, ConstraintSet, ExampleOutput};
use crate::region::{Row, RowId, RowSet};
use crate::significance::{self, Withdrawal};
use crate::{Error, Program, Result, Synthesizer};
use input_graph::InputDataGraph;
use language::TransformProgram;
use ranking::Ranker;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use version_space::VersionSpace;

/// Learns a [`TransformProgram`] from text examples.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformSynthesizer;

impl Synthesizer for TransformSynthesizer {
    type Program = TransformProgram;

    fn kind(&self) -> &'static str {
        "transform"
    }

    fn accepts(&self, constraint: &Constraint) -> bool {
        match constraint {
            Constraint::Example(e) => matches!(e.output, ExampleOutput::Text(_)),
            Constraint::ColumnPriority(_) => true,
            Constraint::IncludeDelimiters(_) | Constraint::OrderedCell { .. } => false,
        }
    }

    fn learn(
        &self,
        rows: &RowSet,
        inputs: &[RowId],
        constraints: &ConstraintSet,
        config: &SynthesisConfig,
        budget: &Budget,
    ) -> Result<Option<TransformProgram>> {
        let examples = constraints.examples();
        if examples.is_empty() {
            debug!("transform_learn_without_examples");
            return Ok(None);
        }
        if constraints.is_contradictory() {
            info!(examples = examples.len(), "transform_learn_contradictory");
            return Ok(None);
        }
        let (example_rows, graph_rows) = learning_rows(rows, inputs, examples, config)?;
        debug!(
            examples = examples.len(),
            inputs = graph_rows.len(),
            "transform_learn_start"
        );
        budget.check()?;
        let graph = InputDataGraph::new(&graph_rows, config.max_literal_token_len);

        let mut spaces = Vec::with_capacity(examples.len());
        for (row, (_, output)) in example_rows.iter().zip(examples) {
            budget.check()?;
            match VersionSpace::learn(row, output, &graph, config, budget)? {
                Some(space) => spaces.push(space),
                None => {
                    info!(row = row.id().0, "transform_example_unlearnable");
                    return Ok(None);
                }
            }
        }
        let pairs: Vec<(&Row, &str)> = example_rows
            .iter()
            .zip(examples)
            .map(|(row, (_, output))| (*row, output.as_str()))
            .collect();
        let program = best_program(
            &graph,
            &graph_rows,
            &pairs,
            spaces.iter().collect(),
            constraints,
            config,
            budget,
        )?;
        if let Some(program) = &program {
            info!(atoms = program.atoms().len(), "transform_learned");
        }
        Ok(program)
    }

    /// Reuses each example's version space across the relearns. Withdrawing an example keeps
    /// the input data graph of the full learn and intersects the remaining spaces.
    fn significant_inputs(
        &self,
        rows: &RowSet,
        inputs: &[RowId],
        constraints: &ConstraintSet,
        config: &SynthesisConfig,
        budget: &Budget,
        chosen: &TransformProgram,
    ) -> Result<Vec<RowId>> {
        let examples = constraints.examples();
        let (example_rows, graph_rows) = learning_rows(rows, inputs, examples, config)?;
        let graph = InputDataGraph::new(&graph_rows, config.max_literal_token_len);
        let mut spaces = BTreeMap::new();
        for (row, (_, output)) in example_rows.iter().zip(examples) {
            budget.check()?;
            if let Some(space) = VersionSpace::learn(row, output, &graph, config, budget)? {
                spaces.insert(row.id(), space);
            }
        }

        significance::reduce(
            constraints,
            inputs,
            config,
            budget,
            chosen,
            |reduced, reduced_inputs, withdrawn| match withdrawn {
                Withdrawal::Example(_) => {
                    if reduced.is_contradictory() {
                        return Ok(None);
                    }
                    let mut pairs = Vec::new();
                    let mut kept = Vec::new();
                    for (id, output) in reduced.examples() {
                        let (Some(row), Some(space)) = (rows.get(*id), spaces.get(id)) else {
                            return Ok(None);
                        };
                        pairs.push((row, output.as_str()));
                        kept.push(space);
                    }
                    best_program(&graph, &graph_rows, &pairs, kept, reduced, config, budget)
                }
                Withdrawal::Input(_) => self.learn(rows, reduced_inputs, reduced, config, budget),
            },
        )
    }
}

/// The example rows in example order, and the rows the input data graph is built from in
/// ordinal order.
fn learning_rows<'r>(
    rows: &'r RowSet,
    inputs: &[RowId],
    examples: &[(RowId, String)],
    config: &SynthesisConfig,
) -> Result<(Vec<&'r Row>, Vec<&'r Row>)> {
    let example_rows = examples
        .iter()
        .map(|(id, _)| {
            rows.get(*id)
                .ok_or_else(|| Error::precondition(format!("example refers to unknown {}", id)))
        })
        .collect::<Result<Vec<&Row>>>()?;
    let mut graph_rows = example_rows.clone();
    if config.use_inputs_in_learn {
        graph_rows.extend(inputs.iter().filter_map(|id| rows.get(*id)));
    }
    graph_rows.sort_by_key(|row| row.id());
    graph_rows.dedup_by_key(|row| row.id());
    Ok((example_rows, graph_rows))
}

/// Intersects the example spaces smallest first, ranks the result and checks the winner against
/// every example.
fn best_program(
    graph: &InputDataGraph,
    graph_rows: &[&Row],
    examples: &[(&Row, &str)],
    mut spaces: Vec<&VersionSpace>,
    constraints: &ConstraintSet,
    config: &SynthesisConfig,
    budget: &Budget,
) -> Result<Option<TransformProgram>> {
    // smallest first keeps intermediate products small
    spaces.sort_by_key(|space| space.edge_count());
    let Some((first, rest)) = spaces.split_first() else {
        return Ok(None);
    };
    let mut intersected: Option<VersionSpace> = None;
    for other in rest {
        let space = intersected.as_ref().unwrap_or(*first);
        match space.intersection(other, config, budget)? {
            Some(next) => intersected = Some(next),
            None => {
                info!(examples = examples.len(), "transform_intersection_empty");
                return Ok(None);
            }
        }
    }
    let space = intersected.as_ref().unwrap_or(*first);
    debug!(
        nodes = space.node_count(),
        edges = space.edge_count(),
        "transform_space_intersected"
    );

    let ranker = Ranker::new(graph, graph_rows, constraints.column_priority());
    let Some(program) = ranker.top_program(space) else {
        info!("transform_no_ranked_program");
        return Ok(None);
    };
    for (row, output) in examples {
        if program.eval(row).as_deref() != Some(*output) {
            warn!(row = row.id().0, "transform_round_trip_mismatch");
            return Ok(None);
        }
    }
    Ok(Some(program))
}

impl Program for TransformProgram {
    type Output = String;
    type Aligned = Option<String>;

    fn run(&self, row: &Row) -> Option<String> {
        self.eval(row)
    }

    fn align(outputs: Vec<Option<String>>) -> Vec<Option<String>> {
        outputs
    }

    fn describe(&self) -> String {
        translate::describe(self)
    }

    fn to_python(&self) -> String {
        translate::to_python(self)
    }
}

impl crate::private::Sealed for TransformProgram {}
impl crate::private::Sealed for TransformSynthesizer {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{ColumnPriority, Example};
    use crate::region::{rows_from_column, rows_from_records, ColumnIndex};

    fn learn(rows: Vec<Row>, constraints: &[Constraint]) -> Option<TransformProgram> {
        let mut set = RowSet::new();
        set.extend(rows).unwrap();
        let constraints = ConstraintSet::new(constraints);
        let inputs = set.sample(&constraints.example_rows(), 100);
        TransformSynthesizer
            .learn(
                &set,
                &inputs,
                &constraints,
                &SynthesisConfig::default(),
                &Budget::unlimited(),
            )
            .unwrap()
    }

    #[test]
    fn learns_from_one_example() {
        let rows = rows_from_column(&["John Smith", "Jane Doe"]);
        let program = learn(
            rows.clone(),
            &[Example::text(RowId(0), "Smith, John").into()],
        )
        .unwrap();
        assert_eq!(program.run(&rows[1]).unwrap(), "Doe, Jane");
    }

    #[test]
    fn learns_across_columns() {
        // the example from the BlinkFill paper's introduction
        let rows = rows_from_records(&[
            vec!["Alyssa P. Hacker", "1985"],
            vec!["Ben Bitdiddle", "2002"],
            vec!["Cy D. Fect", "2017"],
        ])
        .unwrap();
        let program = learn(
            rows.clone(),
            &[
                Example::text(RowId(0), "A. Hacker '85").into(),
                Example::text(RowId(1), "B. Bitdiddle '02").into(),
            ],
        )
        .unwrap();
        assert_eq!(program.run(&rows[2]).unwrap(), "C. Fect '17");
    }

    #[test]
    fn upper_cases_a_word() {
        let rows = rows_from_column(&["john smith", "jane doe"]);
        let program = learn(rows.clone(), &[Example::text(RowId(0), "SMITH").into()]).unwrap();
        assert_eq!(program.run(&rows[1]).unwrap(), "DOE");
    }

    #[test]
    fn column_priority_picks_the_source() {
        let rows = rows_from_records(&[vec!["abc", "abc"], vec!["xyz", "def"]]).unwrap();
        let program = learn(
            rows.clone(),
            &[
                ColumnPriority(vec![vec![ColumnIndex(1)], vec![ColumnIndex(0)]]).into(),
                Example::text(RowId(0), "abc").into(),
            ],
        )
        .unwrap();
        assert_eq!(program.run(&rows[1]).unwrap(), "def");
    }

    #[test]
    fn zero_examples_learn_nothing() {
        assert_eq!(learn(rows_from_column(&["a"]), &[]), None);
    }

    #[test]
    fn contradictory_examples_learn_nothing() {
        let program = learn(
            rows_from_column(&["abc"]),
            &[
                Example::text(RowId(0), "X").into(),
                Example::text(RowId(0), "Y").into(),
            ],
        );
        assert_eq!(program, None);
    }

    #[test]
    fn significance_reuses_spaces_and_agrees_with_relearning() {
        let mut set = RowSet::new();
        set.extend(rows_from_column(&["John Smith", "Jane Doe", "Ann Lee"]))
            .unwrap();
        let constraints = ConstraintSet::new(&[
            Constraint::from(Example::text(RowId(0), "Smith, John")),
            Constraint::from(Example::text(RowId(1), "Doe, Jane")),
        ]);
        let config = SynthesisConfig::default().with_inputs_in_learn(true);
        let budget = Budget::unlimited();
        let inputs = set.sample(&constraints.example_rows(), 100);
        let chosen = TransformSynthesizer
            .learn(&set, &inputs, &constraints, &config, &budget)
            .unwrap()
            .unwrap();

        let reused = TransformSynthesizer
            .significant_inputs(&set, &inputs, &constraints, &config, &budget, &chosen)
            .unwrap();
        let relearned = significance::reduce(
            &constraints,
            &inputs,
            &config,
            &budget,
            &chosen,
            |reduced, reduced_inputs, _| {
                TransformSynthesizer.learn(&set, reduced_inputs, reduced, &config, &budget)
            },
        )
        .unwrap();
        assert_eq!(reused, relearned);
        assert!(!reused.is_empty());
    }

    #[test]
    fn unknown_example_row_is_a_precondition_error() {
        let mut set = RowSet::new();
        set.extend(rows_from_column(&["a"])).unwrap();
        let constraints = ConstraintSet::new(&[Constraint::from(Example::text(RowId(9), "a"))]);
        let result = TransformSynthesizer.learn(
            &set,
            &[],
            &constraints,
            &SynthesisConfig::default(),
            &Budget::unlimited(),
        );
        assert!(matches!(result, Err(Error::Precondition(_))));
    }
}
