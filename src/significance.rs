//! Which inputs mattered for the learned program.
//!
//! The significant inputs are a minimal set of inputs that still narrows learning down to the
//! chosen program. They are found greedily: each candidate is withdrawn in turn, and stays
//! withdrawn if the remaining inputs still relearn the chosen program. Whatever could not be
//! withdrawn is significant, so relearning from the significant inputs alone reproduces the
//! program.
//!
//! Withdrawing an example row removes its examples; the row itself stays among the learning
//! inputs. Withdrawing an unlabelled row drops it from the learning inputs. Candidates are the
//! example rows in first-mention order followed by the unlabelled learning inputs, and at most
//! [`SynthesisConfig::max_significance_candidates`] of them are tried. Example rows past the cap
//! count as significant; unlabelled rows past the cap do not.

use crate::budget::Budget;
use crate::config::{cap_hit, SynthesisConfig};
use crate::constraint::ConstraintSet;
use crate::region::{RowId, RowSet};
use crate::{Result, Synthesizer};
use tracing::debug;

/// The input taken away for one relearn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Withdrawal {
    /// The examples of a row. The row stays a learning input.
    Example(RowId),
    /// An unlabelled learning input.
    Input(RowId),
}

/// The significant inputs for `chosen`, in ordinal order.
pub fn significant_inputs<S: Synthesizer>(
    synthesizer: &S,
    rows: &RowSet,
    inputs: &[RowId],
    constraints: &ConstraintSet,
    config: &SynthesisConfig,
    budget: &Budget,
    chosen: &S::Program,
) -> Result<Vec<RowId>> {
    let significant =
        synthesizer.significant_inputs(rows, inputs, constraints, config, budget, chosen)?;
    debug!(significant = significant.len(), "significance_computed");
    Ok(significant)
}

/// Greedily withdraws candidates while `relearn` still finds `chosen`.
///
/// `relearn` receives the constraints and learning inputs that remain after the withdrawal it
/// is told about.
pub fn reduce<P: PartialEq>(
    constraints: &ConstraintSet,
    inputs: &[RowId],
    config: &SynthesisConfig,
    budget: &Budget,
    chosen: &P,
    mut relearn: impl FnMut(&ConstraintSet, &[RowId], Withdrawal) -> Result<Option<P>>,
) -> Result<Vec<RowId>> {
    let example_rows = constraints.example_rows();
    let unlabelled: Vec<RowId> = if config.use_inputs_in_learn {
        inputs
            .iter()
            .filter(|id| !example_rows.contains(id))
            .copied()
            .collect()
    } else {
        Vec::new()
    };
    let total = example_rows.len() + unlabelled.len();
    if total > config.max_significance_candidates {
        cap_hit!(
            config,
            candidates = total,
            cap = config.max_significance_candidates,
            "significance_candidate_cap"
        );
    }

    let mut constraints = constraints.clone();
    let mut inputs = inputs.to_vec();
    let mut significant = Vec::new();
    let mut tried = 0;
    for id in example_rows {
        if tried == config.max_significance_candidates {
            significant.push(id);
            continue;
        }
        tried += 1;
        budget.check()?;
        let reduced = constraints.without_row(id);
        let mut reduced_inputs = inputs.clone();
        reduced_inputs.push(id);
        if relearn(&reduced, &reduced_inputs, Withdrawal::Example(id))?.as_ref() == Some(chosen) {
            constraints = reduced;
            inputs = reduced_inputs;
        } else {
            significant.push(id);
        }
    }
    for id in unlabelled {
        if tried == config.max_significance_candidates {
            break;
        }
        tried += 1;
        budget.check()?;
        let reduced_inputs: Vec<RowId> = inputs.iter().copied().filter(|i| *i != id).collect();
        if relearn(&constraints, &reduced_inputs, Withdrawal::Input(id))?.as_ref() == Some(chosen)
        {
            inputs = reduced_inputs;
        } else {
            significant.push(id);
        }
    }
    significant.sort();
    Ok(significant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, Example};
    use crate::region::rows_from_column;
    use crate::transform::TransformSynthesizer;

    fn examples(rows: &[usize]) -> ConstraintSet {
        let cs: Vec<Constraint> = rows
            .iter()
            .map(|r| Example::text(RowId(*r), "x").into())
            .collect();
        ConstraintSet::new(&cs)
    }

    fn has_example(constraints: &ConstraintSet, row: usize) -> bool {
        constraints.example_rows().contains(&RowId(row))
    }

    #[test]
    fn redundant_examples_are_withdrawn_one_at_a_time() {
        let constraints = examples(&[0, 1, 2]);
        let mut seen_inputs = Vec::new();
        let significant = reduce(
            &constraints,
            &[],
            &SynthesisConfig::default(),
            &Budget::unlimited(),
            &7,
            |reduced, inputs, _| {
                seen_inputs.push(inputs.to_vec());
                Ok(has_example(reduced, 2).then_some(7))
            },
        )
        .unwrap();
        assert_eq!(significant, vec![RowId(2)]);
        // withdrawn example rows stay learning inputs
        assert_eq!(
            seen_inputs,
            vec![
                vec![RowId(0)],
                vec![RowId(0), RowId(1)],
                vec![RowId(0), RowId(1), RowId(2)],
            ]
        );
    }

    #[test]
    fn interchangeable_examples_keep_one() {
        let constraints = examples(&[0, 1]);
        let significant = reduce(
            &constraints,
            &[],
            &SynthesisConfig::default(),
            &Budget::unlimited(),
            &7,
            |reduced, _, _| Ok((!reduced.examples().is_empty()).then_some(7)),
        )
        .unwrap();
        assert_eq!(significant, vec![RowId(1)]);
    }

    #[test]
    fn candidates_are_capped() {
        let constraints = examples(&[0, 1, 2]);
        let config = SynthesisConfig {
            max_significance_candidates: 1,
            use_inputs_in_learn: true,
            ..SynthesisConfig::default()
        };
        let mut calls = 0;
        let significant = reduce(
            &constraints,
            &[RowId(3)],
            &config,
            &Budget::unlimited(),
            &7,
            |_, _, _| {
                calls += 1;
                Ok(Some(7))
            },
        )
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(significant, vec![RowId(1), RowId(2)]);
    }

    #[test]
    fn unlabelled_inputs_that_change_the_program_are_significant() {
        let constraints = examples(&[0]);
        let config = SynthesisConfig::default().with_inputs_in_learn(true);
        let significant = reduce(
            &constraints,
            &[RowId(1), RowId(2)],
            &config,
            &Budget::unlimited(),
            &7,
            |_, _, withdrawn| {
                Ok(match withdrawn {
                    Withdrawal::Input(RowId(2)) => Some(8),
                    _ => Some(7),
                })
            },
        )
        .unwrap();
        assert_eq!(significant, vec![RowId(2)]);
    }

    #[test]
    fn single_example_is_significant() {
        let mut rows = RowSet::new();
        rows.extend(rows_from_column(&["John Smith", "Jane Doe"]))
            .unwrap();
        let constraints = ConstraintSet::new(&[Constraint::from(Example::text(
            RowId(0),
            "Smith, John",
        ))]);
        let inputs = rows.sample(&constraints.example_rows(), 100);
        let config = SynthesisConfig::default();
        let budget = Budget::unlimited();
        let chosen = TransformSynthesizer
            .learn(&rows, &inputs, &constraints, &config, &budget)
            .unwrap()
            .unwrap();
        let significant = significant_inputs(
            &TransformSynthesizer,
            &rows,
            &inputs,
            &constraints,
            &config,
            &budget,
            &chosen,
        )
        .unwrap();
        assert_eq!(significant, vec![RowId(0)]);
    }
}
