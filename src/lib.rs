//! Learning programs from examples.
//!
//! This crate learns small programs from a handful of worked examples, in the style of the [Flash
//! Fill](https://support.microsoft.com/en-us/office/using-flash-fill-in-excel-3f9bcf1e-db93-4890-94a0-1578341f73f7)
//! feature in Excel. Two kinds of program are supported:
//!
//! - [text transformations](transform), which turn a row of columns into a single string, and
//! - [column splits](split), which cut one column into an ordered list of cells.
//!
//! Unlabelled rows take part in learning too: a transformation only relies on structure that
//! every sampled row shares, so it tends to generalise to them.
//!
//! For example, a transformation can capture the table below from its first two rows:
//!
//! | Name | Graduation Year | Output |
//! |---|---|---|
//! | Alyssa P. Hacker | 1985 | A. Hacker '85 |
//! | Ben Bitdiddle | 2002 | B. Bitdiddle '02 |
//! | Cy D. Fect | 2017 | ? |
//!
//! A [`Session`] accumulates rows and constraints, learns, and then applies, describes and
//! serializes the learned program:
//!
//! ```
//! use exemplar::{rows_from_records, Example, Format, RowId, Session, TransformSynthesizer};
//!
//! # fn main() -> exemplar::Result<()> {
//! let rows = rows_from_records(&[
//!     vec!["Alyssa P. Hacker", "1985"],
//!     vec!["Ben Bitdiddle", "2002"],
//!     vec!["Cy D. Fect", "2017"],
//! ])?;
//!
//! let mut session = Session::new(TransformSynthesizer);
//! session.add_inputs(rows)?;
//! session.add_constraints([
//!     Example::text(RowId(0), "A. Hacker '85"),
//!     Example::text(RowId(1), "B. Bitdiddle '02"),
//! ])?;
//!
//! // learning may find no program, which is not an error
//! let result = session.learn()?;
//! assert!(result.program.is_some());
//!
//! // running a program may fail on a particular row, giving `None`
//! let outputs = session.run_all()?;
//! assert_eq!(outputs[2].as_deref(), Some("C. Fect '17"));
//!
//! let json = session.serialize(Format::Json)?;
//! assert!(json.starts_with('['));
//! # Ok(())
//! # }
//! ```
//!
//! Learning is bounded by the caps in [`SynthesisConfig`] and can be abandoned through a
//! [`CancellationToken`].

#![warn(missing_docs)]

pub mod budget;
pub mod cache;
pub mod config;
pub mod constraint;
pub mod error;
mod graph;
pub mod region;
pub mod serialize;
pub mod session;
pub mod significance;
pub mod split;
pub mod transform;

pub use budget::{Budget, CancellationToken};
pub use cache::{LearnCache, LearnKey, MemoryCache};
pub use config::SynthesisConfig;
pub use constraint::{ColumnPriority, Constraint, ConstraintSet, Example, ExampleOutput};
pub use error::{Error, Result};
pub use region::{rows_from_column, rows_from_records, ColumnIndex, Region, Row, RowId, RowSet};
pub use serialize::Format;
pub use session::{LearnResult, Report, Session, SessionState};
pub use split::{Delimiter, SplitProgram, SplitSynthesizer};
pub use transform::language::TransformProgram;
pub use transform::TransformSynthesizer;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// A learned program.
///
/// The [`Display`](fmt::Display) form is the human-readable rendering of the program. This trait
/// is sealed and not meant to be implemented outside this crate.
pub trait Program:
    private::Sealed + Clone + PartialEq + fmt::Debug + fmt::Display + Serialize + DeserializeOwned
{
    /// What the program produces for one row.
    type Output: Clone + PartialEq + fmt::Debug + Serialize;

    /// One row's output once the outputs of many rows are lined up.
    type Aligned: Clone + PartialEq + fmt::Debug + Serialize;

    /// Runs the program on a row.
    ///
    /// Programs are not written by hand but inferred from examples, so a row lacking the
    /// structure the program relies on (a third word when it has only two, say) simply yields
    /// `None` rather than a detailed error.
    fn run(&self, row: &Row) -> Option<Self::Output>;

    /// Lines up the outputs of several rows, in order.
    fn align(outputs: Vec<Option<Self::Output>>) -> Vec<Self::Aligned>;

    /// A short English explanation of what the program does.
    fn describe(&self) -> String;

    /// A standalone Python script implementing the program.
    fn to_python(&self) -> String;
}

/// A learner for one kind of [`Program`].
///
/// This trait is sealed and not meant to be implemented outside this crate.
pub trait Synthesizer: private::Sealed {
    /// The kind of program learned.
    type Program: Program;

    /// A stable name for the kind of program, used in cache keys.
    fn kind(&self) -> &'static str;

    /// Whether constraints of this shape mean anything to this learner.
    fn accepts(&self, constraint: &Constraint) -> bool;

    /// Learns the best program consistent with `constraints`.
    ///
    /// `inputs` are rows without examples that may shape learning. `Ok(None)` means no consistent
    /// program was found, including when a resource cap was hit.
    fn learn(
        &self,
        rows: &RowSet,
        inputs: &[RowId],
        constraints: &ConstraintSet,
        config: &SynthesisConfig,
        budget: &Budget,
    ) -> Result<Option<Self::Program>>;

    /// The inputs `chosen` depends on, in ordinal order; see [`significance`].
    ///
    /// The default relearns from scratch for every candidate.
    fn significant_inputs(
        &self,
        rows: &RowSet,
        inputs: &[RowId],
        constraints: &ConstraintSet,
        config: &SynthesisConfig,
        budget: &Budget,
        chosen: &Self::Program,
    ) -> Result<Vec<RowId>> {
        significance::reduce(
            constraints,
            inputs,
            config,
            budget,
            chosen,
            |constraints, inputs, _| self.learn(rows, inputs, constraints, config, budget),
        )
    }
}

mod private {
    pub trait Sealed {}
}
