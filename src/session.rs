//! The stateful front door: accumulate rows and constraints, learn, then use the program.
//!
//! A session moves through [`SessionState`]s. Adding rows or constraints is always allowed and
//! drops the session back out of [`SessionState::Learned`]; running, describing and serializing
//! require a program learned from the current rows and constraints.
//!
//! Learning is memoised: while nothing has been added since, [`Session::learn`] returns the
//! previous result without searching again. An injected [`LearnCache`] shares results between
//! sessions with identical rows, constraints and configuration.

use crate::budget::{Budget, CancellationToken};
use crate::cache::{LearnCache, LearnKey};
use crate::config::SynthesisConfig;
use crate::constraint::{Constraint, ConstraintSet};
use crate::region::{Row, RowId, RowSet};
use crate::serialize::{self, Format, ALL_FORMATS};
use crate::significance::significant_inputs;
use crate::{Error, Program, Result, Synthesizer};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    /// Nothing has been added.
    Empty,
    /// Rows have been added, but no constraints.
    InputsRegistered,
    /// Constraints have been added since the last learn.
    ConstraintsAccumulating,
    /// The current rows and constraints have been learned from.
    Learned,
}

/// The outcome of a learn call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnResult<P> {
    /// The best program, or `None` if no program is consistent with every example.
    pub program: Option<P>,
    /// Inputs whose removal would change the program, in ordinal order.
    pub significant_inputs: Vec<RowId>,
    /// An English explanation of the program.
    pub description: Option<String>,
    /// The program in every [`Format`].
    pub serializations: Vec<(Format, String)>,
}

impl<P> LearnResult<P> {
    fn empty() -> Self {
        Self {
            program: None,
            significant_inputs: Vec::new(),
            description: None,
            serializations: Vec::new(),
        }
    }

    /// The program serialized as `format`, if a program was learned.
    pub fn serialization(&self, format: Format) -> Option<&str> {
        self.serializations
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, s)| s.as_str())
    }
}

/// A response body for a learn request.
///
/// When no program was learned every field is empty, exactly as for a program that produced no
/// output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report<A> {
    /// The program's output for every row, aligned.
    pub output: Vec<A>,
    /// See [`LearnResult::significant_inputs`].
    pub significant_inputs: Vec<RowId>,
    /// See [`LearnResult::description`].
    pub description: Option<String>,
    /// The program as [`Format::HumanReadable`].
    pub program_human_readable: Option<String>,
    /// The program as [`Format::Json`].
    pub program_json: Option<String>,
    /// The program as [`Format::Python`].
    pub program_python: Option<String>,
}

type SharedCache<P> = Arc<dyn LearnCache<LearnResult<P>>>;

/// Accumulates rows and constraints for one synthesis request and drives learning.
///
/// A session is meant for one caller at a time.
pub struct Session<S: Synthesizer> {
    synthesizer: S,
    config: SynthesisConfig,
    token: CancellationToken,
    rows: RowSet,
    constraints: Vec<Constraint>,
    state: SessionState,
    learned: Option<(LearnKey, LearnResult<S::Program>)>,
    cache: Option<SharedCache<S::Program>>,
}

impl<S: Synthesizer> Session<S> {
    /// An empty session learning with `synthesizer` under the default configuration.
    pub fn new(synthesizer: S) -> Self {
        Self {
            synthesizer,
            config: SynthesisConfig::default(),
            token: CancellationToken::new(),
            rows: RowSet::new(),
            constraints: Vec::new(),
            state: SessionState::Empty,
            learned: None,
            cache: None,
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: SynthesisConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares learn results through `cache`.
    pub fn with_cache(mut self, cache: SharedCache<S::Program>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Abandons learning once `token` is cancelled.
    ///
    /// A cancelled token stays cancelled, so every later [`learn`](Self::learn) fails with
    /// [`Error::Cancelled`] until a fresh token is installed with
    /// [`set_cancellation`](Self::set_cancellation).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Installs `token` for subsequent learn calls, replacing the current one.
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.token = token;
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The configuration learning runs under.
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Every row added so far.
    pub fn rows(&self) -> &RowSet {
        &self.rows
    }

    /// Every constraint added so far, in insertion order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Registers more rows. Rows are rejected as a whole if any id repeats or the column
    /// counts differ.
    pub fn add_inputs(&mut self, rows: impl IntoIterator<Item = Row>) -> Result<()> {
        self.rows.extend(rows)?;
        self.touch();
        Ok(())
    }

    /// Appends constraints. They are rejected as a whole if any refers to an unknown row or is
    /// of a kind this session's synthesizer does not learn from.
    pub fn add_constraints<C: Into<Constraint>>(
        &mut self,
        constraints: impl IntoIterator<Item = C>,
    ) -> Result<()> {
        let constraints: Vec<Constraint> = constraints.into_iter().map(Into::into).collect();
        for c in &constraints {
            if !self.synthesizer.accepts(c) {
                return Err(Error::precondition(format!(
                    "{} learning does not accept {:?}",
                    self.synthesizer.kind(),
                    c
                )));
            }
            if let Some(row) = c.row() {
                if !self.rows.contains(row) {
                    return Err(Error::precondition(format!(
                        "constraint refers to unknown {}",
                        row
                    )));
                }
            }
        }
        self.constraints.extend(constraints);
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.state = if !self.constraints.is_empty() {
            SessionState::ConstraintsAccumulating
        } else if !self.rows.is_empty() {
            SessionState::InputsRegistered
        } else {
            SessionState::Empty
        };
    }

    /// Learns a program from the current rows and constraints.
    ///
    /// Finding no program is not an error; see [`LearnResult::program`]. Errors are
    /// [`Error::Cancelled`] when the session's cancellation token is raised or the configured
    /// timeout passes, in which case the session is left as it was.
    pub fn learn(&mut self) -> Result<LearnResult<S::Program>> {
        let key = LearnKey::new(
            self.synthesizer.kind(),
            &self.rows,
            &self.constraints,
            &self.config,
        )?;
        if let Some((learned_key, result)) = &self.learned {
            if *learned_key == key {
                debug!(key = ?key, "learn_memo_hit");
                self.state = SessionState::Learned;
                return Ok(result.clone());
            }
        }
        if let Some(result) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            debug!(key = ?key, "learn_cache_hit");
            self.learned = Some((key, result.clone()));
            self.state = SessionState::Learned;
            return Ok(result);
        }

        let result = self.compute()?;
        if let Some(cache) = &self.cache {
            cache.put(key, result.clone());
        }
        self.learned = Some((key, result.clone()));
        self.state = SessionState::Learned;
        Ok(result)
    }

    fn compute(&self) -> Result<LearnResult<S::Program>> {
        let constraints = ConstraintSet::new(&self.constraints);
        let budget = Budget::new(self.token.clone(), self.config.learn_timeout);
        let inputs = self
            .rows
            .sample(&constraints.example_rows(), self.config.max_learn_inputs);
        info!(
            kind = self.synthesizer.kind(),
            rows = self.rows.len(),
            constraints = self.constraints.len(),
            "learn_start"
        );
        let program =
            self.synthesizer
                .learn(&self.rows, &inputs, &constraints, &self.config, &budget)?;
        let Some(program) = program else {
            info!(kind = self.synthesizer.kind(), "learn_no_program");
            return Ok(LearnResult::empty());
        };
        let significant = significant_inputs(
            &self.synthesizer,
            &self.rows,
            &inputs,
            &constraints,
            &self.config,
            &budget,
            &program,
        )?;
        let serializations = ALL_FORMATS
            .iter()
            .map(|f| Ok((*f, serialize::serialize(&program, *f)?)))
            .collect::<Result<Vec<_>>>()?;
        info!(
            kind = self.synthesizer.kind(),
            significant = significant.len(),
            "learn_done"
        );
        Ok(LearnResult {
            description: Some(program.describe()),
            program: Some(program),
            significant_inputs: significant,
            serializations,
        })
    }

    fn learned(&self) -> Result<&LearnResult<S::Program>> {
        match (&self.state, &self.learned) {
            (SessionState::Learned, Some((_, result))) => Ok(result),
            _ => Err(Error::precondition(
                "no learn result for the current rows and constraints",
            )),
        }
    }

    /// The learned program.
    pub fn program(&self) -> Result<&S::Program> {
        self.learned()?
            .program
            .as_ref()
            .ok_or_else(|| Error::precondition("learning found no program"))
    }

    /// Runs the learned program on any row, registered or not.
    pub fn run(&self, row: &Row) -> Result<Option<<S::Program as Program>::Output>> {
        Ok(self.program()?.run(row))
    }

    /// Runs the learned program on every registered row, in order, with outputs lined up.
    pub fn run_all(&self) -> Result<Vec<<S::Program as Program>::Aligned>> {
        let program = self.program()?;
        let outputs = self.rows.iter().map(|row| program.run(row)).collect();
        Ok(S::Program::align(outputs))
    }

    /// An English explanation of the learned program.
    pub fn describe(&self) -> Result<String> {
        Ok(self.program()?.describe())
    }

    /// The learned program in `format`.
    pub fn serialize(&self, format: Format) -> Result<String> {
        serialize::serialize(self.program()?, format)
    }

    /// The response body for the last learn call.
    pub fn report(&self) -> Result<Report<<S::Program as Program>::Aligned>> {
        let result = self.learned()?;
        if result.program.is_none() {
            return Ok(Report {
                output: Vec::new(),
                significant_inputs: Vec::new(),
                description: None,
                program_human_readable: None,
                program_json: None,
                program_python: None,
            });
        }
        let text = |f| result.serialization(f).map(String::from);
        Ok(Report {
            output: self.run_all()?,
            significant_inputs: result.significant_inputs.clone(),
            description: result.description.clone(),
            program_human_readable: text(Format::HumanReadable),
            program_json: text(Format::Json),
            program_python: text(Format::Python),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::constraint::Example;
    use crate::region::rows_from_column;
    use crate::split::SplitSynthesizer;
    use crate::transform::language::TransformProgram;
    use crate::transform::TransformSynthesizer;
    use std::time::Duration;

    fn names() -> Session<TransformSynthesizer> {
        let mut session = Session::new(TransformSynthesizer);
        session
            .add_inputs(rows_from_column(&["John Smith", "Jane Doe"]))
            .unwrap();
        session
    }

    #[test]
    fn states_follow_calls() {
        let mut session = Session::new(TransformSynthesizer);
        assert_eq!(session.state(), SessionState::Empty);
        session.add_inputs(rows_from_column(&["a"])).unwrap();
        assert_eq!(session.state(), SessionState::InputsRegistered);
        session
            .add_constraints([Example::text(RowId(0), "a")])
            .unwrap();
        assert_eq!(session.state(), SessionState::ConstraintsAccumulating);
        session.learn().unwrap();
        assert_eq!(session.state(), SessionState::Learned);
        session
            .add_inputs([Row::new(RowId(1), ["b"])])
            .unwrap();
        assert_eq!(session.state(), SessionState::ConstraintsAccumulating);
        assert!(matches!(session.describe(), Err(Error::Precondition(_))));
    }

    #[test]
    fn use_before_learn_is_rejected() {
        let session = names();
        assert!(matches!(session.run_all(), Err(Error::Precondition(_))));
        assert!(matches!(
            session.serialize(Format::Json),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(session.report(), Err(Error::Precondition(_))));
    }

    #[test]
    fn unknown_rows_and_foreign_constraints_are_rejected() {
        let mut session = names();
        assert!(matches!(
            session.add_constraints([Example::text(RowId(7), "x")]),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(
            session.add_constraints([Constraint::IncludeDelimiters(true)]),
            Err(Error::Precondition(_))
        ));
        assert!(session.constraints().is_empty());
    }

    #[test]
    fn learns_and_reports() {
        let mut session = names();
        session
            .add_constraints([Example::text(RowId(0), "Smith, John")])
            .unwrap();
        let result = session.learn().unwrap();
        assert!(result.program.is_some());
        assert!(result.significant_inputs.contains(&RowId(0)));
        let report = session.report().unwrap();
        assert_eq!(
            report.output,
            vec![
                Some(String::from("Smith, John")),
                Some(String::from("Doe, Jane"))
            ]
        );
        assert!(report.program_python.unwrap().contains("def transform(row):"));
        assert_eq!(
            report.program_json.as_deref(),
            result.serialization(Format::Json)
        );
    }

    #[test]
    fn no_program_gives_an_empty_report() {
        let mut session = names();
        session
            .add_constraints([
                Example::text(RowId(0), "X"),
                Example::text(RowId(0), "Y"),
            ])
            .unwrap();
        assert_eq!(session.learn().unwrap().program, None);
        let report = session.report().unwrap();
        assert!(report.output.is_empty());
        assert_eq!(report.description, None);
        assert!(matches!(session.run_all(), Err(Error::Precondition(_))));
    }

    #[test]
    fn learning_is_memoised_and_shared_through_the_cache() {
        let cache: Arc<MemoryCache<LearnResult<TransformProgram>>> =
            Arc::new(MemoryCache::new(8, Duration::from_secs(60)));
        let mut first = names().with_cache(cache.clone());
        first
            .add_constraints([Example::text(RowId(0), "Smith, John")])
            .unwrap();
        let a = first.learn().unwrap();
        assert_eq!(first.learn().unwrap(), a);
        assert_eq!(cache.len(), 1);

        let mut second = names().with_cache(cache.clone());
        second
            .add_constraints([Example::text(RowId(0), "Smith, John")])
            .unwrap();
        assert_eq!(second.learn().unwrap(), a);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cancelled_learn_leaves_the_session_unlearned() {
        let token = CancellationToken::new();
        let mut session = names().with_cancellation(token.clone());
        session
            .add_constraints([Example::text(RowId(0), "Smith, John")])
            .unwrap();
        token.cancel();
        assert!(matches!(session.learn(), Err(Error::Cancelled)));
        assert_eq!(session.state(), SessionState::ConstraintsAccumulating);
        assert!(matches!(session.learn(), Err(Error::Cancelled)));

        session.set_cancellation(CancellationToken::new());
        assert!(session.learn().unwrap().program.is_some());
        assert_eq!(session.state(), SessionState::Learned);
    }

    #[test]
    fn split_outputs_are_aligned() {
        let mut session = Session::new(SplitSynthesizer);
        session
            .add_inputs(rows_from_column(&["a,b,,c", "d,e"]))
            .unwrap();
        session
            .add_constraints([
                Constraint::IncludeDelimiters(false),
                Constraint::OrderedCell {
                    row: RowId(0),
                    index: 1,
                    text: String::from("b"),
                },
            ])
            .unwrap();
        session.learn().unwrap();
        let out = session.run_all().unwrap();
        let cells = |v: &[Option<&str>]| v.iter().map(|c| c.map(String::from)).collect::<Vec<_>>();
        assert_eq!(out[0], cells(&[Some("a"), Some("b"), Some(""), Some("c")]));
        assert_eq!(out[1], cells(&[Some("d"), Some("e"), None, None]));
    }
}
