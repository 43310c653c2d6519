//! Learning configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource caps and learning switches for a synthesis run.
///
/// Every search step in the engine is bounded by one of these limits, so that learning always
/// terminates. Hitting a cap drops the branch being explored; it never surfaces as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Longest output (in bytes) for which a version space is built.
    pub max_output_len: usize,

    /// Longest literal token learned as a position anchor in the input.
    pub max_literal_token_len: usize,

    /// Maximum number of candidate atoms a single witness call may produce for one output
    /// segment. Extra candidates are discarded.
    pub max_atoms_per_segment: usize,

    /// Maximum number of edges kept while intersecting version spaces. Exceeding it gives up on
    /// the intersection.
    pub max_version_space_edges: usize,

    /// Maximum number of non-example inputs sampled into learning.
    pub max_learn_inputs: usize,

    /// Whether non-example inputs shape what the learned program may rely on.
    ///
    /// Off by default. When on, one unlabelled row lacking the examples' structure removes the
    /// positions the examples share, and the program falls back to fixed offsets.
    pub use_inputs_in_learn: bool,

    /// Maximum number of inputs tested for significance.
    pub max_significance_candidates: usize,

    /// Optional wall-clock limit for a single learn call.
    pub learn_timeout: Option<Duration>,

    /// Report cap hits at warning level rather than debug level.
    pub diagnostics: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_output_len: 256,
            max_literal_token_len: 16,
            max_atoms_per_segment: 64,
            max_version_space_edges: 200_000,
            max_learn_inputs: 100,
            use_inputs_in_learn: false,
            max_significance_candidates: 32,
            learn_timeout: None,
            diagnostics: false,
        }
    }
}

impl SynthesisConfig {
    /// The default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the wall-clock limit for a learn call.
    pub fn with_learn_timeout(mut self, timeout: Duration) -> Self {
        self.learn_timeout = Some(timeout);
        self
    }

    /// Sets whether non-example inputs take part in learning.
    pub fn with_inputs_in_learn(mut self, use_inputs: bool) -> Self {
        self.use_inputs_in_learn = use_inputs;
        self
    }

    /// Sets how many non-example inputs are sampled into learning.
    pub fn with_max_learn_inputs(mut self, max: usize) -> Self {
        self.max_learn_inputs = max;
        self
    }

    /// Sets whether cap hits are logged as warnings.
    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Logs that a resource cap was hit, at a level chosen by [`SynthesisConfig::diagnostics`].
macro_rules! cap_hit {
    ($config:expr, $($arg:tt)+) => {
        if $config.diagnostics {
            tracing::warn!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

pub(crate) use cap_hit;
