//! ParamScout exploration runner.
//!
//! Loads a run file, builds one of the built-in evaluators and drives a
//! space or extrema walk over it.

pub mod evaluators;
pub mod run;

pub use evaluators::{BoxEvaluator, CommandError, CommandEvaluator, Window};
pub use run::{EvaluatorSpec, RunSpec, StartSpec};
