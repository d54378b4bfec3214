//! # ps-search
//!
//! Exploration engine for ParamScout.
//!
//! Finds where an expensive black-box evaluator succeeds: a bracket-then-bisect
//! boundary finder, a bidirectional grid stepper, and two recursive walkers that
//! compose them across an ordered set of parameter axes, persisting what they
//! discover to an append-only JSON Lines log.

mod evaluator;
mod grid;
mod log;
mod range;
mod walker;

pub use evaluator::{probe, Evaluator, Outcome};
pub use grid::{step_through, Execution, GridPoints};
pub use log::{append, ResultLog};
pub use range::find_range;
pub use walker::{walk_extrema, walk_space, ExtremaWalker, SpaceWalker, WalkMode, WalkSummary};
