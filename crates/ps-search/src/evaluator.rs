//! The evaluator contract and the probe that turns any failure into `false`.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use ps_types::TrialPoint;
use tracing::debug;

/// Result of running the evaluator on one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Feasible,
    /// Carries whatever the evaluator reported about the failure.
    Infeasible(String),
}

impl Outcome {
    pub fn infeasible(reason: impl Into<String>) -> Self {
        Self::Infeasible(reason.into())
    }

    pub fn is_feasible(&self) -> bool {
        matches!(self, Self::Feasible)
    }
}

impl<E: fmt::Display> From<Result<(), E>> for Outcome {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Feasible,
            Err(e) => Self::Infeasible(e.to_string()),
        }
    }
}

/// An external black box whose feasibility is being mapped.
///
/// Feasibility must be a pure function of the input: walkers prune on the
/// assumption that asking twice gives the same answer.
pub trait Evaluator<I: ?Sized = TrialPoint>: Send + Sync {
    fn evaluate(&self, input: &I) -> Outcome;
}

impl<I: ?Sized, F> Evaluator<I> for F
where
    F: Fn(&I) -> Outcome + Send + Sync,
{
    fn evaluate(&self, input: &I) -> Outcome {
        self(input)
    }
}

/// Run the evaluator once and report whether `input` is feasible.
///
/// Any failure counts as infeasible, including a panic inside the evaluator.
/// No attempt is made to tell a genuinely infeasible input from a bug in the
/// evaluator; the reason is only logged.
pub fn probe<I, E>(evaluator: &E, input: &I) -> bool
where
    I: ?Sized,
    E: Evaluator<I> + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(input))) {
        Ok(Outcome::Feasible) => true,
        Ok(Outcome::Infeasible(reason)) => {
            debug!(%reason, "probe infeasible");
            false
        }
        Err(payload) => {
            debug!(reason = panic_message(payload.as_ref()), "evaluator panicked");
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
