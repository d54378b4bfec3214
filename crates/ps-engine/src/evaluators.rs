//! Evaluators the explorer can drive without writing Rust.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

use ps_search::{Evaluator, Outcome};
use ps_types::{ParamValue, ParameterKey, PsResult, TrialPoint};

/// Closed interval a parameter must lie in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub min: ParamValue,
    pub max: ParamValue,
}

impl Window {
    /// Whether `value` lies inside, compared in the unit of `min`.
    fn check(&self, value: &ParamValue) -> PsResult<bool> {
        let unit = self.min.unit();
        let value = value.magnitude_in(unit)?;
        let min = self.min.magnitude_in(unit)?;
        let max = self.max.magnitude_in(unit)?;
        Ok((min..=max).contains(&value))
    }
}

/// Stand-in evaluator: feasible iff every windowed parameter is inside its
/// window. Parameters without a window are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxEvaluator {
    pub bounds: HashMap<ParameterKey, Window>,
}

impl BoxEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(
        mut self,
        key: impl Into<ParameterKey>,
        min: impl Into<ParamValue>,
        max: impl Into<ParamValue>,
    ) -> Self {
        self.bounds.insert(
            key.into(),
            Window {
                min: min.into(),
                max: max.into(),
            },
        );
        self
    }
}

impl Evaluator for BoxEvaluator {
    fn evaluate(&self, point: &TrialPoint) -> Outcome {
        for (key, value) in point.iter() {
            let Some(window) = self.bounds.get(key) else {
                continue;
            };
            match window.check(value) {
                Ok(true) => {}
                Ok(false) => {
                    return Outcome::infeasible(format!(
                        "{key} = {value} outside [{}, {}]",
                        window.min, window.max
                    ))
                }
                Err(e) => return Outcome::infeasible(format!("{key}: {e}")),
            }
        }
        Outcome::Feasible
    }
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("could not encode trial point: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Runs an external program once per point.
///
/// The point is written to the program's stdin as one JSON object. Exit
/// status zero means feasible; any other status, or failure to start the
/// program, means infeasible with stderr as the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEvaluator {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandEvaluator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn run(&self, point: &TrialPoint) -> Result<(), CommandError> {
        let input = serde_json::to_string(point)?;
        let spawn_error = |source| CommandError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading its input is still judged by its status.
            if let Err(e) = stdin.write_all(input.as_bytes()) {
                if e.kind() != ErrorKind::BrokenPipe {
                    return Err(spawn_error(e));
                }
            }
        }

        let output = child.wait_with_output().map_err(spawn_error)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(CommandError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl Evaluator for CommandEvaluator {
    fn evaluate(&self, point: &TrialPoint) -> Outcome {
        debug!(program = %self.program, "running evaluator command");
        self.run(point).into()
    }
}
