//! Run files: everything one exploration needs, in a single JSON document.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use ps_search::{
    Evaluator, Execution, ExtremaWalker, ResultLog, SpaceWalker, WalkMode, WalkSummary,
};
use ps_types::{
    deserialize_ordered, InitialPoint, ParamValue, ParameterKey, PsResult, SearchConfig,
    SearchError, StartValue,
};

use crate::evaluators::{BoxEvaluator, CommandEvaluator, Window};

/// Start of one axis as written in a run file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartSpec {
    /// `scale` times the value already bound to the earlier axis `of`.
    Derived { scale: f64, of: ParameterKey },
    Literal(ParamValue),
}

impl StartSpec {
    fn into_start(self, key: &str) -> StartValue {
        match self {
            StartSpec::Literal(value) => StartValue::Literal(value),
            StartSpec::Derived { scale, of } => {
                let key = key.to_string();
                StartValue::derived(move |prefix| {
                    let source = prefix.get(&of).ok_or_else(|| SearchError::UnboundDependency {
                        key: key.clone(),
                        source_key: of.clone(),
                    })?;
                    match source {
                        ParamValue::Number(v) => Ok(ParamValue::Number(v * scale)),
                        ParamValue::Quantity(q) => Ok(ParamValue::Quantity(q.scaled(scale))),
                        ParamValue::Text(s) => {
                            Err(SearchError::NotNumeric { value: s.clone() }.into())
                        }
                    }
                })
            }
        }
    }
}

/// Which evaluator a run drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EvaluatorSpec {
    Box {
        bounds: HashMap<ParameterKey, Window>,
    },
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl EvaluatorSpec {
    pub fn build(&self) -> Box<dyn Evaluator> {
        match self {
            EvaluatorSpec::Box { bounds } => Box::new(BoxEvaluator {
                bounds: bounds.clone(),
            }),
            EvaluatorSpec::Command { program, args } => {
                Box::new(CommandEvaluator::new(program.clone()).with_args(args.iter().cloned()))
            }
        }
    }
}

/// A complete exploration: search configuration, starting point and evaluator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunSpec {
    pub config: SearchConfig,
    /// Axis order is the order keys appear in the file.
    #[serde(deserialize_with = "deserialize_ordered")]
    pub initial: Vec<(ParameterKey, StartSpec)>,
    pub evaluator: EvaluatorSpec,
}

impl RunSpec {
    /// Load a run file, checking the configuration and that every derived
    /// start refers to an earlier axis.
    pub fn from_path<P: AsRef<Path>>(path: P) -> PsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> PsResult<Self> {
        let spec: Self = serde_json::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> PsResult<()> {
        if self.initial.is_empty() {
            return Err(SearchError::EmptyPoint.into());
        }
        self.config.validate()?;

        for (index, (key, start)) in self.initial.iter().enumerate() {
            if let StartSpec::Derived { of, .. } = start {
                let earlier = self.initial[..index].iter().any(|(k, _)| k == of);
                if !earlier {
                    return Err(SearchError::UnboundDependency {
                        key: key.clone(),
                        source_key: of.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    pub fn initial_point(&self) -> InitialPoint {
        let mut initial = InitialPoint::new();
        for (key, start) in &self.initial {
            initial.push(key.clone(), start.clone().into_start(key));
        }
        initial
    }

    /// Walk the space, appending records to `output`.
    pub fn run<P: AsRef<Path>>(
        &self,
        output: P,
        mode: WalkMode,
        execution: Execution,
    ) -> PsResult<WalkSummary> {
        let evaluator = self.evaluator.build();
        let initial = self.initial_point();
        let log = ResultLog::new(output);
        info!(?mode, ?execution, output = %log.path().display(), "running exploration");

        match mode {
            WalkMode::Space => SpaceWalker::new(evaluator.as_ref(), &self.config, &log)
                .with_execution(execution)
                .walk(&initial),
            WalkMode::Extrema => ExtremaWalker::new(evaluator.as_ref(), &self.config, &log)
                .with_execution(execution)
                .walk(&initial),
        }
    }
}
