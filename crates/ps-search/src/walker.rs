//! Recursive traversal of a parameter space, one axis per recursion level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

use ps_types::{
    InitialPoint, ParamValue, PsResult, Record, SearchConfig, SearchError, TrialPoint,
};

use crate::evaluator::{probe, Evaluator, Outcome};
use crate::grid::{step_through, Execution};
use crate::log::ResultLog;
use crate::range::find_range;

/// What the last axis of a walk produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkMode {
    /// Every feasible grid point.
    Space,
    /// One boundary pair per feasible prefix.
    Extrema,
}

/// Outcome of a completed walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkSummary {
    pub run_id: Uuid,
    pub mode: WalkMode,
    /// Whether anything feasible was found around the initial point.
    pub found: bool,
    pub records: usize,
    pub evaluations: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl WalkSummary {
    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Depth-first sweep that logs every feasible grid point.
///
/// Each axis is stepped outward from its start value; the sweep along an
/// axis stops as soon as the subtree below a value contains nothing
/// feasible. Cost therefore follows the feasible width of each axis rather
/// than the full grid, provided feasibility along every axis is one
/// contiguous interval.
pub struct SpaceWalker<'a, E: ?Sized> {
    evaluator: &'a E,
    config: &'a SearchConfig,
    log: &'a ResultLog,
    execution: Execution,
}

impl<'a, E: Evaluator + ?Sized> SpaceWalker<'a, E> {
    pub fn new(evaluator: &'a E, config: &'a SearchConfig, log: &'a ResultLog) -> Self {
        Self {
            evaluator,
            config,
            log,
            execution: Execution::Sequential,
        }
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn walk(&self, initial: &InitialPoint) -> PsResult<WalkSummary> {
        Traversal::new(
            self.evaluator,
            self.config,
            self.log,
            initial,
            self.execution,
            WalkMode::Space,
        )
        .run()
    }
}

/// Like [`SpaceWalker`], except the last axis is bracketed with
/// [`find_range`] instead of enumerated, logging its `{min, max}` once per
/// prefix.
pub struct ExtremaWalker<'a, E: ?Sized> {
    evaluator: &'a E,
    config: &'a SearchConfig,
    log: &'a ResultLog,
    execution: Execution,
}

impl<'a, E: Evaluator + ?Sized> ExtremaWalker<'a, E> {
    pub fn new(evaluator: &'a E, config: &'a SearchConfig, log: &'a ResultLog) -> Self {
        Self {
            evaluator,
            config,
            log,
            execution: Execution::Sequential,
        }
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn walk(&self, initial: &InitialPoint) -> PsResult<WalkSummary> {
        Traversal::new(
            self.evaluator,
            self.config,
            self.log,
            initial,
            self.execution,
            WalkMode::Extrema,
        )
        .run()
    }
}

/// Sequential [`SpaceWalker`] run appending to `log_path`.
pub fn walk_space<E, P>(
    evaluator: &E,
    config: &SearchConfig,
    log_path: P,
    initial: &InitialPoint,
) -> PsResult<WalkSummary>
where
    E: Evaluator + ?Sized,
    P: AsRef<Path>,
{
    let log = ResultLog::new(log_path);
    SpaceWalker::new(evaluator, config, &log).walk(initial)
}

/// Sequential [`ExtremaWalker`] run appending to `log_path`.
pub fn walk_extrema<E, P>(
    evaluator: &E,
    config: &SearchConfig,
    log_path: P,
    initial: &InitialPoint,
) -> PsResult<WalkSummary>
where
    E: Evaluator + ?Sized,
    P: AsRef<Path>,
{
    let log = ResultLog::new(log_path);
    ExtremaWalker::new(evaluator, config, &log).walk(initial)
}

struct Traversal<'a, E: ?Sized> {
    evaluator: &'a E,
    config: &'a SearchConfig,
    log: &'a ResultLog,
    initial: &'a InitialPoint,
    execution: Execution,
    mode: WalkMode,
    evaluations: AtomicUsize,
    records: AtomicUsize,
}

impl<'a, E: Evaluator + ?Sized> Traversal<'a, E> {
    fn new(
        evaluator: &'a E,
        config: &'a SearchConfig,
        log: &'a ResultLog,
        initial: &'a InitialPoint,
        execution: Execution,
        mode: WalkMode,
    ) -> Self {
        Self {
            evaluator,
            config,
            log,
            initial,
            execution,
            mode,
            evaluations: AtomicUsize::new(0),
            records: AtomicUsize::new(0),
        }
    }

    fn run(&self) -> PsResult<WalkSummary> {
        if self.initial.is_empty() {
            return Err(SearchError::EmptyPoint.into());
        }
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            %run_id,
            mode = ?self.mode,
            axes = ?self.initial.keys().collect::<Vec<_>>(),
            log = %self.log.path().display(),
            "starting walk"
        );

        let found = self.descend(0, &TrialPoint::new())?;

        let summary = WalkSummary {
            run_id,
            mode: self.mode,
            found,
            records: self.records.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            %run_id,
            found,
            records = summary.records,
            evaluations = summary.evaluations,
            seconds = summary.duration_seconds(),
            "walk finished"
        );
        Ok(summary)
    }

    /// Sweep the axis at `depth` with `prefix` holding every earlier axis.
    /// Returns whether anything feasible was found below this prefix.
    fn descend(&self, depth: usize, prefix: &TrialPoint) -> PsResult<bool> {
        let (key, start) = self.initial.axis(depth).ok_or(SearchError::EmptyPoint)?;
        let start = start.resolve(prefix)?;
        let last = depth + 1 == self.initial.len();

        if last && self.mode == WalkMode::Extrema {
            return self.extremize(key, &start, prefix);
        }

        let step = self.config.step_config(key)?;
        debug!(key, depth, start = %start, "sweeping axis");

        let swept = step_through(
            |value: &ParamValue| {
                let point = prefix.with(key, value.clone());
                let found = if last {
                    self.enumerate(&point)?
                } else {
                    self.descend(depth + 1, &point)?
                };
                Ok(found.then_some(()))
            },
            &start,
            step,
            self.execution,
        )?;

        Ok(swept.is_some())
    }

    fn enumerate(&self, point: &TrialPoint) -> PsResult<bool> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        if !probe(self.evaluator, point) {
            return Ok(false);
        }

        self.log.append(&Record::from_point(point))?;
        self.records.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn extremize(&self, key: &str, start: &ParamValue, prefix: &TrialPoint) -> PsResult<bool> {
        let range = self.config.range_config(key)?;
        debug!(key, start = %start, "bracketing final axis");

        let along_axis = |value: &ParamValue| -> Outcome {
            self.evaluations.fetch_add(1, Ordering::Relaxed);
            self.evaluator.evaluate(&prefix.with(key, value.clone()))
        };

        match find_range(&along_axis, start, range)? {
            Some(bounds) => {
                self.log.append(&Record::from_bounds(prefix, key, bounds))?;
                self.records.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_types::{ConfigError, PsError, RangeConfig, StartValue, StepConfig};
    use tempfile::tempdir;

    fn in_box(point: &TrialPoint) -> Outcome {
        let x = point.get("x").and_then(ParamValue::raw_magnitude).unwrap_or(0.0);
        let y = point.get("y").and_then(ParamValue::raw_magnitude).unwrap_or(0.0);
        if (1.0..=3.0).contains(&x) && (10.0..=12.0).contains(&y) {
            Outcome::Feasible
        } else {
            Outcome::infeasible("outside box")
        }
    }

    fn config() -> SearchConfig {
        SearchConfig::new()
            .with_step("x", StepConfig::new(1.0))
            .with_step("y", StepConfig::new(1.0))
            .with_range("y", RangeConfig::new(1.0, 0.01, 1.0))
    }

    #[test]
    fn empty_initial_point_is_rejected() {
        let dir = tempdir().unwrap();
        let err = walk_space(&in_box, &config(), dir.path().join("o.jsonl"), &InitialPoint::new())
            .unwrap_err();
        assert!(matches!(err, PsError::Search(SearchError::EmptyPoint)));
    }

    #[test]
    fn missing_step_config_is_fatal() {
        let dir = tempdir().unwrap();
        let initial = InitialPoint::new().with("x", 2.0).with("z", 1.0);
        let err = walk_space(&in_box, &config(), dir.path().join("o.jsonl"), &initial).unwrap_err();
        assert!(matches!(
            err,
            PsError::Config(ConfigError::MissingStep { ref key }) if key == "z"
        ));
    }

    #[test]
    fn missing_range_config_is_fatal() {
        let dir = tempdir().unwrap();
        let initial = InitialPoint::new().with("y", 11.0).with("x", 2.0);
        let err =
            walk_extrema(&in_box, &config(), dir.path().join("o.jsonl"), &initial).unwrap_err();
        assert!(matches!(
            err,
            PsError::Config(ConfigError::MissingRange { ref key }) if key == "x"
        ));
    }

    #[test]
    fn summary_counts_records_and_evaluations() {
        let dir = tempdir().unwrap();
        let initial = InitialPoint::new().with("x", 2.0).with("y", 11.0);
        let summary = walk_space(&in_box, &config(), dir.path().join("o.jsonl"), &initial).unwrap();

        assert!(summary.found);
        assert_eq!(summary.mode, WalkMode::Space);
        assert_eq!(summary.records, 9);
        assert!(summary.evaluations > summary.records);
        assert!(summary.finished_at >= summary.started_at);
    }

    #[test]
    fn derived_start_sees_bound_prefix() {
        let dir = tempdir().unwrap();
        // y starts at x + 9, which is always inside the box for feasible x.
        let initial = InitialPoint::new().with("x", 2.0).with(
            "y",
            StartValue::derived(|prefix| {
                let x = prefix.get("x").and_then(ParamValue::raw_magnitude).unwrap_or(0.0);
                Ok(ParamValue::Number(x + 9.0))
            }),
        );
        let summary = walk_space(&in_box, &config(), dir.path().join("o.jsonl"), &initial).unwrap();
        assert_eq!(summary.records, 9);
    }

    #[test]
    fn failed_append_aborts_the_walk() {
        let dir = tempdir().unwrap();
        let initial = InitialPoint::new().with("x", 2.0).with("y", 11.0);

        let err = walk_space(&in_box, &config(), dir.path(), &initial).unwrap_err();
        assert!(matches!(err, PsError::Io(_)));

        let err = walk_extrema(&in_box, &config(), dir.path(), &initial).unwrap_err();
        assert!(matches!(err, PsError::Io(_)));
    }

    #[test]
    fn nothing_found_leaves_no_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("o.jsonl");
        let initial = InitialPoint::new().with("x", 50.0).with("y", 50.0);

        let summary = walk_space(&in_box, &config(), &path, &initial).unwrap();
        assert!(!summary.found);
        assert_eq!(summary.records, 0);
        assert!(!path.exists());
    }
}
