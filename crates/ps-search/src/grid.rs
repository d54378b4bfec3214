//! Bidirectional fixed-step scan.

use serde::{Deserialize, Serialize};

use ps_types::{config_error, ParamValue, PsResult, StepConfig, Unit};

/// Grid values visited by a scan with the callback's result for each, ascending.
pub type GridPoints<R> = Vec<(ParamValue, R)>;

/// Whether independent scans may run on the rayon pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    #[default]
    Sequential,
    /// The upward and downward scans of every sweep run concurrently.
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Up,
    Down,
}

impl Direction {
    pub(crate) fn sign(self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }

    /// True when `value` lies beyond `limit` in this direction.
    pub(crate) fn exceeds(self, value: f64, limit: f64) -> bool {
        self.sign() * (value - limit) > 0.0
    }
}

/// Reject a step or tolerance that would keep a search from terminating.
pub(crate) fn require_positive(field: &str, size: f64) -> PsResult<()> {
    if size.is_finite() && size > 0.0 {
        Ok(())
    } else {
        Err(config_error!("{field} must be positive, got {size}"))
    }
}

/// Walk the grid `start ± n·step_size` in both directions until `visit`
/// returns `None` or a configured bound is passed.
///
/// The upward scan covers `start` itself; the downward scan begins one step
/// below it. Both always run. Returns `None` when neither scan produced a
/// result. An `Err` from `visit` aborts the sweep.
///
/// Units of the step and bounds are converted to the unit of `start`; a
/// plain-number start with quantity steps (or the reverse) is an error, as
/// is a `step_size` that is not positive.
pub fn step_through<F, R>(
    visit: F,
    start: &ParamValue,
    config: &StepConfig,
    execution: Execution,
) -> PsResult<Option<GridPoints<R>>>
where
    F: Fn(&ParamValue) -> PsResult<Option<R>> + Sync,
    R: Send,
{
    let unit = start.unit().cloned();
    let unit = unit.as_ref();
    let origin = start.magnitude_in(unit)?;
    let step = config.step_size.magnitude_in(unit)?;
    require_positive("step_size", step)?;
    let min = config.min.as_ref().map(|v| v.magnitude_in(unit)).transpose()?;
    let max = config.max.as_ref().map(|v| v.magnitude_in(unit)).transpose()?;

    let upward = || scan(&visit, origin, step, unit, Direction::Up, max);
    let downward = || scan(&visit, origin, step, unit, Direction::Down, min);

    let (up, down) = match execution {
        Execution::Sequential => (upward(), downward()),
        Execution::Parallel => rayon::join(upward, downward),
    };
    let up = up?;
    let mut points = down?;

    if points.is_empty() && up.is_empty() {
        return Ok(None);
    }

    points.reverse();
    points.extend(up);
    Ok(Some(points))
}

fn scan<F, R>(
    visit: &F,
    origin: f64,
    step: f64,
    unit: Option<&Unit>,
    direction: Direction,
    limit: Option<f64>,
) -> PsResult<GridPoints<R>>
where
    F: Fn(&ParamValue) -> PsResult<Option<R>>,
{
    let mut points = Vec::new();
    let mut n: u64 = match direction {
        Direction::Up => 0,
        Direction::Down => 1,
    };

    loop {
        // Offsets are recomputed from the origin so rounding does not accumulate.
        let magnitude = origin + direction.sign() * step * n as f64;
        if limit.is_some_and(|limit| direction.exceeds(magnitude, limit)) {
            break;
        }

        let value = ParamValue::from_magnitude(magnitude, unit);
        match visit(&value)? {
            Some(result) => points.push((value, result)),
            None => break,
        }
        n += 1;
    }

    Ok(points)
}
