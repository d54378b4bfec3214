//! Bracket-then-bisect search for the feasible interval around a guess.

use tracing::{debug, warn};

use ps_types::{Bounds, ParamValue, PsResult, RangeConfig, SearchError};

use crate::evaluator::{probe, Evaluator};
use crate::grid::{require_positive, Direction};

/// Find the `[min, max]` interval over which `evaluator` succeeds.
///
/// The search seeds from `guess`, then `guess + fail_range`, then
/// `guess - fail_range`; the first feasible one is the start. From there
/// each boundary is found by stepping outward until a probe fails and then
/// bisecting between the last feasible and first infeasible values until
/// they are closer than `converge_diff`. Returns `None` when no seed is
/// feasible.
///
/// When a configured `min`/`max` is passed while still feasible, that bound
/// is returned as-is without being probed.
///
/// All sizes are converted to the unit of `guess`, and the result carries
/// that unit. Step sizes and `converge_diff` must be positive. Assumes a
/// single feasible interval contains the start.
pub fn find_range<E>(
    evaluator: &E,
    guess: &ParamValue,
    config: &RangeConfig,
) -> PsResult<Option<Bounds>>
where
    E: Evaluator<ParamValue> + ?Sized,
{
    let unit = guess.unit().cloned();
    let unit = unit.as_ref();
    let guess = guess.magnitude_in(unit)?;
    let fail_range = config.fail_range.magnitude_in(unit)?;
    let converge_diff = config.converge_diff.magnitude_in(unit)?;
    let step_up = config.step_up_size.magnitude_in(unit)?;
    let step_down = config.step_down().magnitude_in(unit)?;
    require_positive("converge_diff", converge_diff)?;
    require_positive("step_up_size", step_up)?;
    require_positive("step_down_size", step_down)?;
    let min = config.min.as_ref().map(|v| v.magnitude_in(unit)).transpose()?;
    let max = config.max.as_ref().map(|v| v.magnitude_in(unit)).transpose()?;

    let mut budget = ProbeBudget::new(config.max_probes);
    let mut feasible = |x: f64| -> PsResult<bool> {
        budget.spend()?;
        Ok(probe(evaluator, &ParamValue::from_magnitude(x, unit)))
    };

    let mut start = None;
    for candidate in [guess, guess + fail_range, guess - fail_range] {
        if feasible(candidate)? {
            start = Some(candidate);
            break;
        }
    }
    let Some(start) = start else {
        debug!(guess, fail_range, "no feasible seed near guess");
        return Ok(None);
    };

    let upper = boundary(&mut feasible, start, step_up, converge_diff, max, Direction::Up)?;
    let lower = boundary(&mut feasible, start, step_down, converge_diff, min, Direction::Down)?;
    debug!(start, lower, upper, "range converged");

    Ok(Some(Bounds {
        min: ParamValue::from_magnitude(lower, unit),
        max: ParamValue::from_magnitude(upper, unit),
    }))
}

/// Expand from `start` by `step` until a probe fails, then bisect.
///
/// `inner` is the furthest value known feasible and `outer` the nearest
/// known infeasible one.
fn boundary<F>(
    feasible: &mut F,
    start: f64,
    step: f64,
    converge_diff: f64,
    limit: Option<f64>,
    direction: Direction,
) -> PsResult<f64>
where
    F: FnMut(f64) -> PsResult<bool>,
{
    let mut inner = start;
    let mut outer: Option<f64> = None;
    let mut value = start + direction.sign() * step;

    loop {
        if feasible(value)? {
            inner = value;
            match outer {
                Some(outer) if (outer - inner).abs() < converge_diff => return Ok(inner),
                Some(outer) => value = midpoint(outer, inner),
                None => value += direction.sign() * step,
            }
            if let Some(limit) = limit {
                if direction.exceeds(inner, limit) {
                    warn!(
                        limit,
                        last_feasible = inner,
                        "feasible past configured bound; reporting the bound unprobed"
                    );
                    return Ok(limit);
                }
            }
        } else {
            outer = Some(value);
            if (value - inner).abs() < converge_diff {
                return Ok(inner);
            }
            value = midpoint(value, inner);
        }
    }
}

fn midpoint(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

struct ProbeBudget {
    limit: Option<usize>,
    spent: usize,
}

impl ProbeBudget {
    fn new(limit: Option<usize>) -> Self {
        Self { limit, spent: 0 }
    }

    fn spend(&mut self) -> PsResult<()> {
        if let Some(limit) = self.limit {
            if self.spent >= limit {
                return Err(SearchError::ProbeBudgetExhausted { max_probes: limit }.into());
            }
        }
        self.spent += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Outcome;
    use approx::assert_abs_diff_eq;
    use ps_types::{PsError, Quantity, Unit, UnitError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn window(lo: f64, hi: f64) -> impl Fn(&ParamValue) -> Outcome + Send + Sync {
        move |v: &ParamValue| {
            let x = v.raw_magnitude().unwrap();
            if (lo..=hi).contains(&x) {
                Outcome::Feasible
            } else {
                Outcome::infeasible(format!("{x} outside [{lo}, {hi}]"))
            }
        }
    }

    fn bounds_of(bounds: &Bounds) -> (f64, f64) {
        (
            bounds.min.raw_magnitude().unwrap(),
            bounds.max.raw_magnitude().unwrap(),
        )
    }

    #[test]
    fn converges_on_both_edges() {
        let config = RangeConfig::new(1.0, 0.01, 1.0).with_step_down(1.0);
        let bounds = find_range(&window(2.0, 8.0), &5.0.into(), &config)
            .unwrap()
            .unwrap();

        let (min, max) = bounds_of(&bounds);
        assert_abs_diff_eq!(max, 8.0, epsilon = 0.01);
        assert_abs_diff_eq!(min, 2.0, epsilon = 0.01);
    }

    #[test]
    fn converges_on_off_grid_edges() {
        let config = RangeConfig::new(0.5, 1e-3, 0.7).with_step_down(0.3);
        let bounds = find_range(&window(-1.234, 3.21), &0.1.into(), &config)
            .unwrap()
            .unwrap();

        let (min, max) = bounds_of(&bounds);
        assert!(max <= 3.21 && max > 3.21 - 1e-3, "max = {max}");
        assert!(min >= -1.234 && min < -1.234 + 1e-3, "min = {min}");
    }

    #[test]
    fn seeds_from_offsets_when_guess_fails() {
        let config = RangeConfig::new(3.0, 0.01, 1.0);

        // guess + fail_range lands inside
        let above = find_range(&window(10.0, 20.0), &8.0.into(), &config).unwrap();
        assert!(above.is_some());

        // guess - fail_range lands inside
        let below = find_range(&window(10.0, 20.0), &22.0.into(), &config).unwrap();
        let (min, max) = bounds_of(&below.unwrap());
        assert_abs_diff_eq!(min, 10.0, epsilon = 0.01);
        assert_abs_diff_eq!(max, 20.0, epsilon = 0.01);
    }

    #[test]
    fn seed_at_zero_counts_as_found() {
        let config = RangeConfig::new(1.0, 0.01, 1.0);
        let bounds = find_range(&window(-0.5, 0.5), &0.0.into(), &config).unwrap();
        assert!(bounds.is_some());
    }

    #[test]
    fn none_when_all_seeds_infeasible() {
        let calls = AtomicUsize::new(0);
        let evaluator = |v: &ParamValue| {
            calls.fetch_add(1, Ordering::SeqCst);
            window(2.0, 8.0)(v)
        };
        let config = RangeConfig::new(1.0, 0.01, 1.0);

        assert!(find_range(&evaluator, &20.0.into(), &config).unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn clamps_to_configured_bounds_without_probing_them() {
        let probed = parking_lot::Mutex::new(Vec::new());
        let evaluator = |v: &ParamValue| {
            let x = v.raw_magnitude().unwrap();
            probed.lock().push(x);
            window(0.0, 100.0)(v)
        };
        let config = RangeConfig::new(1.0, 0.01, 2.0)
            .with_min(3.5)
            .with_max(9.5);

        let bounds = find_range(&evaluator, &5.0.into(), &config).unwrap().unwrap();
        assert_eq!(bounds_of(&bounds), (3.5, 9.5));

        let probed = probed.lock();
        assert!(!probed.contains(&9.5));
        assert!(!probed.contains(&3.5));
    }

    #[test]
    fn keeps_guess_unit_and_converts_sizes() {
        let guess: ParamValue = Quantity::parse(10_000.0, "km/s").unwrap().into();
        let config = RangeConfig::new(
            Quantity::parse(1_000_000.0, "m/s").unwrap(),
            Quantity::parse(1.0, "km/s").unwrap(),
            Quantity::parse(2_500.0, "km/s").unwrap(),
        );
        let kms_unit = Unit::parse("km/s").unwrap();
        let evaluator = |v: &ParamValue| {
            let kms = v.magnitude_in(Some(&kms_unit)).unwrap();
            if (4_000.0..=22_500.0).contains(&kms) {
                Outcome::Feasible
            } else {
                Outcome::infeasible("velocity out of range")
            }
        };

        let bounds = find_range(&evaluator, &guess, &config).unwrap().unwrap();
        assert_eq!(bounds.max.unit().unwrap().symbol(), "km/s");
        let (min, max) = bounds_of(&bounds);
        assert_abs_diff_eq!(min, 4_000.0, epsilon = 1.0);
        assert_abs_diff_eq!(max, 22_500.0, epsilon = 1.0);
    }

    #[test]
    fn unit_mismatch_is_fatal() {
        let guess: ParamValue = Quantity::parse(12_000.0, "K").unwrap().into();
        let config = RangeConfig::new(
            Quantity::parse(1.0, "s").unwrap(),
            Quantity::parse(1.0, "K").unwrap(),
            Quantity::parse(1.0, "K").unwrap(),
        );
        let err = find_range(&window(0.0, 1e9), &guess, &config).unwrap_err();
        assert!(matches!(err, PsError::Unit(UnitError::Incompatible { .. })));
    }

    #[test]
    fn non_positive_sizes_are_rejected() {
        let configs = [
            RangeConfig::new(1.0, 0.0, 1.0),
            RangeConfig::new(1.0, -0.01, 1.0),
            RangeConfig::new(1.0, 0.01, 0.0),
            RangeConfig::new(1.0, 0.01, 1.0).with_step_down(-1.0),
        ];
        for config in configs {
            let err = find_range(&window(0.0, 10.0), &5.0.into(), &config).unwrap_err();
            assert!(matches!(err, PsError::Config(_)), "{config:?}");
        }
    }

    #[test]
    fn probe_budget_stops_unbounded_search() {
        let config = RangeConfig::new(1.0, 0.01, 1.0).with_max_probes(50);
        let err = find_range(&window(f64::MIN, f64::MAX), &0.0.into(), &config).unwrap_err();
        assert!(matches!(
            err,
            PsError::Search(SearchError::ProbeBudgetExhausted { max_probes: 50 })
        ));
    }
}
