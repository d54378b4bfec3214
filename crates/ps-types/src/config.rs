//! Per-axis search parameters and the registry that holds them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::errors::{ConfigError, PsResult};
use crate::point::{ParamValue, ParameterKey};

/// Grid stepping parameters for one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub step_size: ParamValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<ParamValue>,
}

impl StepConfig {
    pub fn new(step_size: impl Into<ParamValue>) -> Self {
        Self {
            step_size: step_size.into(),
            min: None,
            max: None,
        }
    }

    pub fn with_min(mut self, min: impl Into<ParamValue>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn with_max(mut self, max: impl Into<ParamValue>) -> Self {
        self.max = Some(max.into());
        self
    }
}

/// Boundary search parameters for one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    /// Offset tried on either side of the guess when the guess itself fails.
    pub fail_range: ParamValue,
    /// Bracket width at which a boundary counts as found.
    pub converge_diff: ParamValue,
    pub step_up_size: ParamValue,
    /// Falls back to `step_up_size` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_down_size: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<ParamValue>,
    /// Cap on evaluator calls per range search; unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_probes: Option<usize>,
}

impl RangeConfig {
    pub fn new(
        fail_range: impl Into<ParamValue>,
        converge_diff: impl Into<ParamValue>,
        step_up_size: impl Into<ParamValue>,
    ) -> Self {
        Self {
            fail_range: fail_range.into(),
            converge_diff: converge_diff.into(),
            step_up_size: step_up_size.into(),
            step_down_size: None,
            min: None,
            max: None,
            max_probes: None,
        }
    }

    pub fn with_step_down(mut self, step_down_size: impl Into<ParamValue>) -> Self {
        self.step_down_size = Some(step_down_size.into());
        self
    }

    pub fn with_min(mut self, min: impl Into<ParamValue>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn with_max(mut self, max: impl Into<ParamValue>) -> Self {
        self.max = Some(max.into());
        self
    }

    pub fn with_max_probes(mut self, max_probes: usize) -> Self {
        self.max_probes = Some(max_probes);
        self
    }

    pub fn step_down(&self) -> &ParamValue {
        self.step_down_size.as_ref().unwrap_or(&self.step_up_size)
    }
}

/// Read-only tables of step and range parameters, keyed by axis name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub step: HashMap<ParameterKey, StepConfig>,
    #[serde(default)]
    pub range: HashMap<ParameterKey, RangeConfig>,
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, key: impl Into<ParameterKey>, config: StepConfig) -> Self {
        self.step.insert(key.into(), config);
        self
    }

    pub fn with_range(mut self, key: impl Into<ParameterKey>, config: RangeConfig) -> Self {
        self.range.insert(key.into(), config);
        self
    }

    pub fn step_config(&self, key: &str) -> PsResult<&StepConfig> {
        self.step.get(key).ok_or_else(|| {
            ConfigError::MissingStep {
                key: key.to_string(),
            }
            .into()
        })
    }

    pub fn range_config(&self, key: &str) -> PsResult<&RangeConfig> {
        self.range.get(key).ok_or_else(|| {
            ConfigError::MissingRange {
                key: key.to_string(),
            }
            .into()
        })
    }

    /// Load and validate a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> PsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject sizes that would stall a sweep (zero or negative steps) or
    /// that cannot be searched at all (text).
    pub fn validate(&self) -> PsResult<()> {
        for (key, step) in &self.step {
            require_positive(key, "step_size", &step.step_size)?;
            for (field, bound) in [("min", &step.min), ("max", &step.max)] {
                if let Some(bound) = bound {
                    require_numeric(key, field, bound)?;
                }
            }
        }

        for (key, range) in &self.range {
            require_positive(key, "converge_diff", &range.converge_diff)?;
            require_positive(key, "step_up_size", &range.step_up_size)?;
            require_positive(key, "step_down_size", range.step_down())?;
            require_numeric(key, "fail_range", &range.fail_range)?;
            for (field, bound) in [("min", &range.min), ("max", &range.max)] {
                if let Some(bound) = bound {
                    require_numeric(key, field, bound)?;
                }
            }
        }

        Ok(())
    }
}

fn require_numeric(key: &str, field: &str, value: &ParamValue) -> PsResult<f64> {
    value
        .raw_magnitude()
        .filter(|v| v.is_finite())
        .ok_or_else(|| crate::config_error!("{key}.{field} must be a finite number, got {value}"))
}

fn require_positive(key: &str, field: &str, value: &ParamValue) -> PsResult<()> {
    let magnitude = require_numeric(key, field, value)?;
    if magnitude <= 0.0 {
        return Err(crate::config_error!(
            "{key}.{field} must be positive, got {value}"
        ));
    }
    Ok(())
}
