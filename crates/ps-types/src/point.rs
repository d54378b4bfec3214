//! Trial points, start values and persisted records.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::errors::{PsResult, SearchError, UnitError};
use crate::units::{Quantity, Unit};

/// Name of one parameter axis (e.g. "t_inner").
pub type ParameterKey = String;

/// A concrete parameter value: a plain number, a quantity, or an opaque label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Quantity(Quantity),
    Text(String),
}

impl ParamValue {
    pub fn unit(&self) -> Option<&Unit> {
        match self {
            Self::Quantity(q) => Some(q.unit()),
            _ => None,
        }
    }

    /// The bare magnitude, ignoring any unit. `None` for text.
    pub fn raw_magnitude(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Quantity(q) => Some(q.value()),
            Self::Text(_) => None,
        }
    }

    /// Magnitude expressed in `unit`, where `None` means "plain number".
    ///
    /// A quantity paired with a plain-number axis (or the reverse) is a
    /// unit mismatch, never silently coerced.
    pub fn magnitude_in(&self, unit: Option<&Unit>) -> PsResult<f64> {
        match (self, unit) {
            (Self::Number(v), None) => Ok(*v),
            (Self::Quantity(q), Some(unit)) => Ok(q.magnitude_in(unit)?),
            (Self::Number(_), Some(unit)) => Err(UnitError::Mismatch {
                expected: unit.symbol().to_string(),
                actual: "plain number".to_string(),
            }
            .into()),
            (Self::Quantity(q), None) => Err(UnitError::Mismatch {
                expected: "plain number".to_string(),
                actual: q.unit().symbol().to_string(),
            }
            .into()),
            (Self::Text(s), _) => Err(SearchError::NotNumeric { value: s.clone() }.into()),
        }
    }

    /// Rebuild a value from a magnitude, reattaching `unit` when present.
    pub fn from_magnitude(magnitude: f64, unit: Option<&Unit>) -> Self {
        match unit {
            Some(unit) => Self::Quantity(Quantity::new(magnitude, unit.clone())),
            None => Self::Number(magnitude),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Quantity> for ParamValue {
    fn from(value: Quantity) -> Self {
        Self::Quantity(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Quantity(q) => write!(f, "{q}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One coordinate across the axes bound so far, in axis order.
///
/// Walkers never share a point between branches: each probe works on its
/// own copy produced by [`TrialPoint::with`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrialPoint {
    entries: Vec<(ParameterKey, ParamValue)>,
}

impl TrialPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Bind `key` in place, keeping its position if already present.
    pub fn set(&mut self, key: impl Into<ParameterKey>, value: ParamValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// A copy of this point with `key` bound to `value`.
    pub fn with(&self, key: impl Into<ParameterKey>, value: ParamValue) -> Self {
        let mut point = self.clone();
        point.set(key, value);
        point
    }
}

impl<K: Into<ParameterKey>> FromIterator<(K, ParamValue)> for TrialPoint {
    fn from_iter<T: IntoIterator<Item = (K, ParamValue)>>(iter: T) -> Self {
        let mut point = TrialPoint::new();
        for (key, value) in iter {
            point.set(key, value);
        }
        point
    }
}

impl Serialize for TrialPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_entries(&self.entries, serializer)
    }
}

impl<'de> Deserialize<'de> for TrialPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = deserializer.deserialize_map(EntriesVisitor::new())?;
        Ok(Self { entries })
    }
}

type DeriveFn = dyn Fn(&TrialPoint) -> PsResult<ParamValue> + Send + Sync;

/// Where an axis starts its sweep.
#[derive(Clone)]
pub enum StartValue {
    Literal(ParamValue),
    /// Computed from the axes already bound for the current branch.
    Derived(Arc<DeriveFn>),
}

impl StartValue {
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&TrialPoint) -> PsResult<ParamValue> + Send + Sync + 'static,
    {
        Self::Derived(Arc::new(f))
    }

    pub fn resolve(&self, prefix: &TrialPoint) -> PsResult<ParamValue> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Derived(f) => f(prefix),
        }
    }
}

impl fmt::Debug for StartValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl From<ParamValue> for StartValue {
    fn from(value: ParamValue) -> Self {
        Self::Literal(value)
    }
}

impl From<f64> for StartValue {
    fn from(value: f64) -> Self {
        Self::Literal(value.into())
    }
}

impl From<Quantity> for StartValue {
    fn from(value: Quantity) -> Self {
        Self::Literal(value.into())
    }
}

/// The caller's starting coordinate. Its key order fixes the recursion order.
#[derive(Debug, Clone, Default)]
pub struct InitialPoint {
    axes: Vec<(ParameterKey, StartValue)>,
}

impl InitialPoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<ParameterKey>, start: impl Into<StartValue>) -> Self {
        self.push(key, start);
        self
    }

    pub fn push(&mut self, key: impl Into<ParameterKey>, start: impl Into<StartValue>) {
        let key = key.into();
        let start = start.into();
        match self.axes.iter_mut().find(|(k, _)| *k == key) {
            Some(axis) => axis.1 = start,
            None => self.axes.push((key, start)),
        }
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn axis(&self, depth: usize) -> Option<(&str, &StartValue)> {
        self.axes.get(depth).map(|(k, s)| (k.as_str(), s))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(k, _)| k.as_str())
    }
}

/// A discovered feasibility interval along one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: ParamValue,
    pub max: ParamValue,
}

/// Field of a persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Value(ParamValue),
    Bounds(Bounds),
}

/// A finalized feasible point, or a prefix whose last axis holds [`Bounds`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entries: Vec<(ParameterKey, RecordValue)>,
}

impl Record {
    pub fn from_point(point: &TrialPoint) -> Self {
        Self {
            entries: point
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), RecordValue::Value(v.clone())))
                .collect(),
        }
    }

    /// `prefix` followed by `key` bound to `bounds`.
    pub fn from_bounds(prefix: &TrialPoint, key: impl Into<ParameterKey>, bounds: Bounds) -> Self {
        let key = key.into();
        let mut entries: Vec<_> = prefix
            .entries
            .iter()
            .filter(|(k, _)| *k != key)
            .map(|(k, v)| (k.clone(), RecordValue::Value(v.clone())))
            .collect();
        entries.push((key, RecordValue::Bounds(bounds)));
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_entries(&self.entries, serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = deserializer.deserialize_map(EntriesVisitor::new())?;
        Ok(Self { entries })
    }
}

fn serialize_entries<V: Serialize, S: Serializer>(
    entries: &[(ParameterKey, V)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

/// Deserialize a map into `(key, value)` pairs in document order.
///
/// For use with `#[serde(deserialize_with = "...")]` on fields whose key
/// order carries meaning, such as the axis order of an initial point.
pub fn deserialize_ordered<'de, D, V>(deserializer: D) -> Result<Vec<(ParameterKey, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    deserializer.deserialize_map(EntriesVisitor::new())
}

/// Reads a map into a vector so document order survives.
struct EntriesVisitor<V>(PhantomData<V>);

impl<V> EntriesVisitor<V> {
    fn new() -> Self {
        Self(PhantomData)
    }
}

impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
    type Value = Vec<(ParameterKey, V)>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of parameter names to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<ParameterKey, V>()? {
            entries.push((key, value));
        }
        Ok(entries)
    }
}
