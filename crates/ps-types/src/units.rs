//! Runtime unit tags and dimensioned quantities.
//!
//! A [`Unit`] carries the symbol it was written with, its dimension (as
//! exponents of length, mass, time and temperature) and its scale relative
//! to SI. Units with equal dimensions are compatible and convert by scale.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::UnitError;

/// Exponents of the base dimensions a unit is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
    pub temperature: i8,
}

impl Dimension {
    pub const NONE: Dimension = Dimension::new(0, 0, 0, 0);

    pub const fn new(length: i8, mass: i8, time: i8, temperature: i8) -> Self {
        Self {
            length,
            mass,
            time,
            temperature,
        }
    }

    /// `None` when an exponent leaves the `i8` range.
    fn pow(self, power: i8) -> Option<Self> {
        Some(Self::new(
            self.length.checked_mul(power)?,
            self.mass.checked_mul(power)?,
            self.time.checked_mul(power)?,
            self.temperature.checked_mul(power)?,
        ))
    }

    fn combine(self, other: Self) -> Option<Self> {
        Some(Self::new(
            self.length.checked_add(other.length)?,
            self.mass.checked_add(other.mass)?,
            self.time.checked_add(other.time)?,
            self.temperature.checked_add(other.temperature)?,
        ))
    }

    pub fn is_dimensionless(&self) -> bool {
        *self == Self::NONE
    }
}

const LENGTH: Dimension = Dimension::new(1, 0, 0, 0);
const MASS: Dimension = Dimension::new(0, 1, 0, 0);
const TIME: Dimension = Dimension::new(0, 0, 1, 0);
const TEMPERATURE: Dimension = Dimension::new(0, 0, 0, 1);
const ENERGY: Dimension = Dimension::new(2, 1, -2, 0);
const POWER: Dimension = Dimension::new(2, 1, -3, 0);
const FORCE: Dimension = Dimension::new(1, 1, -2, 0);
const FREQUENCY: Dimension = Dimension::new(0, 0, -1, 0);

/// Known base symbols with their dimension and SI scale.
fn lookup(symbol: &str) -> Option<(Dimension, f64)> {
    let entry = match symbol {
        "m" => (LENGTH, 1.0),
        "mm" => (LENGTH, 1e-3),
        "cm" => (LENGTH, 1e-2),
        "km" => (LENGTH, 1e3),
        "AU" => (LENGTH, 1.495_978_707e11),
        "pc" => (LENGTH, 3.085_677_581_491_367e16),
        "Rsun" => (LENGTH, 6.957e8),
        "g" => (MASS, 1e-3),
        "kg" => (MASS, 1.0),
        "Msun" => (MASS, 1.988_409_870_698_051e30),
        "s" => (TIME, 1.0),
        "ms" => (TIME, 1e-3),
        "min" => (TIME, 60.0),
        "h" => (TIME, 3_600.0),
        "d" | "day" => (TIME, 86_400.0),
        "yr" => (TIME, 3.155_76e7),
        "K" => (TEMPERATURE, 1.0),
        "J" => (ENERGY, 1.0),
        "erg" => (ENERGY, 1e-7),
        "W" => (POWER, 1.0),
        "Lsun" => (POWER, 3.828e26),
        "N" => (FORCE, 1.0),
        "dyn" => (FORCE, 1e-5),
        "Hz" => (FREQUENCY, 1.0),
        _ => return None,
    };
    Some(entry)
}

/// A unit tag such as `km/s` or `K`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Unit {
    symbol: String,
    dimension: Dimension,
    scale: f64,
}

impl Unit {
    /// Parse a unit expression.
    ///
    /// Factors are separated by `*` or whitespace, every `/` starts a
    /// denominator group, and `^n` raises a factor to an integer power.
    /// The empty string and `1` denote a dimensionless unit.
    pub fn parse(expression: &str) -> Result<Self, UnitError> {
        let symbol = expression.trim();
        let malformed = || UnitError::Malformed {
            expression: expression.to_string(),
        };

        let mut dimension = Dimension::NONE;
        let mut scale = 1.0_f64;

        if !(symbol.is_empty() || symbol == "1") {
            for (index, group) in symbol.split('/').enumerate() {
                let sign: i8 = if index == 0 { 1 } else { -1 };
                let factors: Vec<&str> = group
                    .split(|c: char| c == '*' || c.is_whitespace())
                    .filter(|f| !f.is_empty())
                    .collect();
                if factors.is_empty() {
                    return Err(malformed());
                }

                for factor in factors {
                    let (base, power) = match factor.split_once('^') {
                        Some((base, power)) => {
                            (base, power.parse::<i8>().map_err(|_| malformed())?)
                        }
                        None => (factor, 1),
                    };
                    if base == "1" && index == 0 {
                        continue;
                    }
                    let (base_dimension, base_scale) =
                        lookup(base).ok_or_else(|| UnitError::Unknown {
                            symbol: base.to_string(),
                        })?;
                    let power = power.checked_mul(sign).ok_or_else(malformed)?;
                    dimension = base_dimension
                        .pow(power)
                        .and_then(|raised| dimension.combine(raised))
                        .ok_or_else(malformed)?;
                    scale *= base_scale.powi(i32::from(power));
                }
            }
        }

        Ok(Self {
            symbol: symbol.to_string(),
            dimension,
            scale,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Size of one of this unit in SI base units.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Factor that converts a magnitude in `self` into a magnitude in `target`.
    pub fn conversion_factor(&self, target: &Unit) -> Result<f64, UnitError> {
        if !self.is_compatible(target) {
            return Err(UnitError::Incompatible {
                from: self.symbol.clone(),
                to: target.symbol.clone(),
            });
        }
        Ok(self.scale / target.scale)
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

impl TryFrom<String> for Unit {
    type Error = UnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Unit::parse(&value)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.symbol
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

/// An immutable magnitude with a unit tag.
///
/// Serializes as `{"value": <number>, "unit": "<symbol>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    value: f64,
    unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Build a quantity from a magnitude and a unit expression.
    pub fn parse(value: f64, unit: &str) -> Result<Self, UnitError> {
        Ok(Self::new(value, Unit::parse(unit)?))
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Same unit, different magnitude.
    pub fn with_value(&self, value: f64) -> Self {
        Self::new(value, self.unit.clone())
    }

    /// Magnitude of this quantity expressed in `unit`.
    pub fn magnitude_in(&self, unit: &Unit) -> Result<f64, UnitError> {
        if self.unit == *unit {
            return Ok(self.value);
        }
        Ok(self.value * self.unit.conversion_factor(unit)?)
    }

    /// Convert to a compatible unit.
    pub fn to(&self, unit: &Unit) -> Result<Quantity, UnitError> {
        Ok(Self::new(self.magnitude_in(unit)?, unit.clone()))
    }

    /// Sum of two quantities carrying the same unit.
    pub fn checked_add(&self, other: &Quantity) -> Result<Quantity, UnitError> {
        self.require_same_unit(other)?;
        Ok(self.with_value(self.value + other.value))
    }

    /// Difference of two quantities carrying the same unit.
    pub fn checked_sub(&self, other: &Quantity) -> Result<Quantity, UnitError> {
        self.require_same_unit(other)?;
        Ok(self.with_value(self.value - other.value))
    }

    pub fn scaled(&self, factor: f64) -> Self {
        self.with_value(self.value * factor)
    }

    fn require_same_unit(&self, other: &Quantity) -> Result<(), UnitError> {
        if self.unit != other.unit {
            return Err(UnitError::Mismatch {
                expected: self.unit.symbol.clone(),
                actual: other.unit.symbol.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.symbol.is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parses_compound_units() {
        let velocity = Unit::parse("km/s").unwrap();
        assert_eq!(velocity.dimension(), Dimension::new(1, 0, -1, 0));
        assert_relative_eq!(velocity.scale(), 1e3);

        let luminosity = Unit::parse("erg / s").unwrap();
        assert_eq!(luminosity.dimension(), POWER);
        assert_relative_eq!(luminosity.scale(), 1e-7);

        let density = Unit::parse("g/cm^3").unwrap();
        assert_eq!(density.dimension(), Dimension::new(-3, 1, 0, 0));
        assert_relative_eq!(density.scale(), 1e3, max_relative = 1e-12);

        let rate = Unit::parse("1/s").unwrap();
        assert_eq!(rate.dimension(), FREQUENCY);
    }

    #[test]
    fn dimensionless_unit() {
        let unit = Unit::parse("").unwrap();
        assert!(unit.dimension().is_dimensionless());
        assert_eq!(unit.scale(), 1.0);
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert_eq!(
            Unit::parse("furlong").unwrap_err(),
            UnitError::Unknown {
                symbol: "furlong".into()
            }
        );
        assert!(matches!(
            Unit::parse("km/").unwrap_err(),
            UnitError::Malformed { .. }
        ));
        assert!(matches!(
            Unit::parse("m^x").unwrap_err(),
            UnitError::Malformed { .. }
        ));
    }

    #[test]
    fn exponent_overflow_is_malformed() {
        for expression in ["J^64", "1/m^-128", "m^100*m^100", "W^127"] {
            assert!(
                matches!(
                    Unit::parse(expression).unwrap_err(),
                    UnitError::Malformed { .. }
                ),
                "{expression}"
            );
        }

        let parsed = serde_json::from_str::<Quantity>(r#"{"value":1.0,"unit":"m^100*m^100"}"#);
        assert!(parsed.is_err());

        let near_limit = Unit::parse("m^127").unwrap();
        assert_eq!(near_limit.dimension(), Dimension::new(127, 0, 0, 0));
    }

    #[test]
    fn converts_between_compatible_units() {
        let t = Quantity::parse(2.0, "day").unwrap();
        let hours = t.to(&Unit::parse("h").unwrap()).unwrap();
        assert_relative_eq!(hours.value(), 48.0);
        assert_eq!(hours.unit().symbol(), "h");

        let v = Quantity::parse(10_000.0, "km/s").unwrap();
        let cgs = v.magnitude_in(&Unit::parse("cm/s").unwrap()).unwrap();
        assert_relative_eq!(cgs, 1e9, max_relative = 1e-12);
    }

    #[test]
    fn refuses_incompatible_conversion() {
        let t = Quantity::parse(12_000.0, "K").unwrap();
        let err = t.to(&Unit::parse("s").unwrap()).unwrap_err();
        assert!(matches!(err, UnitError::Incompatible { .. }));
    }

    #[test]
    fn arithmetic_requires_matching_units() {
        let a = Quantity::parse(1.0, "km").unwrap();
        let b = Quantity::parse(2.0, "km").unwrap();
        assert_eq!(a.checked_add(&b).unwrap().value(), 3.0);
        assert_eq!(b.checked_sub(&a).unwrap().value(), 1.0);

        let c = Quantity::parse(2.0, "m").unwrap();
        assert!(matches!(
            a.checked_add(&c).unwrap_err(),
            UnitError::Mismatch { .. }
        ));
    }

    #[test]
    fn quantity_serializes_as_value_and_unit() {
        let q = Quantity::parse(5000.0, "km/s").unwrap();
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json, serde_json::json!({"value": 5000.0, "unit": "km/s"}));

        let back: Quantity = serde_json::from_value(json).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn unknown_unit_fails_deserialization() {
        let result: Result<Quantity, _> =
            serde_json::from_value(serde_json::json!({"value": 1.0, "unit": "parsec"}));
        assert!(result.is_err());
    }
}
