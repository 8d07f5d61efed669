use std::{cmp::Ordering, fmt};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::ColumnType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Guid(Uuid),
    Decimal(Decimal),
}

/// Equality follows the ordering: numbers compare by value across integer
/// and float, `NaN` equals `NaN`, and `-0.0` equals `0.0`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Time(t) => t.format("%H:%M:%S").to_string(),
            Value::Guid(g) => g.to_string(),
            Value::Decimal(d) => d.to_string(),
        }
    }

    /// Name of the type family this value belongs to, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Time(_) => "time",
            Value::Guid(_) => "guid",
            Value::Decimal(_) => "decimal",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Integer(_) => 1,
            Value::Float(_) => 2,
            Value::Decimal(_) => 3,
            Value::Date(_) => 4,
            Value::DateTime(_) => 5,
            Value::Time(_) => 6,
            Value::Guid(_) => 7,
            Value::String(_) => 8,
        }
    }

    /// Converts the value into `target`, the way a `CAST(value AS target)` would.
    pub fn cast(&self, target: &ColumnType) -> Result<Value> {
        let cast = match (self, target) {
            (_, ColumnType::String) => Value::String(self.as_display()),
            (Value::String(s), _) => parse_typed_value(s, target)?
                .ok_or_else(|| anyhow!("Cannot cast an empty string to {target}"))?,
            (Value::Integer(i), ColumnType::Integer) => Value::Integer(*i),
            (Value::Integer(i), ColumnType::Float) => Value::Float(*i as f64),
            (Value::Integer(i), ColumnType::Boolean) => Value::Boolean(*i != 0),
            (Value::Integer(i), ColumnType::Decimal(spec)) => {
                Value::Decimal(Decimal::from(*i).round_dp(spec.scale))
            }
            (Value::Float(f), ColumnType::Float) => Value::Float(*f),
            (Value::Float(f), ColumnType::Integer) => {
                if f.fract() != 0.0 || !f.is_finite() {
                    bail!("Cannot cast {f} to integer without losing precision");
                }
                Value::Integer(*f as i64)
            }
            (Value::Float(f), ColumnType::Decimal(spec)) => Value::Decimal(
                Decimal::from_f64(*f)
                    .ok_or_else(|| anyhow!("Cannot represent {f} as decimal"))?
                    .round_dp(spec.scale),
            ),
            (Value::Decimal(d), ColumnType::Decimal(spec)) => Value::Decimal(d.round_dp(spec.scale)),
            (Value::Decimal(d), ColumnType::Float) => Value::Float(
                d.to_f64()
                    .ok_or_else(|| anyhow!("Cannot represent {d} as float"))?,
            ),
            (Value::Decimal(d), ColumnType::Integer) => {
                if !d.fract().is_zero() {
                    bail!("Cannot cast {d} to integer without losing precision");
                }
                Value::Integer(
                    d.to_i64()
                        .ok_or_else(|| anyhow!("Decimal {d} is out of integer range"))?,
                )
            }
            (Value::Boolean(b), ColumnType::Boolean) => Value::Boolean(*b),
            (Value::Boolean(b), ColumnType::Integer) => Value::Integer(i64::from(*b)),
            (Value::Date(d), ColumnType::Date) => Value::Date(*d),
            (Value::Date(d), ColumnType::DateTime) => Value::DateTime(d.and_time(NaiveTime::MIN)),
            (Value::DateTime(dt), ColumnType::DateTime) => Value::DateTime(*dt),
            (Value::DateTime(dt), ColumnType::Date) => Value::Date(dt.date()),
            (Value::DateTime(dt), ColumnType::Time) => Value::Time(dt.time()),
            (Value::Time(t), ColumnType::Time) => Value::Time(*t),
            (Value::Guid(g), ColumnType::Guid) => Value::Guid(*g),
            (value, target) => bail!("Cannot cast {} value '{value}' to {target}", value.type_name()),
        };
        Ok(cast)
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => compare_floats(*a, *b),
            (Value::Integer(a), Value::Float(b)) => compare_floats(*a as f64, *b),
            (Value::Float(a), Value::Integer(b)) => compare_floats(*a, *b as f64),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (Value::Guid(a), Value::Guid(b)) => a.cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => a.cmp(b),
            (left, right) => left.rank().cmp(&right.rank()),
        }
    }
}

/// Total order with every `NaN` equal to the others and greater than any number.
fn compare_floats(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Sort key wrapper placing nulls ahead of every value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparableValue<'a>(pub Option<&'a Value>);

impl Ord for ComparableValue<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(left), Some(right)) => left.cmp(right),
        }
    }
}

impl PartialOrd for ComparableValue<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn parse_naive_time(value: &str) -> Result<NaiveTime> {
    const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];
    for fmt in TIME_FORMATS {
        if let Ok(parsed) = NaiveTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as time"))
}

/// Parses a raw text cell into a typed value. Empty cells are null.
pub fn parse_typed_value(value: &str, ty: &ColumnType) -> Result<Option<Value>> {
    if value.is_empty() {
        return Ok(None);
    }
    let parsed = match ty {
        ColumnType::String => Value::String(value.to_string()),
        ColumnType::Integer => {
            let parsed: i64 = value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as integer"))?;
            Value::Integer(parsed)
        }
        ColumnType::Float => {
            let parsed: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as float"))?;
            Value::Float(parsed)
        }
        ColumnType::Boolean => {
            let lowered = value.trim().to_ascii_lowercase();
            let parsed = match lowered.as_str() {
                "true" | "t" | "yes" | "y" | "1" => true,
                "false" | "f" | "no" | "n" | "0" => false,
                _ => bail!("Failed to parse '{value}' as boolean"),
            };
            Value::Boolean(parsed)
        }
        ColumnType::Date => Value::Date(parse_naive_date(value.trim())?),
        ColumnType::DateTime => Value::DateTime(parse_naive_datetime(value.trim())?),
        ColumnType::Time => Value::Time(parse_naive_time(value.trim())?),
        ColumnType::Guid => {
            let trimmed = value.trim().trim_matches(|c| matches!(c, '{' | '}'));
            let parsed = Uuid::parse_str(trimmed)
                .with_context(|| format!("Failed to parse '{value}' as GUID"))?;
            Value::Guid(parsed)
        }
        ColumnType::Decimal(spec) => {
            let parsed: Decimal = value
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse '{value}' as decimal"))?;
            if parsed.scale() > spec.scale {
                bail!(
                    "Decimal '{value}' has {} fractional digit(s) but {} allows {}",
                    parsed.scale(),
                    spec.signature(),
                    spec.scale
                );
            }
            Value::Decimal(parsed)
        }
    };
    Ok(Some(parsed))
}

/// Parses a cell written by the table store. Nulls are spelled `null_token`;
/// any other cell is a value, so an empty string column cell stays `""`.
pub fn parse_stored_value(value: &str, ty: &ColumnType, null_token: &str) -> Result<Option<Value>> {
    if value == null_token {
        return Ok(None);
    }
    match ty {
        ColumnType::String => Ok(Some(Value::String(value.to_string()))),
        _ => parse_typed_value(value, ty),
    }
}
