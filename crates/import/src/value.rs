use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A typed field value extracted from a record for diffing.
///
/// Closed set: integrators map whatever their record fields are into one of
/// these variants via the accessors they register. Equality is the
/// reconciliation rule, not representational equality — see `PartialEq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    /// Absent/null. Equal only to another `Empty`.
    Empty,
    Text(String),
    Integer(i64),
    Bool(bool),
    Date(NaiveDate),
    /// Fixed-point decimal: `unscaled * 10^-scale`.
    /// `100` is `{ unscaled: 100, scale: 0 }`, `100.00` is
    /// `{ unscaled: 10000, scale: 2 }`; the two compare equal.
    Decimal { unscaled: i64, scale: u32 },
    /// Pointer to a domain object, compared by key. `short_name` is the
    /// human-readable rendering substituted into deltas when present.
    Reference {
        key: String,
        short_name: Option<String>,
    },
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn decimal(unscaled: i64, scale: u32) -> Self {
        FieldValue::Decimal { unscaled, scale }
    }

    /// Parse a plain decimal string (`"100"`, `"100.00"`, `"-3.5"`).
    /// Returns `None` for anything else; no exponents, no grouping.
    pub fn parse_decimal(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        let (int_part, frac_part) = match trimmed.split_once('.') {
            Some((i, f)) => (i, f),
            None => (trimmed, ""),
        };
        if !frac_part.is_empty() && !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let digits = format!("{int_part}{frac_part}");
        let unscaled: i64 = digits.parse().ok()?;
        Some(FieldValue::Decimal {
            unscaled,
            scale: frac_part.len() as u32,
        })
    }

    pub fn reference(key: impl Into<String>, short_name: Option<&str>) -> Self {
        FieldValue::Reference {
            key: key.into(),
            short_name: short_name.map(str::to_string),
        }
    }

    /// The value as stored into a delta: a reference carrying a short
    /// display name collapses to plain text so diff output stays readable
    /// without the engine knowing the domain type.
    pub fn for_display(&self) -> FieldValue {
        match self {
            FieldValue::Reference {
                short_name: Some(name),
                ..
            } => FieldValue::Text(name.clone()),
            other => other.clone(),
        }
    }
}

/// Value-based equality:
/// - two `Empty` are equal, `Empty` vs anything else is not;
/// - decimals compare by numeric value, ignoring scale;
/// - references compare by key only;
/// - mixed variants are unequal.
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Empty, FieldValue::Empty) => true,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Date(a), FieldValue::Date(b)) => a == b,
            (
                FieldValue::Decimal {
                    unscaled: ua,
                    scale: sa,
                },
                FieldValue::Decimal {
                    unscaled: ub,
                    scale: sb,
                },
            ) => decimal_eq(*ua, *sa, *ub, *sb),
            (FieldValue::Reference { key: a, .. }, FieldValue::Reference { key: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// Cross-multiplied comparison in i128 so rescaling cannot overflow:
/// a * 10^sb == b * 10^sa.
fn decimal_eq(a: i64, sa: u32, b: i64, sb: u32) -> bool {
    let a = a as i128 * 10i128.pow(sb);
    let b = b as i128 * 10i128.pow(sa);
    a == b
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Date(d) => write!(f, "{d}"),
            FieldValue::Decimal { unscaled, scale } => {
                if *scale == 0 {
                    write!(f, "{unscaled}")
                } else {
                    let divisor = 10i64.pow(*scale);
                    let sign = if *unscaled < 0 { "-" } else { "" };
                    let abs = unscaled.unsigned_abs();
                    let whole = abs / divisor.unsigned_abs();
                    let frac = abs % divisor.unsigned_abs();
                    write!(f, "{sign}{whole}.{frac:0width$}", width = *scale as usize)
                }
            }
            FieldValue::Reference { key, short_name } => match short_name {
                Some(name) => write!(f, "{name}"),
                None => write!(f, "{key}"),
            },
        }
    }
}
