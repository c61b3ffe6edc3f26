//! Runtime value type for the template language.
//!
//! Templates are dynamically typed.  A value is null, a number (integer or
//! real, never both), a string, a list, or a card data record.  Values are
//! immutable once produced; conversions between them happen only through the
//! explicit coercions in [`builtins`](super::builtins).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, ValidateError};

/// Per-card data row: column/attribute name → cell text.
pub type Record = BTreeMap<String, String>;

/// A template runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Record(Record),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                // Integral reals keep one decimal so they still read as reals.
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Record(fields) => {
                let json = serde_json::to_string(fields).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

/// Both operands of a binary numeric operation, promoted to a common type.
enum NumPair {
    Ints(i64, i64),
    Floats(f64, f64),
}

impl Value {
    /// Name of the type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "integer",
            Value::Float(_) => "real",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The numeric payload as `f64`, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Numeric truthiness: nonzero numbers are true.
    pub fn is_truthy(&self) -> bool {
        self.as_f64().is_some_and(|x| x != 0.0)
    }

    /// `true` for `Int(0)` and `Float(0.0)`.
    pub fn is_zero(&self) -> bool {
        self.as_f64() == Some(0.0)
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────
    //
    // Operands are expected to have gone through the number coercion already;
    // anything else is reported rather than guessed at.

    fn numeric_pair(&self, rhs: &Value) -> Result<NumPair> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(NumPair::Ints(*a, *b)),
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => Ok(NumPair::Floats(a, b)),
                _ => Err(ValidateError::new(format!(
                    "expected numbers, got {} and {}",
                    self.type_name(),
                    rhs.type_name()
                ))),
            },
        }
    }

    pub fn arith_add(&self, rhs: &Value) -> Result<Value> {
        self.checked_add(rhs)?.ok_or_else(overflow)
    }

    /// Like [`arith_add`](Self::arith_add), but integer overflow is `None`
    /// rather than an error.
    pub fn checked_add(&self, rhs: &Value) -> Result<Option<Value>> {
        match self.numeric_pair(rhs)? {
            NumPair::Ints(a, b) => Ok(a.checked_add(b).map(Value::Int)),
            NumPair::Floats(a, b) => Ok(Some(Value::Float(a + b))),
        }
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value> {
        match self.numeric_pair(rhs)? {
            NumPair::Ints(a, b) => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            NumPair::Floats(a, b) => Ok(Value::Float(a - b)),
        }
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value> {
        match self.numeric_pair(rhs)? {
            NumPair::Ints(a, b) => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            NumPair::Floats(a, b) => Ok(Value::Float(a * b)),
        }
    }

    /// True division: the result is always real.
    pub fn arith_div(&self, rhs: &Value) -> Result<Value> {
        let (a, b) = match self.numeric_pair(rhs)? {
            NumPair::Ints(a, b) => (a as f64, b as f64),
            NumPair::Floats(a, b) => (a, b),
        };
        if b == 0.0 {
            return Err("division by zero".into());
        }
        Ok(Value::Float(a / b))
    }

    /// Remainder taking the sign of the divisor.
    pub fn arith_rem(&self, rhs: &Value) -> Result<Value> {
        match self.numeric_pair(rhs)? {
            NumPair::Ints(_, 0) => Err("modulo by zero".into()),
            NumPair::Ints(a, b) => {
                let r = a.checked_rem(b).ok_or_else(overflow)?;
                Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
            }
            NumPair::Floats(_, b) if b == 0.0 => Err("modulo by zero".into()),
            NumPair::Floats(a, b) => {
                let r = a % b;
                Ok(Value::Float(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }))
            }
        }
    }

    pub fn arith_neg(&self) -> Result<Value> {
        match self {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(overflow),
            Value::Float(x) => Ok(Value::Float(-x)),
            other => Err(ValidateError::new(format!(
                "expected number, got {}",
                other.type_name()
            ))),
        }
    }

    // ── Comparison ────────────────────────────────────────────────────────────

    /// Equality across types: integers and reals compare numerically, lists
    /// element-wise, everything else only against its own type.
    pub fn loose_eq(&self, rhs: &Value) -> bool {
        match (self, rhs) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => match (self, rhs) {
                    (Value::Int(x), Value::Int(y)) => x == y,
                    _ => a == b,
                },
                _ => self == rhs,
            },
        }
    }

    /// Ordering of numbers, strings, and lists.  Mixed or unordered types fail.
    pub fn compare(&self, rhs: &Value) -> Result<Ordering> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                // First differing element decides; otherwise the shorter list is smaller.
                for (x, y) in a.iter().zip(b) {
                    if !x.loose_eq(y) {
                        return x.compare(y);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| uncomparable(self, rhs)),
                _ => Err(uncomparable(self, rhs)),
            },
        }
    }
}

fn overflow() -> ValidateError {
    ValidateError::new("integer overflow")
}

fn uncomparable(a: &Value, b: &Value) -> ValidateError {
    ValidateError::new(format!(
        "cannot compare {} with {}",
        a.type_name(),
        b.type_name()
    ))
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(if b { 1 } else { 0 })
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Record> for Value {
    fn from(fields: Record) -> Self {
        Value::Record(fields)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_numbers() {
        assert_eq!(Value::Int(-7).to_string(), "-7");
        assert_eq!(Value::Float(3.25).to_string(), "3.25");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
    }

    #[test]
    fn display_null_is_empty() {
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn display_list_and_record() {
        let list = Value::List(vec![Value::Int(1), "a".into()]);
        assert_eq!(list.to_string(), "[1, a]");
        let mut rec = Record::new();
        rec.insert("name".into(), "Goblin".into());
        assert_eq!(Value::Record(rec).to_string(), r#"{"name":"Goblin"}"#);
    }

    #[test]
    fn arithmetic() {
        let a = Value::Int(10);
        let b = Value::Int(3);
        assert_eq!(a.arith_add(&b), Ok(Value::Int(13)));
        assert_eq!(a.arith_sub(&b), Ok(Value::Int(7)));
        assert_eq!(a.arith_mul(&b), Ok(Value::Int(30)));
        assert_eq!(Value::Int(9).arith_div(&b), Ok(Value::Float(3.0)));
        assert_eq!(a.arith_rem(&b), Ok(Value::Int(1)));
    }

    #[test]
    fn remainder_follows_divisor_sign() {
        assert_eq!(Value::Int(-7).arith_rem(&Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(Value::Int(7).arith_rem(&Value::Int(-3)), Ok(Value::Int(-2)));
        assert_eq!(Value::Float(-1.5).arith_rem(&Value::Float(1.0)), Ok(Value::Float(0.5)));
    }

    #[test]
    fn div_by_zero() {
        assert!(Value::Int(1).arith_div(&Value::Int(0)).is_err());
        assert!(Value::Int(1).arith_rem(&Value::Int(0)).is_err());
        assert!(Value::Float(1.0).arith_rem(&Value::Float(0.0)).is_err());
    }

    #[test]
    fn overflow_is_an_error() {
        let e = Value::Int(i64::MAX).arith_add(&Value::Int(1)).unwrap_err();
        assert_eq!(e.message(), "integer overflow");
        assert!(Value::Int(i64::MIN).arith_neg().is_err());
    }

    #[test]
    fn float_promotion() {
        assert_eq!(Value::Int(7).arith_add(&Value::Float(2.0)), Ok(Value::Float(9.0)));
    }

    #[test]
    fn non_numbers_rejected() {
        assert!(Value::Str("1".into()).arith_add(&Value::Int(1)).is_err());
        assert!(Value::Null.arith_neg().is_err());
    }

    #[test]
    fn equality_across_numeric_types() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(!Value::Int(1).loose_eq(&Value::Str("1".into())));
        assert!(Value::Null.loose_eq(&Value::Null));
        assert!(Value::List(vec![Value::Int(2)]).loose_eq(&Value::List(vec![Value::Float(2.0)])));
    }

    #[test]
    fn ordering() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.5)), Ok(Ordering::Less));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Ok(Ordering::Greater));
        let short = Value::List(vec![Value::Int(1)]);
        let long = Value::List(vec![Value::Int(1), Value::Int(0)]);
        assert_eq!(short.compare(&long), Ok(Ordering::Less));
        assert!(Value::from("a").compare(&Value::Int(1)).is_err());
    }

    #[test]
    fn truthiness() {
        assert!(Value::Int(2).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::from("1").is_truthy());
    }

    #[test]
    fn from_impls() {
        let v: Value = 42i64.into();
        assert_eq!(v, Value::Int(42));
        let v: Value = true.into();
        assert_eq!(v, Value::Int(1));
    }
}
