//! Built-in template functions.
//!
//! The table below is the language's complete function surface.  Every entry
//! lists one [`Coercion`] per parameter; a call must supply exactly that many
//! arguments, and each argument is coerced on its own before the function
//! body runs.  Operators are ordinary entries (`+`, `LT`, `and`, …); the
//! parser rewrites `a + b` into a call to `+`.
//!
//! | Function | Params | Result |
//! |----------|--------|--------|
//! | `words` | str | list of whitespace-separated words, `"quoted runs"` kept whole |
//! | `split` | str, str | list of pieces |
//! | `join` | list, str | string |
//! | `repeat` | str, int | string |
//! | `substring` | str, int, int | slice by character index (negative counts from the end) |
//! | `contains` | str, str | 1 if the regex matches anywhere, else 0 |
//! | `negate` | num | `-x` |
//! | `concat` | str, str | string |
//! | `tostr` / `toint` / `tonumber` | str / int / num | the coerced value |
//! | `abs` `floor` `ceil` `round` | num | number (`round(x)` = `floor(x + 0.5)`) |
//! | `min` `max` | num, num | number |
//! | `len` | list | integer |
//! | `+` `-` `*` `/` `%` | num, num | number (`/` always yields a real) |
//! | `=` `!=` `LT` `GT` `LE` `GE` | any, any | 1 or 0 |
//! | `and` `or` | num, num | 1 or 0 (both operands already evaluated) |

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

use super::value::Value;
use crate::error::{Result, ValidateError};

// ── Coercions ─────────────────────────────────────────────────────────────────

/// A validating conversion applied to one argument before a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Stringify anything.
    Str,
    /// Numbers pass; strings are parsed as an integer, then as a real.
    Number,
    /// Integers (and integral reals) pass; strings must parse as an integer.
    Integer,
    /// Must already be a list.
    List,
    /// No conversion.
    Any,
}

impl Coercion {
    pub fn apply(self, value: Value) -> Result<Value> {
        match self {
            Coercion::Any => Ok(value),
            Coercion::Str => Ok(match value {
                Value::Str(s) => Value::Str(s),
                other => Value::Str(other.to_string()),
            }),
            Coercion::Number => to_number(value),
            Coercion::Integer => to_integer(value),
            Coercion::List => to_list(value).map(Value::List),
        }
    }
}

/// The list coercion, also used for `for-each` sources.
pub fn to_list(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(ValidateError::new(format!(
            "expected list, got {}",
            other.type_name()
        ))),
    }
}

/// The number coercion, also used for loop bounds and conditions.
pub fn to_number(value: Value) -> Result<Value> {
    match value {
        Value::Int(_) | Value::Float(_) => Ok(value),
        Value::Str(s) => {
            let t = s.trim();
            if let Ok(n) = t.parse::<i64>() {
                Ok(Value::Int(n))
            } else if let Ok(x) = t.parse::<f64>() {
                Ok(Value::Float(x))
            } else {
                Err(ValidateError::new(format!("expected number, got '{s}'")))
            }
        }
        other => Err(ValidateError::new(format!(
            "expected number, got {}",
            other.type_name()
        ))),
    }
}

pub fn to_integer(value: Value) -> Result<Value> {
    match value {
        Value::Int(_) => Ok(value),
        Value::Float(x) if x.fract() == 0.0 && x.abs() < 9.2e18 => Ok(Value::Int(x as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ValidateError::new(format!("expected integer, got '{s}'"))),
        other => Err(ValidateError::new(format!(
            "expected integer, got {}",
            other.type_name()
        ))),
    }
}

// ── Function table ────────────────────────────────────────────────────────────

type Builtin = fn(&[Value]) -> Result<Value>;

/// One entry of the function table.
pub struct FunctionDef {
    pub name: &'static str,
    pub params: &'static [Coercion],
    call: Builtin,
}

use Coercion::{Any, Integer, List, Number, Str};

static FUNCTIONS: &[FunctionDef] = &[
    // ── String functions ─────────────────────────────────────────────────────
    FunctionDef { name: "words", params: &[Str], call: fn_words },
    FunctionDef { name: "split", params: &[Str, Str], call: fn_split },
    FunctionDef { name: "join", params: &[List, Str], call: fn_join },
    FunctionDef { name: "repeat", params: &[Str, Integer], call: fn_repeat },
    FunctionDef { name: "substring", params: &[Str, Integer, Integer], call: fn_substring },
    FunctionDef { name: "contains", params: &[Str, Str], call: fn_contains },
    FunctionDef { name: "concat", params: &[Str, Str], call: fn_concat },
    // ── Conversions ──────────────────────────────────────────────────────────
    FunctionDef { name: "tostr", params: &[Str], call: fn_identity },
    FunctionDef { name: "toint", params: &[Integer], call: fn_identity },
    FunctionDef { name: "tonumber", params: &[Number], call: fn_identity },
    // ── Math functions ───────────────────────────────────────────────────────
    FunctionDef { name: "negate", params: &[Number], call: fn_negate },
    FunctionDef { name: "abs", params: &[Number], call: fn_abs },
    FunctionDef { name: "floor", params: &[Number], call: fn_floor },
    FunctionDef { name: "ceil", params: &[Number], call: fn_ceil },
    FunctionDef { name: "round", params: &[Number], call: fn_round },
    FunctionDef { name: "min", params: &[Number, Number], call: fn_min },
    FunctionDef { name: "max", params: &[Number, Number], call: fn_max },
    FunctionDef { name: "len", params: &[List], call: fn_len },
    // ── Operators ────────────────────────────────────────────────────────────
    FunctionDef { name: "+", params: &[Number, Number], call: |a| a[0].arith_add(&a[1]) },
    FunctionDef { name: "-", params: &[Number, Number], call: |a| a[0].arith_sub(&a[1]) },
    FunctionDef { name: "*", params: &[Number, Number], call: |a| a[0].arith_mul(&a[1]) },
    FunctionDef { name: "/", params: &[Number, Number], call: |a| a[0].arith_div(&a[1]) },
    FunctionDef { name: "%", params: &[Number, Number], call: |a| a[0].arith_rem(&a[1]) },
    FunctionDef { name: "=", params: &[Any, Any], call: |a| Ok(a[0].loose_eq(&a[1]).into()) },
    FunctionDef { name: "!=", params: &[Any, Any], call: |a| Ok((!a[0].loose_eq(&a[1])).into()) },
    FunctionDef { name: "LT", params: &[Any, Any], call: |a| ordered(a, |o| o.is_lt()) },
    FunctionDef { name: "GT", params: &[Any, Any], call: |a| ordered(a, |o| o.is_gt()) },
    FunctionDef { name: "LE", params: &[Any, Any], call: |a| ordered(a, |o| o.is_le()) },
    FunctionDef { name: "GE", params: &[Any, Any], call: |a| ordered(a, |o| o.is_ge()) },
    FunctionDef {
        name: "and",
        params: &[Number, Number],
        call: |a| Ok((a[0].is_truthy() && a[1].is_truthy()).into()),
    },
    FunctionDef {
        name: "or",
        params: &[Number, Number],
        call: |a| Ok((a[0].is_truthy() || a[1].is_truthy()).into()),
    },
];

/// Look up a function by name.
pub fn lookup(name: &str) -> Option<&'static FunctionDef> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

/// Call a built-in with already-evaluated arguments.
///
/// Fails for unknown names, for the wrong number of arguments, and when any
/// argument coercion or the function itself fails.
pub fn call_builtin(name: &str, args: Vec<Value>) -> Result<Value> {
    let def = lookup(name)
        .ok_or_else(|| ValidateError::new(format!("unknown function '{name}'")))?;
    if args.len() != def.params.len() {
        return Err(ValidateError::new(format!(
            "invalid number of arguments for function '{name}' (expected {}, got {})",
            def.params.len(),
            args.len()
        )));
    }
    let coerced = args
        .into_iter()
        .zip(def.params)
        .map(|(arg, coercion)| coercion.apply(arg))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| e.context(format!("in call to '{name}'")))?;
    (def.call)(&coerced)
}

// ── Argument access ───────────────────────────────────────────────────────────
//
// Arguments reaching a function body have been coerced, so these only fail if
// the table and the body disagree.

fn str_at(args: &[Value], i: usize) -> Result<&str> {
    match args.get(i) {
        Some(Value::Str(s)) => Ok(s),
        other => Err(mismatch(i, "string", other)),
    }
}

fn int_at(args: &[Value], i: usize) -> Result<i64> {
    match args.get(i) {
        Some(Value::Int(n)) => Ok(*n),
        other => Err(mismatch(i, "integer", other)),
    }
}

fn list_at(args: &[Value], i: usize) -> Result<&[Value]> {
    match args.get(i) {
        Some(Value::List(items)) => Ok(items),
        other => Err(mismatch(i, "list", other)),
    }
}

fn num_at(args: &[Value], i: usize) -> Result<&Value> {
    match args.get(i) {
        Some(v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        other => Err(mismatch(i, "number", other)),
    }
}

fn mismatch(i: usize, expected: &str, got: Option<&Value>) -> ValidateError {
    ValidateError::new(format!(
        "argument {} must be {expected}, got {}",
        i + 1,
        got.map(Value::type_name).unwrap_or("nothing")
    ))
}

// ── Implementations ───────────────────────────────────────────────────────────

fn words_regex() -> Result<&'static Regex> {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = WORDS.get() {
        return Ok(re);
    }
    let re = Regex::new(r#"(?:".*?"|\S)+"#)
        .map_err(|e| ValidateError::new(format!("words: {e}")))?;
    Ok(WORDS.get_or_init(|| re))
}

fn fn_words(args: &[Value]) -> Result<Value> {
    let s = str_at(args, 0)?;
    let words = words_regex()?
        .find_iter(s)
        .map(|m| Value::Str(m.as_str().to_owned()))
        .collect();
    Ok(Value::List(words))
}

fn fn_split(args: &[Value]) -> Result<Value> {
    let s = str_at(args, 0)?;
    let sep = str_at(args, 1)?;
    if sep.is_empty() {
        return Err("split: empty separator".into());
    }
    Ok(Value::List(s.split(sep).map(Value::from).collect()))
}

fn fn_join(args: &[Value]) -> Result<Value> {
    let items = list_at(args, 0)?;
    let sep = str_at(args, 1)?;
    let parts: Vec<String> = items.iter().map(Value::to_string).collect();
    Ok(Value::Str(parts.join(sep)))
}

/// Largest string, in bytes, `repeat` will build.
const MAX_REPEAT_LEN: usize = 1 << 24;

fn fn_repeat(args: &[Value]) -> Result<Value> {
    let s = str_at(args, 0)?;
    let n = usize::try_from(int_at(args, 1)?.max(0)).unwrap_or(usize::MAX);
    if s.len().checked_mul(n).map_or(true, |len| len > MAX_REPEAT_LEN) {
        return Err("repeat: result too large".into());
    }
    Ok(Value::Str(s.repeat(n)))
}

/// Clamp a possibly negative slice index into `0..=len`.
fn slice_index(i: i64, len: usize) -> usize {
    let len_i = len as i64;
    let i = if i < 0 { i + len_i } else { i };
    i.clamp(0, len_i) as usize
}

fn fn_substring(args: &[Value]) -> Result<Value> {
    let chars: Vec<char> = str_at(args, 0)?.chars().collect();
    let begin = slice_index(int_at(args, 1)?, chars.len());
    let end = slice_index(int_at(args, 2)?, chars.len());
    let out: String = if begin < end {
        chars[begin..end].iter().collect()
    } else {
        String::new()
    };
    Ok(Value::Str(out))
}

fn fn_contains(args: &[Value]) -> Result<Value> {
    let s = str_at(args, 0)?;
    let pattern = str_at(args, 1)?;
    let re = Regex::new(pattern)
        .map_err(|e| ValidateError::new(format!("contains: invalid pattern: {e}")))?;
    Ok(re.is_match(s).into())
}

fn fn_concat(args: &[Value]) -> Result<Value> {
    Ok(Value::Str(format!("{}{}", str_at(args, 0)?, str_at(args, 1)?)))
}

fn fn_identity(args: &[Value]) -> Result<Value> {
    args.first()
        .cloned()
        .ok_or_else(|| mismatch(0, "a value", None))
}

fn fn_negate(args: &[Value]) -> Result<Value> {
    num_at(args, 0)?.arith_neg()
}

fn fn_abs(args: &[Value]) -> Result<Value> {
    match num_at(args, 0)? {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| ValidateError::new("integer overflow")),
        v => Ok(Value::Float(v.as_f64().unwrap_or_default().abs())),
    }
}

/// Round a real with `f` and convert the result to an integer.
fn integral(v: &Value, f: fn(f64) -> f64) -> Result<Value> {
    match v {
        Value::Int(n) => Ok(Value::Int(*n)),
        other => {
            let x = f(other.as_f64().unwrap_or_default());
            if x.is_finite() && x.abs() < 9.2e18 {
                Ok(Value::Int(x as i64))
            } else {
                Err(ValidateError::new(format!("cannot convert {x} to integer")))
            }
        }
    }
}

fn fn_floor(args: &[Value]) -> Result<Value> {
    integral(num_at(args, 0)?, f64::floor)
}

fn fn_ceil(args: &[Value]) -> Result<Value> {
    integral(num_at(args, 0)?, f64::ceil)
}

fn fn_round(args: &[Value]) -> Result<Value> {
    integral(num_at(args, 0)?, |x| (x + 0.5).floor())
}

fn fn_min(args: &[Value]) -> Result<Value> {
    let (a, b) = (num_at(args, 0)?, num_at(args, 1)?);
    Ok(if b.compare(a)?.is_lt() { b.clone() } else { a.clone() })
}

fn fn_max(args: &[Value]) -> Result<Value> {
    let (a, b) = (num_at(args, 0)?, num_at(args, 1)?);
    Ok(if b.compare(a)?.is_gt() { b.clone() } else { a.clone() })
}

fn fn_len(args: &[Value]) -> Result<Value> {
    Ok(Value::Int(list_at(args, 0)?.len() as i64))
}

fn ordered(args: &[Value], test: fn(Ordering) -> bool) -> Result<Value> {
    match args {
        [a, b] => Ok(test(a.compare(b)?).into()),
        _ => Err(mismatch(args.len(), "a pair of values", None)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
