//! Value coercion between CLI text, SQL literals and native values.
//!
//! This is the only place where untyped input meets typed columns:
//!
//! - [`quote`] renders operator text as a SQL literal for a column kind.
//! - [`unquote`] decodes the server's text rendering of a column back into a
//!   [`Value`].
//!
//! Empty or whitespace-only input always quotes as `NULL`, whatever the kind.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::kind::SqlKind;
use crate::value::Value;

/// Words that mean `false` for boolean columns, compared lowercase.
pub const FALSE_WORDS: [&str; 6] = ["f", "false", "0", "null", "n", "no"];

/// The SQL NULL literal.
pub const NULL: &str = "NULL";

fn digit_runs() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("static pattern compiles"))
}

/// Whether `text` is one of the [`FALSE_WORDS`], ignoring case.
pub fn is_false_word(text: &str) -> bool {
    let lower = text.to_lowercase();
    FALSE_WORDS.contains(&lower.as_str())
}

/// Render `value` as a SQL literal for a column of `kind`.
///
/// Numeric kinds are passed through verbatim; the server is left to reject
/// malformed numbers.
pub fn quote(value: &str, kind: SqlKind) -> String {
    if value.trim().is_empty() {
        return NULL.to_string();
    }
    match kind {
        SqlKind::Bool => {
            if is_false_word(value) {
                "FALSE".to_string()
            } else {
                "TRUE".to_string()
            }
        }
        SqlKind::SmallInt
        | SqlKind::Int
        | SqlKind::BigInt
        | SqlKind::Numeric
        | SqlKind::Real
        | SqlKind::Double => value.to_string(),
        SqlKind::Date => format!("'{value}'"),
        SqlKind::Timestamp => {
            // ISO `T` separators and zone letters become spaces so the literal
            // stays a plain `date time` pair.
            let defused: String = value
                .chars()
                .map(|c| if c.is_ascii_alphabetic() { ' ' } else { c })
                .collect();
            format!("'{defused}'")
        }
        SqlKind::Text => format!("'{}'", value.replace('\'', "''")),
    }
}

/// Decode the server's text for a column of `kind`. `None` is SQL NULL.
///
/// Numerics decode to [`Decimal`], which has no `NaN` or infinities; those
/// values fail with [`Error::Decode`] like any other unreadable text.
pub fn unquote(text: Option<&str>, kind: SqlKind) -> Result<Value> {
    let Some(text) = text else {
        return Ok(Value::Null);
    };
    let decode_error = || Error::Decode {
        kind: kind.as_str(),
        text: text.to_string(),
    };

    match kind {
        SqlKind::Bool => Ok(Value::Bool(!is_false_word(text))),
        SqlKind::SmallInt | SqlKind::Int | SqlKind::BigInt => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| decode_error()),
        SqlKind::Numeric => Decimal::from_str(text.trim())
            .map(Value::Decimal)
            .map_err(|_| decode_error()),
        SqlKind::Real | SqlKind::Double => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| decode_error()),
        SqlKind::Date => {
            let parts = numeric_components(text);
            let date = calendar_date(&parts).ok_or_else(decode_error)?;
            Ok(Value::Date(date))
        }
        SqlKind::Timestamp => {
            let parts = numeric_components(text);
            let date = calendar_date(&parts).ok_or_else(decode_error)?;
            let field = |i: usize| -> Option<u32> {
                parts.get(i).map_or(Some(0), |p| p.parse().ok())
            };
            let nanos = parts.get(6).map_or(Some(0), |p| fraction_nanos(p));
            let (Some(hour), Some(minute), Some(second), Some(nanos)) =
                (field(3), field(4), field(5), nanos)
            else {
                return Err(decode_error());
            };
            let ts = date
                .and_hms_nano_opt(hour, minute, second, nanos)
                .ok_or_else(decode_error)?;
            Ok(Value::Timestamp(ts.and_utc()))
        }
        SqlKind::Text => Ok(Value::Text(text.to_string())),
    }
}

/// Split `text` on every run of non-digit characters.
fn numeric_components(text: &str) -> Vec<&str> {
    digit_runs().find_iter(text).map(|m| m.as_str()).collect()
}

fn calendar_date(parts: &[&str]) -> Option<NaiveDate> {
    let [year, month, day, ..] = parts else {
        return None;
    };
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Interpret the digits after the seconds' decimal point as nanoseconds.
fn fraction_nanos(digits: &str) -> Option<u32> {
    let mut padded: String = digits.chars().take(9).collect();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.parse().ok()
}
