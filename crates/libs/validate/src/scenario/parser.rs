//! Scenario line parser
//!
//! Each script line is one structure: a type name followed by
//! comma-separated `key=value` fields, optionally terminated by `;`.
//!
//! ```text
//! seek, name=Fast-forward, playback_time=2.0, start=(double)5.0, flags="accurate+flush"
//! ```
//!
//! Values may be double-quoted strings, numbers, booleans, or carry an explicit
//! `(type)` cast. Fields land in a JSON object so executors can read them
//! without caring about the script syntax.

use serde_json::{Map, Number, Value};

/// A parsed script line
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub name: String,
    pub fields: Map<String, Value>,
}

/// Why a line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty structure")]
    Empty,

    #[error("invalid structure name '{0}'")]
    InvalidName(String),

    #[error("unterminated quoted string")]
    UnterminatedQuote,

    #[error("field '{0}' is not of the form key=value")]
    MalformedField(String),

    #[error("invalid field name '{0}'")]
    InvalidKey(String),

    #[error("value '{value}' cannot be read as {cast}")]
    BadCast { cast: String, value: String },

    #[error("unknown type cast '({0})'")]
    UnknownCast(String),
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.' | ':' | '/')
}

/// Parse one structure line
pub fn parse_structure(line: &str) -> Result<Structure, ParseError> {
    let line = line.trim();
    let line = line.strip_suffix(';').unwrap_or(line).trim_end();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parts = split_fields(line)?.into_iter();
    let name = parts.next().unwrap_or_default().trim().to_string();
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(ParseError::InvalidName(name));
    }

    let mut fields = Map::new();
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, raw) = part
            .split_once('=')
            .ok_or_else(|| ParseError::MalformedField(part.to_string()))?;
        let key = key.trim();
        if key.is_empty() || !key.chars().all(is_name_char) {
            return Err(ParseError::InvalidKey(key.to_string()));
        }
        fields.insert(key.to_string(), parse_value(raw.trim())?);
    }

    Ok(Structure { name, fields })
}

/// Split on commas that are not inside a quoted string
fn split_fields(line: &str) -> Result<Vec<String>, ParseError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in line.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(ParseError::UnterminatedQuote);
    }
    fields.push(current);
    Ok(fields)
}

fn parse_value(raw: &str) -> Result<Value, ParseError> {
    if let Some(rest) = raw.strip_prefix('(') {
        if let Some((cast, value)) = rest.split_once(')') {
            return cast_value(cast.trim(), value.trim());
        }
    }

    if let Some(text) = unquote(raw) {
        return Ok(Value::String(text));
    }
    Ok(infer_value(raw))
}

fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn infer_value(raw: &str) -> Value {
    match raw {
        "true" | "TRUE" | "yes" => return Value::Bool(true),
        "false" | "FALSE" | "no" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(raw.to_string())
}

fn cast_value(cast: &str, raw: &str) -> Result<Value, ParseError> {
    let bad = || ParseError::BadCast {
        cast: cast.to_string(),
        value: raw.to_string(),
    };
    let text = unquote(raw).unwrap_or_else(|| raw.to_string());

    match cast {
        "double" | "gdouble" | "float" | "gfloat" | "d" | "f" => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(bad),
        "int" | "gint" | "i" | "int64" | "gint64" | "uint" | "guint" | "uint64" | "guint64"
        | "u" => text
            .parse::<i64>()
            .map(|int| Value::Number(int.into()))
            .map_err(|_| bad()),
        "boolean" | "gboolean" | "bool" | "b" => match text.as_str() {
            "true" | "TRUE" | "yes" | "1" => Ok(Value::Bool(true)),
            "false" | "FALSE" | "no" | "0" => Ok(Value::Bool(false)),
            _ => Err(bad()),
        },
        "string" | "gchararray" | "str" | "s" => Ok(Value::String(text)),
        other => Err(ParseError::UnknownCast(other.to_string())),
    }
}
